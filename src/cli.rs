//! Command line parsing
//!
//! `loop-player [--config <file.xml>] [--frames <n>] <source>`

use std::path::PathBuf;

use thiserror::Error;

pub const USAGE: &str = "usage: loop-player [--config <file.xml>] [--frames <n>] <source>";

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// File path or URL to play
    pub source: String,
    pub config: Option<PathBuf>,
    /// Stop after this many frames instead of looping forever
    pub max_frames: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing media source")]
    MissingSource,
    #[error("option {0} needs a value")]
    MissingValue(&'static str),
    #[error("invalid frame count '{0}'")]
    InvalidFrames(String),
    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}

impl CliArgs {
    /// Parse arguments, excluding the program name
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut source = None;
        let mut config = None;
        let mut max_frames = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let value = args.next().ok_or(CliError::MissingValue("--config"))?;
                    config = Some(PathBuf::from(value));
                }
                "--frames" => {
                    let value = args.next().ok_or(CliError::MissingValue("--frames"))?;
                    let frames = value
                        .parse::<u64>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(CliError::InvalidFrames(value))?;
                    max_frames = Some(frames);
                }
                _ if source.is_none() => source = Some(arg),
                _ => return Err(CliError::Unexpected(arg)),
            }
        }

        Ok(Self {
            source: source.ok_or(CliError::MissingSource)?,
            config,
            max_frames,
        })
    }
}
