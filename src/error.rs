//! Error types for the playback pipeline
//!
//! Every stage reports through [`PlayerError`]. Only packet read errors are
//! recoverable; everything else ends the session.

use thiserror::Error;

/// Errors raised while opening, decoding, converting or presenting video
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The media source could not be opened or probed
    #[error("avformat open of '{url}' failed: {cause}")]
    OpenFailed {
        url: String,
        #[source]
        cause: ffmpeg_next::Error,
    },
    /// The container has no video stream
    #[error("no video stream found in source")]
    NoVideoStream,
    /// A single packet read failed
    #[error("packet read failed: {0}")]
    ReadFailed(#[source] ffmpeg_next::Error),
    /// Rewinding the container failed
    #[error("seek to start failed: {0}")]
    SeekFailed(#[source] ffmpeg_next::Error),
    /// No decoder is available for the codec
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
    /// The decoder could not be opened
    #[error("decoder open failed: {0}")]
    DecoderOpenFailed(#[source] ffmpeg_next::Error),
    /// A full pass over the source produced no displayable frame
    #[error("source produced no frames before end of stream")]
    EmptyStream,
    /// Decoding a packet failed
    #[error("decode failed: {0}")]
    DecodeFailed(#[source] ffmpeg_next::Error),
    /// A pixel format, frame geometry or display format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// The scaler failed to convert a frame
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    /// Decoder, converter and surface disagree about the stream geometry
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),
    /// Window, GPU device or texture creation failed
    #[error("surface init failed: {0}")]
    SurfaceInitFailed(String),
    /// The texture staging buffer could not be locked
    #[error("texture lock failed: {0}")]
    LockFailed(String),
    /// Uploading or presenting the frame failed
    #[error("present failed: {0}")]
    PresentFailed(String),
    /// A component was used after its resource was released
    #[error("{0} already released")]
    Released(&'static str),
    /// Library initialization failed
    #[error("initialization failed: {0}")]
    Init(String),
}

impl PlayerError {
    /// Whether the playback loop may skip this error and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlayerError::ReadFailed(_))
    }

    /// The underlying FFmpeg error code, if the failure came from FFmpeg
    pub fn code(&self) -> Option<i32> {
        match self {
            PlayerError::OpenFailed { cause, .. } => Some(i32::from(*cause)),
            PlayerError::ReadFailed(e)
            | PlayerError::SeekFailed(e)
            | PlayerError::DecoderOpenFailed(e)
            | PlayerError::DecodeFailed(e) => Some(i32::from(*e)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_read_errors_are_recoverable() {
        assert!(PlayerError::ReadFailed(ffmpeg_next::Error::InvalidData).is_recoverable());
        assert!(!PlayerError::NoVideoStream.is_recoverable());
        assert!(!PlayerError::SeekFailed(ffmpeg_next::Error::InvalidData).is_recoverable());
        assert!(!PlayerError::ConversionFailed("scale".into()).is_recoverable());
    }

    #[test]
    fn test_error_code_exposed_for_ffmpeg_failures() {
        let err = PlayerError::DecodeFailed(ffmpeg_next::Error::Other { errno: 5 });
        assert_eq!(err.code(), Some(-5));
        assert_eq!(PlayerError::NoVideoStream.code(), None);
    }

    #[test]
    fn test_error_display_names_operation() {
        let err = PlayerError::OpenFailed {
            url: "missing.mp4".into(),
            cause: ffmpeg_next::Error::InvalidData,
        };
        assert!(err.to_string().starts_with("avformat open of 'missing.mp4' failed"));
        assert_eq!(PlayerError::NoVideoStream.to_string(), "no video stream found in source");
    }
}
