//! Loop Player Library
//!
//! Plays one video file in a fixed-size window, looping at end of stream.
//! Frames flow demuxer → decoder → converter → surface, paced to the
//! stream's frame rate by a single-threaded playback loop.

pub mod cli;
pub mod error;
pub mod output;
pub mod playback;
pub mod player;
pub mod resource;
pub mod settings;
pub mod telemetry;
pub mod video;

pub use error::{PlayerError, Result};
pub use playback::{PlaybackExit, PlaybackLoop, PlaybackState, PlaybackStats};
pub use player::play;
pub use resource::{Releasable, ResourceHandle};
pub use settings::{PlayerSettings, SettingsError};
