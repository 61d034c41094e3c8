//! Media playback seam.
//!
//! The controller drives exactly one track at a time through [`MediaPlayer`].
//! Positions are normalised to `0.0..=1.0` of the track length; any negative
//! value means nothing is loaded or playback was stopped.

use std::path::Path;

use crate::Result;

mod clock;
pub use clock::ClockPlayer;

#[cfg(feature = "audio")]
mod audio;
#[cfg(feature = "audio")]
pub use audio::RodioPlayer;

#[cfg(test)]
pub(crate) mod fake;

/// Position reported when no media is playing.
pub const STOPPED_POSITION: f64 = -1.0;

/// Narrow view of a media player.
///
/// Implementations must not block for long; backends that can stall are
/// expected to bound their calls and report [`crate::JukeboxError::AdapterTimeout`].
pub trait MediaPlayer {
    /// Replaces the current media. Does not start playback.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Starts the loaded media from the beginning.
    fn play(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn is_playing(&mut self) -> Result<bool>;

    /// Normalised playback position, or a negative value when stopped.
    fn position(&mut self) -> Result<f64>;
}

impl<P: MediaPlayer + ?Sized> MediaPlayer for Box<P> {
    fn load(&mut self, path: &Path) -> Result<()> {
        (**self).load(path)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn is_playing(&mut self) -> Result<bool> {
        (**self).is_playing()
    }

    fn position(&mut self) -> Result<f64> {
        (**self).position()
    }
}
