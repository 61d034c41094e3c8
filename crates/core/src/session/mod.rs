use std::path::{Path, PathBuf};

use crate::{player::STOPPED_POSITION, Button, MediaPlayer, Result};

/// Which track, if any, the jukebox considers active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing(usize),
}

/// What a press did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Started(usize),
    Stopped(usize),
    Switched { from: usize, to: usize },
    /// The pressed track is still marked active but the player already
    /// finished it. Nothing was done.
    Ignored(usize),
    /// The player failed; the session fell back to idle.
    Failed(usize),
}

/// How a polled position relates to the end-of-track threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    /// Somewhere in `(-1, end]`: the track is running.
    Running,
    /// Past the threshold: the track is over.
    Ending,
    /// The stop sentinel. No decision yet.
    Undecided,
}

/// Classifies a normalised position against `end_position`.
///
/// Only a position strictly past the threshold ends a track; sitting exactly
/// on it still counts as running.
pub fn classify_position(position: f64, end_position: f64) -> PositionClass {
    if position > end_position {
        PositionClass::Ending
    } else if position > STOPPED_POSITION {
        PositionClass::Running
    } else {
        PositionClass::Undecided
    }
}

/// The single owner of playback state.
///
/// Presses and poll ticks are the only ways to change it, and both need
/// `&mut self`, so whoever owns the session serialises them.
pub struct PlaybackSession<P> {
    player: P,
    tracks: Vec<PathBuf>,
    state: PlaybackState,
}

impl<P: MediaPlayer> PlaybackSession<P> {
    /// Creates an idle session where button `i` plays `tracks[i]`.
    pub fn new(player: P, tracks: Vec<PathBuf>) -> Self {
        Self {
            player,
            tracks,
            state: PlaybackState::Idle,
        }
    }

    pub fn for_buttons(player: P, buttons: &[Button]) -> Self {
        Self::new(player, buttons.iter().map(|b| b.track.clone()).collect())
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn active_index(&self) -> Option<usize> {
        match self.state {
            PlaybackState::Idle => None,
            PlaybackState::Playing(index) => Some(index),
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Applies a debounced press of button `index`.
    ///
    /// # Panics
    ///
    /// Panics if no track is bound to `index`; presses are only ever
    /// registered for bound buttons.
    pub fn on_press(&mut self, index: usize) -> PressOutcome {
        assert!(
            index < self.tracks.len(),
            "press for unbound button {index} ({} tracks bound)",
            self.tracks.len()
        );

        match self.state {
            PlaybackState::Idle => {
                tracing::info!(index, "playing new track");
                self.start(index, PressOutcome::Started(index))
            }
            PlaybackState::Playing(active) if active == index => match self.player.is_playing() {
                Ok(true) => {
                    tracing::info!(index, "stopping active playback");
                    self.state = PlaybackState::Idle;
                    if let Err(err) = self.player.stop() {
                        tracing::error!(index, %err, "failed to stop playback");
                    }
                    PressOutcome::Stopped(index)
                }
                Ok(false) => {
                    tracing::debug!(index, "track already finished, ignoring press");
                    PressOutcome::Ignored(index)
                }
                Err(err) => {
                    tracing::error!(index, %err, "could not query player state");
                    self.reset();
                    PressOutcome::Failed(index)
                }
            },
            PlaybackState::Playing(active) => {
                tracing::info!(from = active, to = index, "stopping playback and playing new track");
                self.start(index, PressOutcome::Switched { from: active, to: index })
            }
        }
    }

    /// Polls the player and applies end-of-track detection.
    ///
    /// Returns the index whose LED should be lit this tick, if any.
    pub fn on_tick(&mut self, end_position: f64) -> Option<usize> {
        let PlaybackState::Playing(index) = self.state else {
            return None;
        };
        assert!(index < self.tracks.len(), "active index {index} out of range");

        let position = match self.player.position() {
            Ok(position) => position,
            Err(err) => {
                tracing::error!(index, %err, "could not query playback position");
                self.reset();
                return None;
            }
        };
        tracing::trace!(index, position, "song position");

        match classify_position(position, end_position) {
            PositionClass::Running => Some(index),
            PositionClass::Ending => {
                tracing::info!(index, position, "track reached its end");
                self.state = PlaybackState::Idle;
                None
            }
            PositionClass::Undecided => None,
        }
    }

    /// Stops playback and forgets the active track.
    pub fn shutdown(&mut self) {
        if let Some(index) = self.active_index() {
            tracing::info!(index, "stopping playback for shutdown");
        }
        self.reset();
    }

    fn start(&mut self, index: usize, outcome: PressOutcome) -> PressOutcome {
        match begin(&mut self.player, &self.tracks[index]) {
            Ok(()) => {
                self.state = PlaybackState::Playing(index);
                outcome
            }
            Err(err) => {
                tracing::error!(index, track = %self.tracks[index].display(), %err, "failed to start track");
                self.reset();
                PressOutcome::Failed(index)
            }
        }
    }

    fn reset(&mut self) {
        self.state = PlaybackState::Idle;
        if let Err(err) = self.player.stop() {
            tracing::warn!(%err, "failed to stop player while resetting");
        }
    }
}

fn begin<P: MediaPlayer>(player: &mut P, track: &Path) -> Result<()> {
    player.stop()?;
    player.load(track)?;
    player.play()
}
