use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use super::{MediaPlayer, STOPPED_POSITION};
use crate::{JukeboxError, Result};

/// Silent player that pretends every track lasts the same fixed time.
///
/// Used for dry runs on machines without the jukebox hardware: positions
/// advance with the wall clock, so the end-of-track handling and LEDs behave
/// exactly as with real audio.
#[derive(Debug)]
pub struct ClockPlayer {
    track_length: Duration,
    media: Option<PathBuf>,
    started: Option<Instant>,
}

impl ClockPlayer {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            media: None,
            started: None,
        }
    }

    fn progress(&self) -> Option<f64> {
        let started = self.started?;
        let elapsed = started.elapsed().as_secs_f64();
        Some((elapsed / self.track_length.as_secs_f64()).min(1.0))
    }
}

impl MediaPlayer for ClockPlayer {
    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(JukeboxError::playback(format!(
                "no such media: {}",
                path.display()
            )));
        }
        self.started = None;
        self.media = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let media = self
            .media
            .as_ref()
            .ok_or_else(|| JukeboxError::playback("play requested without media"))?;
        tracing::info!(media = %media.display(), length = ?self.track_length, "simulated playback started");
        self.started = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = None;
        Ok(())
    }

    fn is_playing(&mut self) -> Result<bool> {
        Ok(self.progress().map(|p| p < 1.0).unwrap_or(false))
    }

    fn position(&mut self) -> Result<f64> {
        Ok(self.progress().unwrap_or(STOPPED_POSITION))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn reports_stopped_until_played() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("a.mp3");
        fs::write(&track, b"").unwrap();

        let mut player = ClockPlayer::new(Duration::from_secs(60));
        assert_eq!(player.position().unwrap(), STOPPED_POSITION);

        player.load(&track).unwrap();
        assert_eq!(player.position().unwrap(), STOPPED_POSITION);
        assert!(!player.is_playing().unwrap());

        player.play().unwrap();
        let position = player.position().unwrap();
        assert!((0.0..0.1).contains(&position));
        assert!(player.is_playing().unwrap());

        player.stop().unwrap();
        assert_eq!(player.position().unwrap(), STOPPED_POSITION);
    }

    #[test]
    fn short_track_runs_to_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("a.mp3");
        fs::write(&track, b"").unwrap();

        let mut player = ClockPlayer::new(Duration::from_millis(10));
        player.load(&track).unwrap();
        player.play().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(player.position().unwrap(), 1.0);
        assert!(!player.is_playing().unwrap());
    }

    #[test]
    fn finished_track_frees_its_button_at_highest_threshold() {
        use crate::{PlaybackSession, PlaybackState, PressOutcome};

        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("a.mp3");
        fs::write(&track, b"").unwrap();

        let player = ClockPlayer::new(Duration::from_millis(10));
        let mut session = PlaybackSession::new(player, vec![track]);
        assert_eq!(session.on_press(0), PressOutcome::Started(0));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(session.on_tick(0.999), None);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.on_press(0), PressOutcome::Started(0));
    }

    #[test]
    fn missing_media_fails_to_load() {
        let mut player = ClockPlayer::new(Duration::from_secs(1));
        assert!(player.load(Path::new("/definitely/not/here.mp3")).is_err());
        assert!(player.play().is_err());
    }
}
