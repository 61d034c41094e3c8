use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use super::{MediaPlayer, STOPPED_POSITION};
use crate::{JukeboxError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Load(PathBuf),
    Play,
    Stop,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    playing: bool,
    positions: VecDeque<f64>,
    fail_play: bool,
    fail_position: bool,
}

/// Scripted player for state machine tests. Clones share one script.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakePlayer {
    script: Arc<Mutex<Script>>,
}

impl FakePlayer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.script.lock().calls.clear();
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.calls().iter().filter(|call| **call == Call::Stop).count()
    }

    /// Overrides what `is_playing` reports, e.g. after the track ran out.
    pub(crate) fn set_playing(&self, playing: bool) {
        self.script.lock().playing = playing;
    }

    /// Positions returned by successive `position` calls. Once exhausted the
    /// player reports `0.5` while playing.
    pub(crate) fn queue_positions(&self, positions: &[f64]) {
        self.script.lock().positions.extend(positions.iter().copied());
    }

    pub(crate) fn fail_play(&self, fail: bool) {
        self.script.lock().fail_play = fail;
    }

    pub(crate) fn fail_position(&self, fail: bool) {
        self.script.lock().fail_position = fail;
    }
}

impl MediaPlayer for FakePlayer {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.script.lock().calls.push(Call::Load(path.to_path_buf()));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(Call::Play);
        if script.fail_play {
            return Err(JukeboxError::playback("scripted play failure"));
        }
        script.playing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(Call::Stop);
        script.playing = false;
        Ok(())
    }

    fn is_playing(&mut self) -> Result<bool> {
        Ok(self.script.lock().playing)
    }

    fn position(&mut self) -> Result<f64> {
        let mut script = self.script.lock();
        if script.fail_position {
            return Err(JukeboxError::playback("scripted position failure"));
        }
        if let Some(position) = script.positions.pop_front() {
            return Ok(position);
        }
        Ok(if script.playing { 0.5 } else { STOPPED_POSITION })
    }
}
