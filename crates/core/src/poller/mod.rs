use crate::{Board, MediaPlayer, PlaybackSession};

/// LED levels for one tick, one entry per bound button.
///
/// Only constructible with at most one lit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedFrame {
    levels: Vec<bool>,
}

impl LedFrame {
    /// All LEDs off.
    pub fn dark(len: usize) -> Self {
        Self {
            levels: vec![false; len],
        }
    }

    /// Exactly the LED at `lit` on, or all off for `None`.
    ///
    /// # Panics
    ///
    /// Panics if `lit` is out of range.
    pub fn with_lit(len: usize, lit: Option<usize>) -> Self {
        let mut frame = Self::dark(len);
        if let Some(index) = lit {
            assert!(index < len, "LED index {index} out of range for {len} buttons");
            frame.levels[index] = true;
        }
        frame
    }

    pub fn levels(&self) -> &[bool] {
        &self.levels
    }

    pub fn lit(&self) -> Option<usize> {
        self.levels.iter().position(|on| *on)
    }
}

/// Per-tick LED refresh driven by playback position.
#[derive(Debug, Clone)]
pub struct LedSync {
    buttons: usize,
    end_position: f64,
}

impl LedSync {
    pub fn new(buttons: usize, end_position: f64) -> Self {
        Self {
            buttons,
            end_position,
        }
    }

    /// Runs one poll tick: advances the session, then writes the whole LED
    /// bank in a single call.
    ///
    /// A failed write is logged and otherwise ignored; the next tick writes
    /// the full frame again.
    pub fn tick<P, B>(&self, session: &mut PlaybackSession<P>, board: &mut B) -> LedFrame
    where
        P: MediaPlayer,
        B: Board + ?Sized,
    {
        let lit = session.on_tick(self.end_position);
        let frame = LedFrame::with_lit(self.buttons, lit);

        if let Err(err) = board.write(frame.levels()) {
            tracing::warn!(%err, "failed to write LED outputs");
        }
        frame
    }

    /// Turns every LED off.
    pub fn blank<B: Board + ?Sized>(&self, board: &mut B) {
        if let Err(err) = board.write(LedFrame::dark(self.buttons).levels()) {
            tracing::warn!(%err, "failed to blank LED outputs");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{player::fake::FakePlayer, PlaybackState, SimulatedBoard};

    fn fixture() -> (PlaybackSession<FakePlayer>, FakePlayer, SimulatedBoard) {
        let player = FakePlayer::new();
        let tracks = (0..3).map(|i| PathBuf::from(format!("/music/{i}.mp3"))).collect();
        let mut board = SimulatedBoard::new();
        board.configure_outputs(&[23, 24, 25]).unwrap();
        (PlaybackSession::new(player.clone(), tracks), player, board)
    }

    #[test]
    fn frame_has_at_most_one_lit_led() {
        assert_eq!(LedFrame::dark(3).levels(), &[false, false, false]);
        let frame = LedFrame::with_lit(3, Some(1));
        assert_eq!(frame.levels(), &[false, true, false]);
        assert_eq!(frame.lit(), Some(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn frame_rejects_out_of_range_index() {
        LedFrame::with_lit(2, Some(2));
    }

    #[test]
    fn leds_follow_playback_until_track_ends() {
        let (mut session, player, mut board) = fixture();
        let sync = LedSync::new(3, 0.990);
        let pins = board.pins();

        assert_eq!(sync.tick(&mut session, &mut board).lit(), None);

        session.on_press(1);
        player.queue_positions(&[0.5, 0.95, 0.991]);

        assert_eq!(sync.tick(&mut session, &mut board).lit(), Some(1));
        assert_eq!(pins.outputs(), vec![false, true, false]);
        assert_eq!(sync.tick(&mut session, &mut board).lit(), Some(1));

        let last = sync.tick(&mut session, &mut board);
        assert_eq!(last.levels(), &[false, false, false]);
        assert_eq!(pins.outputs(), vec![false, false, false]);
        assert_eq!(session.state(), PlaybackState::Idle);

        for write in pins.writes() {
            assert!(write.iter().filter(|on| **on).count() <= 1);
        }
    }

    #[test]
    fn failed_write_does_not_disturb_the_session() {
        let (mut session, _player, mut board) = fixture();
        let sync = LedSync::new(3, 0.990);
        session.on_press(2);
        board.pins().fail_writes(true);

        assert_eq!(sync.tick(&mut session, &mut board).lit(), Some(2));
        assert_eq!(session.state(), PlaybackState::Playing(2));

        board.pins().fail_writes(false);
        sync.tick(&mut session, &mut board);
        assert_eq!(board.pins().outputs(), vec![false, false, true]);
    }
}
