//! The controller loop tying buttons, playback and LEDs together.
//!
//! [`Jukebox::run`] owns the playback session on the calling thread. Debounced
//! presses arrive over a channel from the settle worker; a fixed-rate ticker
//! drives the position poll and LED refresh. Both are handled on the same
//! thread, so a press can never interleave with an end-of-track transition.

use std::{sync::Arc, thread, time::Duration};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    Board, Button, ButtonPress, Debouncer, EdgePolicy, JukeboxConfig, LedFrame, LedSync,
    MediaPlayer, PlaybackSession, PlaybackState, Result, SettleWorker,
};

/// The assembled controller.
pub struct Jukebox<B: Board, P: MediaPlayer> {
    buttons: Vec<Button>,
    board: B,
    session: PlaybackSession<P>,
    leds: LedSync,
    poll_period: Duration,
    debounce_window: Duration,
    edge: EdgePolicy,
    startup_flash: Duration,
    press_tx: Sender<ButtonPress>,
    presses: Receiver<ButtonPress>,
    debouncer: Option<Arc<Debouncer>>,
    worker: Option<SettleWorker>,
    started: bool,
    shut_down: bool,
}

impl<B: Board, P: MediaPlayer> Jukebox<B, P> {
    /// Assembles the controller. No hardware is touched until
    /// [`Jukebox::start`] or [`Jukebox::run`].
    pub fn new(config: &JukeboxConfig, buttons: Vec<Button>, board: B, player: P) -> Self {
        let session = PlaybackSession::for_buttons(player, &buttons);
        let leds = LedSync::new(buttons.len(), config.player.song_end_position);
        let (press_tx, presses) = crossbeam_channel::bounded(buttons.len().max(1) * 2);

        Self {
            board,
            session,
            leds,
            poll_period: config.player.poll_period(),
            debounce_window: config.gpio.bounce_time(),
            edge: config.gpio.edge,
            startup_flash: config.player.startup_flash(),
            press_tx,
            presses,
            debouncer: None,
            worker: None,
            started: false,
            shut_down: false,
            buttons,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    /// Claims the GPIO lines, flashes every bound LED once and starts
    /// listening for presses.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        let inputs: Vec<u8> = self.buttons.iter().map(|b| b.input_pin).collect();
        let outputs: Vec<u8> = self.buttons.iter().map(|b| b.led_pin).collect();

        self.board.configure_outputs(&outputs)?;
        self.board.configure_inputs(&inputs)?;
        self.started = true;
        self.board.write(LedFrame::dark(self.buttons.len()).levels())?;
        tracing::info!(inputs = ?inputs, outputs = ?outputs, "GPIO pins initialized");

        self.lamp_test()?;

        let (debouncer, worker) = Debouncer::start(
            &inputs,
            self.board.reader(),
            self.debounce_window,
            self.edge,
            self.press_tx.clone(),
        )?;
        self.worker = Some(worker);

        for button in &self.buttons {
            let debouncer = debouncer.clone();
            let index = button.index;
            self.board.on_transition(
                button.input_pin,
                Box::new(move |level| debouncer.on_transition(index, level)),
            )?;
        }
        self.debouncer = Some(debouncer);

        if self.buttons.is_empty() {
            tracing::warn!("no tracks bound, buttons will do nothing");
        }
        tracing::info!(buttons = self.buttons.len(), "jukebox ready");
        Ok(())
    }

    /// Runs the controller until `shutdown` yields a message (or its sender
    /// goes away), then shuts down.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<()> {
        self.start()?;

        tracing::info!(period = ?self.poll_period, "entering main loop");
        let ticker = crossbeam_channel::tick(self.poll_period);
        let presses = self.presses.clone();

        loop {
            crossbeam_channel::select! {
                recv(shutdown) -> _ => {
                    tracing::info!("shutdown requested");
                    break;
                },
                recv(presses) -> press => {
                    if let Ok(press) = press {
                        self.handle_press(press);
                    }
                },
                recv(ticker) -> _ => {
                    self.tick();
                },
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Applies one debounced press.
    pub fn handle_press(&mut self, press: ButtonPress) {
        tracing::debug!(index = press.index, "button press");
        let outcome = self.session.on_press(press.index);
        tracing::debug!(?outcome, state = ?self.session.state(), "press handled");
    }

    /// One poll tick. Presses that are already queued are applied first, so
    /// a press and an end-of-track detection landing in the same tick are
    /// always resolved in arrival order of the press.
    pub fn tick(&mut self) -> LedFrame {
        while let Ok(press) = self.presses.try_recv() {
            self.handle_press(press);
        }
        self.leds.tick(&mut self.session, &mut self.board)
    }

    /// Stops playback, turns every LED off, releases the GPIO lines and stops
    /// the settle worker. Only the first call does anything.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        tracing::info!("turning off LEDs and shutting down");
        self.session.shutdown();
        if self.started {
            self.leds.blank(&mut self.board);
        }
        if let Err(err) = self.board.release() {
            tracing::warn!(%err, "failed to release GPIO lines");
        }
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.debouncer = None;
    }

    fn lamp_test(&mut self) -> Result<()> {
        if self.startup_flash.is_zero() {
            return Ok(());
        }
        let count = self.buttons.len();
        for index in 0..count {
            self.board.write(LedFrame::with_lit(count, Some(index)).levels())?;
            thread::sleep(self.startup_flash);
            self.board.write(LedFrame::dark(count).levels())?;
        }
        Ok(())
    }
}

impl<B: Board, P: MediaPlayer> Drop for Jukebox<B, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Instant};

    use super::*;
    use crate::{
        bind_buttons,
        player::fake::{Call, FakePlayer},
        SimulatedBoard, SimulatedPins,
    };

    const BUTTON_PINS: [u8; 3] = [5, 6, 13];
    const LED_PINS: [u8; 3] = [17, 27, 22];

    fn config(flash_ms: u64) -> JukeboxConfig {
        let mut config = JukeboxConfig {
            music_folder: PathBuf::from("/music"),
            ..Default::default()
        };
        config.gpio.button_pins = BUTTON_PINS.to_vec();
        config.gpio.led_pins = LED_PINS.to_vec();
        config.gpio.bounce_time_ms = 20;
        config.player.poll_hz = 100;
        config.player.startup_flash_ms = flash_ms;
        config
    }

    fn jukebox(flash_ms: u64) -> (Jukebox<SimulatedBoard, FakePlayer>, SimulatedPins, FakePlayer) {
        let config = config(flash_ms);
        let tracks = (0..3).map(|i| PathBuf::from(format!("/music/{i}.mp3"))).collect();
        let buttons = bind_buttons(tracks, &config.gpio);
        let board = SimulatedBoard::new();
        let pins = board.pins();
        let player = FakePlayer::new();
        (Jukebox::new(&config, buttons, board, player.clone()), pins, player)
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn press_lights_led_and_shutdown_cleans_up() {
        let (mut jukebox, pins, player) = jukebox(0);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let runner = thread::spawn(move || {
            let result = jukebox.run(&shutdown_rx);
            (jukebox, result)
        });

        wait_until("inputs to be watched", || pins.has_handler(BUTTON_PINS[2]));
        pins.pulse(BUTTON_PINS[2], Duration::from_millis(60));

        wait_until("track to load", || {
            player.calls().contains(&Call::Load(PathBuf::from("/music/2.mp3")))
        });
        wait_until("LED to light", || pins.outputs() == vec![false, false, true]);

        shutdown_tx.send(()).unwrap();
        let (jukebox, result) = runner.join().unwrap();
        result.unwrap();

        assert_eq!(jukebox.state(), PlaybackState::Idle);
        assert_eq!(player.calls().last(), Some(&Call::Stop));
        assert_eq!(pins.outputs(), vec![false, false, false]);
        assert_eq!(pins.release_count(), 1);
        assert!(!pins.has_handler(BUTTON_PINS[2]));

        drop(jukebox);
        assert_eq!(pins.release_count(), 1);
    }

    #[test]
    fn shutdown_runs_once() {
        let (mut jukebox, pins, player) = jukebox(0);
        jukebox.start().unwrap();
        jukebox.handle_press(ButtonPress { index: 2 });
        assert_eq!(jukebox.tick().lit(), Some(2));
        player.clear_calls();

        jukebox.shutdown();
        jukebox.shutdown();
        drop(jukebox);

        assert_eq!(player.calls(), vec![Call::Stop]);
        assert_eq!(pins.outputs(), vec![false, false, false]);
        assert_eq!(pins.release_count(), 1);
    }

    #[test]
    fn startup_flashes_each_led_in_order() {
        let (mut jukebox, pins, _player) = jukebox(1);
        jukebox.start().unwrap();

        let dark = vec![false; 3];
        let expected = vec![
            dark.clone(),
            vec![true, false, false],
            dark.clone(),
            vec![false, true, false],
            dark.clone(),
            vec![false, false, true],
            dark,
        ];
        assert_eq!(pins.writes(), expected);
        assert_eq!(pins.output_pins(), LED_PINS.to_vec());
    }

    #[test]
    fn queued_press_is_applied_before_the_tick() {
        let (mut jukebox, _pins, player) = jukebox(0);
        jukebox.start().unwrap();
        jukebox.handle_press(ButtonPress { index: 0 });

        // queued before the tick, so the poll already sees the new track
        jukebox.press_tx.send(ButtonPress { index: 1 }).unwrap();
        player.queue_positions(&[0.5]);

        assert_eq!(jukebox.tick().lit(), Some(1));
        assert_eq!(jukebox.state(), PlaybackState::Playing(1));
    }

    #[test]
    fn led_goes_dark_when_track_ends() {
        let (mut jukebox, pins, player) = jukebox(0);
        jukebox.start().unwrap();
        jukebox.handle_press(ButtonPress { index: 1 });
        player.queue_positions(&[0.5, 0.95, 0.991]);

        assert_eq!(jukebox.tick().lit(), Some(1));
        assert_eq!(jukebox.tick().lit(), Some(1));
        assert_eq!(jukebox.tick().lit(), None);

        assert_eq!(jukebox.state(), PlaybackState::Idle);
        assert_eq!(pins.outputs(), vec![false, false, false]);
    }
}
