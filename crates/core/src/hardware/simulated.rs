use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use super::{Board, InputReader, Level, TransitionHandler};
use crate::{JukeboxError, Result};

#[derive(Default)]
struct SimState {
    inputs: HashMap<u8, Level>,
    output_pins: Vec<u8>,
    outputs: Vec<bool>,
    writes: Vec<Vec<bool>>,
    handlers: HashMap<u8, TransitionHandler>,
    failing_reads: HashSet<u8>,
    fail_writes: bool,
    release_count: usize,
}

/// In-memory board used off-target and in tests.
///
/// Inputs idle high (pulled up). Driving a line through [`SimulatedPins`]
/// fires the registered handler on the calling thread, the way a GPIO driver
/// calls back from its interrupt thread.
pub struct SimulatedBoard {
    pins: SimulatedPins,
}

/// Cloneable control surface of a [`SimulatedBoard`].
#[derive(Clone)]
pub struct SimulatedPins {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self {
            pins: SimulatedPins {
                state: Arc::new(Mutex::new(SimState::default())),
            },
        }
    }

    /// Handle for driving inputs and inspecting outputs.
    pub fn pins(&self) -> SimulatedPins {
        self.pins.clone()
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for SimulatedBoard {
    fn configure_inputs(&mut self, pins: &[u8]) -> Result<()> {
        let mut state = self.pins.state.lock();
        for pin in pins {
            state.inputs.entry(*pin).or_insert(Level::High);
        }
        Ok(())
    }

    fn configure_outputs(&mut self, pins: &[u8]) -> Result<()> {
        let mut state = self.pins.state.lock();
        state.output_pins = pins.to_vec();
        state.outputs = vec![false; pins.len()];
        Ok(())
    }

    fn reader(&self) -> Arc<dyn InputReader> {
        Arc::new(self.pins.clone())
    }

    fn write(&mut self, levels: &[bool]) -> Result<()> {
        let mut state = self.pins.state.lock();
        if state.fail_writes {
            return Err(JukeboxError::hardware("simulated write failure"));
        }
        if levels.len() != state.outputs.len() {
            return Err(JukeboxError::hardware(format!(
                "expected {} output levels, got {}",
                state.outputs.len(),
                levels.len()
            )));
        }
        state.outputs.copy_from_slice(levels);
        state.writes.push(levels.to_vec());
        Ok(())
    }

    fn on_transition(&mut self, pin: u8, handler: TransitionHandler) -> Result<()> {
        let mut state = self.pins.state.lock();
        if !state.inputs.contains_key(&pin) {
            return Err(JukeboxError::hardware(format!("pin {pin} is not an input")));
        }
        state.handlers.insert(pin, handler);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut state = self.pins.state.lock();
        state.handlers.clear();
        state.outputs.iter_mut().for_each(|level| *level = false);
        state.release_count += 1;
        Ok(())
    }
}

impl SimulatedPins {
    /// Drives an input line. Fires the transition handler when the level
    /// actually changes.
    pub fn set_input(&self, pin: u8, level: Level) {
        let (handler, generation) = {
            let mut state = self.state.lock();
            let previous = state.inputs.insert(pin, level);
            if previous == Some(level) {
                return;
            }
            (state.handlers.remove(&pin), state.release_count)
        };

        if let Some(mut handler) = handler {
            handler(level);
            let mut state = self.state.lock();
            // a release while the handler ran drops it for good
            if state.release_count == generation {
                state.handlers.entry(pin).or_insert(handler);
            }
        }
    }

    /// Holds a pulled-up button down for `hold`, then lets go.
    pub fn pulse(&self, pin: u8, hold: Duration) {
        self.set_input(pin, Level::Low);
        thread::sleep(hold);
        self.set_input(pin, Level::High);
    }

    /// Makes reads of `pin` fail until called again with `false`.
    pub fn fail_reads(&self, pin: u8, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.failing_reads.insert(pin);
        } else {
            state.failing_reads.remove(&pin);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Current output levels, in configured order.
    pub fn outputs(&self) -> Vec<bool> {
        self.state.lock().outputs.clone()
    }

    pub fn output_pins(&self) -> Vec<u8> {
        self.state.lock().output_pins.clone()
    }

    /// Every successful batched write so far.
    pub fn writes(&self) -> Vec<Vec<bool>> {
        self.state.lock().writes.clone()
    }

    pub fn has_handler(&self, pin: u8) -> bool {
        self.state.lock().handlers.contains_key(&pin)
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().release_count
    }
}

impl InputReader for SimulatedPins {
    fn read(&self, pin: u8) -> Result<Level> {
        let state = self.state.lock();
        if state.failing_reads.contains(&pin) {
            return Err(JukeboxError::hardware(format!("simulated read failure on pin {pin}")));
        }
        state
            .inputs
            .get(&pin)
            .copied()
            .ok_or_else(|| JukeboxError::hardware(format!("pin {pin} is not an input")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_idle_high_and_fire_on_change() {
        let mut board = SimulatedBoard::new();
        let pins = board.pins();
        board.configure_inputs(&[18]).unwrap();
        assert_eq!(board.reader().read(18).unwrap(), Level::High);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        board
            .on_transition(18, Box::new(move |level: Level| sink.lock().push(level)))
            .unwrap();

        pins.set_input(18, Level::Low);
        pins.set_input(18, Level::Low);
        pins.set_input(18, Level::High);

        assert_eq!(*seen.lock(), vec![Level::Low, Level::High]);
        assert!(pins.has_handler(18));
    }

    #[test]
    fn writes_must_cover_every_output() {
        let mut board = SimulatedBoard::new();
        board.configure_outputs(&[23, 24]).unwrap();

        assert!(board.write(&[true]).is_err());
        board.write(&[false, true]).unwrap();
        assert_eq!(board.pins().outputs(), vec![false, true]);
    }

    #[test]
    fn release_blanks_outputs_and_drops_handlers() {
        let mut board = SimulatedBoard::new();
        let pins = board.pins();
        board.configure_inputs(&[18]).unwrap();
        board.configure_outputs(&[23]).unwrap();
        board.on_transition(18, Box::new(|_: Level| {})).unwrap();
        board.write(&[true]).unwrap();

        board.release().unwrap();

        assert_eq!(pins.outputs(), vec![false]);
        assert!(!pins.has_handler(18));
        assert_eq!(pins.release_count(), 1);
    }

    #[test]
    fn failing_reads_report_errors() {
        let mut board = SimulatedBoard::new();
        board.configure_inputs(&[18]).unwrap();
        board.pins().fail_reads(18, true);

        assert!(board.reader().read(18).is_err());
        assert!(board.reader().read(7).is_err());
    }
}
