//! Digital I/O seam between the controller and the GPIO header.
//!
//! The controller only needs a handful of operations: pulled-up inputs that
//! report transitions through a callback, a shared way to re-read an input
//! from another thread, and a bank of outputs that is always written as a
//! whole. [`SimulatedBoard`] implements them in memory; the `rpi` feature adds
//! [`RpiBoard`] on top of `rppal`.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::Result;

mod simulated;
pub use simulated::{SimulatedBoard, SimulatedPins};

#[cfg(feature = "rpi")]
mod rpi;
#[cfg(feature = "rpi")]
pub use rpi::RpiBoard;

/// Electrical level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

/// Called from the driver's interrupt context with the level the line moved
/// to. Must return quickly and never block.
pub type TransitionHandler = Box<dyn FnMut(Level) + Send + 'static>;

/// Read access to configured input lines, usable from any thread.
pub trait InputReader: Send + Sync {
    fn read(&self, pin: u8) -> Result<Level>;
}

/// A set of GPIO lines claimed by the controller.
pub trait Board {
    /// Claims `pins` as inputs with the internal pull-up enabled.
    fn configure_inputs(&mut self, pins: &[u8]) -> Result<()>;

    /// Claims `pins` as outputs and drives them low. Later calls to
    /// [`Board::write`] address them in this order.
    fn configure_outputs(&mut self, pins: &[u8]) -> Result<()>;

    /// Shared handle for reading inputs outside the owning thread.
    fn reader(&self) -> Arc<dyn InputReader>;

    /// Sets every configured output in one call; `levels[i]` drives the
    /// `i`-th pin passed to [`Board::configure_outputs`].
    fn write(&mut self, levels: &[bool]) -> Result<()>;

    /// Registers `handler` for both edges of an input pin.
    fn on_transition(&mut self, pin: u8, handler: TransitionHandler) -> Result<()>;

    /// Drives outputs low, drops interrupt handlers and gives every line back.
    fn release(&mut self) -> Result<()>;
}

impl<B: Board + ?Sized> Board for Box<B> {
    fn configure_inputs(&mut self, pins: &[u8]) -> Result<()> {
        (**self).configure_inputs(pins)
    }

    fn configure_outputs(&mut self, pins: &[u8]) -> Result<()> {
        (**self).configure_outputs(pins)
    }

    fn reader(&self) -> Arc<dyn InputReader> {
        (**self).reader()
    }

    fn write(&mut self, levels: &[bool]) -> Result<()> {
        (**self).write(levels)
    }

    fn on_transition(&mut self, pin: u8, handler: TransitionHandler) -> Result<()> {
        (**self).on_transition(pin, handler)
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}
