use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};

use super::{Board, InputReader, Level, TransitionHandler};
use crate::{JukeboxError, Result};

/// GPIO header of a Raspberry Pi, driven through `rppal`.
pub struct RpiBoard {
    gpio: Gpio,
    inputs: Arc<RpiInputs>,
    outputs: Vec<OutputPin>,
    hardware_bounce: Duration,
}

#[derive(Default)]
struct RpiInputs {
    pins: RwLock<HashMap<u8, Mutex<InputPin>>>,
}

impl RpiBoard {
    /// Opens the GPIO peripheral. `hardware_bounce` is handed to the driver's
    /// own edge filter.
    pub fn open(hardware_bounce: Duration) -> Result<Self> {
        let gpio = Gpio::new()?;
        tracing::info!("GPIO peripheral opened");
        Ok(Self {
            gpio,
            inputs: Arc::new(RpiInputs::default()),
            outputs: Vec::new(),
            hardware_bounce,
        })
    }
}

impl Board for RpiBoard {
    fn configure_inputs(&mut self, pins: &[u8]) -> Result<()> {
        let mut claimed = self.inputs.pins.write();
        for &pin in pins {
            let input = self.gpio.get(pin)?.into_input_pullup();
            claimed.insert(pin, Mutex::new(input));
        }
        tracing::info!(?pins, "input pins claimed");
        Ok(())
    }

    fn configure_outputs(&mut self, pins: &[u8]) -> Result<()> {
        self.outputs = pins
            .iter()
            .map(|&pin| Ok(self.gpio.get(pin)?.into_output_low()))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(?pins, "output pins claimed");
        Ok(())
    }

    fn reader(&self) -> Arc<dyn InputReader> {
        self.inputs.clone()
    }

    fn write(&mut self, levels: &[bool]) -> Result<()> {
        if levels.len() != self.outputs.len() {
            return Err(JukeboxError::hardware(format!(
                "expected {} output levels, got {}",
                self.outputs.len(),
                levels.len()
            )));
        }
        for (pin, &on) in self.outputs.iter_mut().zip(levels) {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        Ok(())
    }

    fn on_transition(&mut self, pin: u8, mut handler: TransitionHandler) -> Result<()> {
        let claimed = self.inputs.pins.read();
        let input = claimed
            .get(&pin)
            .ok_or_else(|| JukeboxError::hardware(format!("pin {pin} is not an input")))?;

        input.lock().set_async_interrupt(
            Trigger::Both,
            Some(self.hardware_bounce),
            move |event: Event| {
                let level = match event.trigger {
                    Trigger::RisingEdge => Level::High,
                    _ => Level::Low,
                };
                handler(level);
            },
        )?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        for pin in &mut self.outputs {
            pin.set_low();
        }
        self.outputs.clear();

        let mut claimed = self.inputs.pins.write();
        for (pin, input) in claimed.iter() {
            if let Err(err) = input.lock().clear_async_interrupt() {
                tracing::warn!(pin, %err, "failed to clear interrupt");
            }
        }
        // dropping the pins hands them back in their original mode
        claimed.clear();
        tracing::info!("GPIO pins released");
        Ok(())
    }
}

impl InputReader for RpiInputs {
    fn read(&self, pin: u8) -> Result<Level> {
        let claimed = self.pins.read();
        let input = claimed
            .get(&pin)
            .ok_or_else(|| JukeboxError::hardware(format!("pin {pin} is not an input")))?;
        let level = match input.lock().read() {
            rppal::gpio::Level::Low => Level::Low,
            rppal::gpio::Level::High => Level::High,
        };
        Ok(level)
    }
}
