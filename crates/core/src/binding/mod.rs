use std::path::PathBuf;

use crate::GpioConfig;

/// A physical button bound to one track and one LED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub index: usize,
    pub input_pin: u8,
    pub led_pin: u8,
    pub track: PathBuf,
}

/// Pairs discovered tracks with the configured buttons, in order.
///
/// Button `i` always gets the `i`-th track. Tracks beyond the number of
/// buttons are dropped with a warning. Expects `gpio` to be validated, i.e.
/// at least as many LED pins as button pins.
pub fn bind_buttons(tracks: Vec<PathBuf>, gpio: &GpioConfig) -> Vec<Button> {
    let mut buttons = Vec::with_capacity(gpio.button_pins.len().min(tracks.len()));

    for (index, track) in tracks.into_iter().enumerate() {
        if index >= gpio.button_pins.len() {
            tracing::warn!(track = %track.display(), "ignoring track because no button is left");
            continue;
        }

        tracing::info!(index, pin = gpio.button_pins[index], track = %track.display(), "binding button");
        buttons.push(Button {
            index,
            input_pin: gpio.button_pins[index],
            led_pin: gpio.led_pins[index],
            track,
        });
    }

    buttons
}
