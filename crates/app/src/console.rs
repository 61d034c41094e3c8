use std::{
    io::{self, BufRead},
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use jukebox_core::{Button, SimulatedPins};

/// Lets a dry run press buttons from the terminal.
///
/// Each line read from stdin is a button index; the matching simulated line
/// is held low for `hold` and released again. `q` requests shutdown.
pub fn spawn(pins: SimulatedPins, buttons: &[Button], hold: Duration, shutdown: Sender<()>) -> io::Result<()> {
    let inputs: Vec<u8> = buttons.iter().map(|b| b.input_pin).collect();
    println!(
        "simulation: type a button number (0-{}) and press enter, `q` to quit",
        inputs.len().saturating_sub(1)
    );

    thread::Builder::new()
        .name("sim-console".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.eq_ignore_ascii_case("q") {
                    let _ = shutdown.try_send(());
                    break;
                }
                match line.parse::<usize>().ok().and_then(|i| inputs.get(i)) {
                    Some(&pin) => pins.pulse(pin, hold),
                    None if line.is_empty() => {}
                    None => println!("no button `{line}`"),
                }
            }
        })?;
    Ok(())
}
