use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{EdgePolicy, JukeboxError, Result};

const APP_DIR_NAME: &str = "pi_jukebox";
const CONFIG_FILE_NAME: &str = "pi_jukebox.json";
const DEFAULT_MUSIC_FOLDER_NAME: &str = "pi_jukebox";

/// Accepted range for the software debounce window, in milliseconds.
pub const BOUNCE_TIME_RANGE_MS: std::ops::RangeInclusive<u64> = 20..=200;

/// Top-level configuration structure for the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JukeboxConfig {
    /// Directory searched for tracks at startup.
    pub music_folder: PathBuf,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            music_folder: default_music_folder(),
            gpio: GpioConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

impl JukeboxConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, creating it from defaults first if it does not exist yet.
    ///
    /// A freshly written configuration also gets its music folder created so
    /// the first run finds an (empty) library instead of failing.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.is_file() {
            tracing::info!(path = %path.display(), "config file found");
            return Self::load(path);
        }

        tracing::info!(path = %path.display(), "creating initial config file");
        let config = Self::default();
        config.save(path)?;
        if !config.music_folder.is_dir() {
            tracing::info!(folder = %config.music_folder.display(), "creating music folder");
            fs::create_dir_all(&config.music_folder)?;
        }
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut raw = serde_json::to_string_pretty(self)?;
        raw.push('\n');
        fs::write(path, raw)?;
        Ok(())
    }

    /// Checks every value the controller relies on at startup.
    pub fn validate(&self) -> Result<()> {
        if self.music_folder.as_os_str().is_empty() {
            return Err(JukeboxError::config("`music_folder` must not be empty"));
        }
        self.gpio.validate()?;
        self.player.validate()
    }
}

/// Pin assignment and debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// BCM input pin per button, in button order.
    pub button_pins: Vec<u8>,
    /// BCM output pin per button LED, in button order.
    pub led_pins: Vec<u8>,
    /// Software debounce window.
    pub bounce_time_ms: u64,
    /// Filter applied by the GPIO driver itself before our debouncer sees an
    /// edge. Not reliable on its own.
    pub hardware_bounce_ms: u64,
    /// Buttons pull the line low when pressed, so `falling` is a press.
    pub edge: EdgePolicy,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            button_pins: vec![5, 6, 13, 19, 26, 16, 20, 21],
            led_pins: vec![4, 17, 27, 22, 23, 24, 25, 12],
            bounce_time_ms: 100,
            hardware_bounce_ms: 10,
            edge: EdgePolicy::Falling,
        }
    }
}

impl GpioConfig {
    pub fn bounce_time(&self) -> Duration {
        Duration::from_millis(self.bounce_time_ms)
    }

    pub fn hardware_bounce(&self) -> Duration {
        Duration::from_millis(self.hardware_bounce_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.button_pins.is_empty() {
            return Err(JukeboxError::config("`gpio.button_pins` is empty"));
        }
        if self.led_pins.len() < self.button_pins.len() {
            return Err(JukeboxError::config(format!(
                "`gpio.led_pins` lists {} pins but {} buttons are configured",
                self.led_pins.len(),
                self.button_pins.len()
            )));
        }
        if !BOUNCE_TIME_RANGE_MS.contains(&self.bounce_time_ms) {
            return Err(JukeboxError::config(format!(
                "`gpio.bounce_time_ms` must be within {}..={} ms, got {}",
                BOUNCE_TIME_RANGE_MS.start(),
                BOUNCE_TIME_RANGE_MS.end(),
                self.bounce_time_ms
            )));
        }
        if self.hardware_bounce_ms >= self.bounce_time_ms {
            return Err(JukeboxError::config(
                "`gpio.hardware_bounce_ms` must be shorter than `gpio.bounce_time_ms`",
            ));
        }

        let mut seen = HashSet::new();
        for pin in self.button_pins.iter().chain(&self.led_pins) {
            if !seen.insert(*pin) {
                return Err(JukeboxError::config(format!(
                    "GPIO pin {pin} is assigned more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Media and poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Normalised position past which a track counts as finished.
    pub song_end_position: f64,
    pub poll_hz: u32,
    /// Fixed output volume, 0.0 to 1.0.
    pub volume: f32,
    /// Audio device name. `None` uses the system default.
    pub output_device: Option<String>,
    /// Upper bound for a single media backend call.
    pub call_timeout_ms: u64,
    /// File extensions picked up by track discovery.
    pub extensions: Vec<String>,
    /// Length of the LED flash at startup. Zero disables it.
    pub startup_flash_ms: u64,
    /// Track length assumed by the dry-run player.
    pub simulated_track_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            song_end_position: 0.990,
            poll_hz: 20,
            volume: 1.0,
            output_device: None,
            call_timeout_ms: 500,
            extensions: ["mp3", "ogg", "flac", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            startup_flash_ms: 100,
            simulated_track_secs: 30,
        }
    }
}

impl PlayerConfig {
    /// Interval between position polls. The rate is clamped to 1..=1000 so an
    /// unvalidated config still yields a usable period.
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(1) / self.poll_hz.clamp(1, 1000)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn startup_flash(&self) -> Duration {
        Duration::from_millis(self.startup_flash_ms)
    }

    pub fn simulated_track_length(&self) -> Duration {
        Duration::from_secs(self.simulated_track_secs)
    }

    fn validate(&self) -> Result<()> {
        // players report at most 1.0, so a threshold of 1.0 is never crossed
        if !(self.song_end_position > 0.0 && self.song_end_position < 1.0) {
            return Err(JukeboxError::config(format!(
                "`player.song_end_position` must be in (0, 1), got {}",
                self.song_end_position
            )));
        }
        if !(1..=1000).contains(&self.poll_hz) {
            return Err(JukeboxError::config(format!(
                "`player.poll_hz` must be within 1..=1000, got {}",
                self.poll_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(JukeboxError::config(format!(
                "`player.volume` must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }
        if self.call_timeout_ms == 0 {
            return Err(JukeboxError::config("`player.call_timeout_ms` must be positive"));
        }
        if self.simulated_track_secs == 0 {
            return Err(JukeboxError::config(
                "`player.simulated_track_secs` must be positive",
            ));
        }
        if self.extensions.is_empty() {
            return Err(JukeboxError::config("`player.extensions` is empty"));
        }
        Ok(())
    }
}

/// Location of the configuration file in the user's config directory.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| JukeboxError::msg("unable to determine the user config directory"))
}

fn default_music_folder() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(DEFAULT_MUSIC_FOLDER_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> JukeboxConfig {
        JukeboxConfig {
            music_folder: PathBuf::from("/srv/music"),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        valid().validate().expect("defaults should validate");
    }

    #[test]
    fn partial_file_falls_back_to_section_defaults() {
        let config: JukeboxConfig = serde_json::from_str(
            r#"{ "music_folder": "/srv/music", "gpio": { "button_pins": [18], "led_pins": [23] } }"#,
        )
        .unwrap();

        assert_eq!(config.gpio.button_pins, vec![18]);
        assert_eq!(config.gpio.bounce_time_ms, 100);
        assert_eq!(config.gpio.edge, EdgePolicy::Falling);
        assert_eq!(config.player.song_end_position, 0.990);
        assert_eq!(config.player.poll_hz, 20);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_short_led_list() {
        let mut config = valid();
        config.gpio.led_pins.truncate(3);

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("led_pins"));
    }

    #[test]
    fn rejects_out_of_range_bounce_time() {
        let mut config = valid();
        config.gpio.bounce_time_ms = 5;
        assert!(config.validate().is_err());

        config.gpio.bounce_time_ms = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_end_position() {
        let mut config = valid();
        config.player.song_end_position = 0.0;
        assert!(config.validate().is_err());

        config.player.song_end_position = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_end_position_players_cannot_pass() {
        let mut config = valid();
        config.player.song_end_position = 1.0;

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("song_end_position"));

        config.player.song_end_position = 0.999;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_shared_pins() {
        let mut config = valid();
        config.gpio.led_pins[0] = config.gpio.button_pins[0];

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("more than once"));
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"music_folder\": ").unwrap();

        let err = JukeboxConfig::load(&path).unwrap_err();
        assert!(matches!(err, JukeboxError::ConfigFormat(_)));
    }

    #[test]
    fn init_writes_file_that_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = valid();
        config.music_folder = dir.path().join("music");
        config.save(&path).unwrap();

        let loaded = JukeboxConfig::load_or_init(&path).unwrap();
        assert_eq!(loaded.music_folder, dir.path().join("music"));
        assert_eq!(loaded.gpio.button_pins, config.gpio.button_pins);
    }

    #[test]
    fn poll_period_follows_rate() {
        let player = PlayerConfig::default();
        assert_eq!(player.poll_period(), Duration::from_millis(50));
    }

    #[test]
    fn poll_period_survives_unvalidated_rate() {
        let mut player = PlayerConfig::default();
        player.poll_hz = 0;
        assert_eq!(player.poll_period(), Duration::from_secs(1));

        player.poll_hz = 50_000;
        assert_eq!(player.poll_period(), Duration::from_millis(1));
    }
}
