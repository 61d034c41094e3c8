//! Core library for the Pi Jukebox controller.
//!
//! A bank of buttons, each bound to one track, with one LED per button that
//! is lit while its track plays. The modules split the controller into its
//! moving parts: configuration, track discovery and binding, the GPIO seam,
//! debouncing, the media player seam, the playback state machine, LED
//! polling, and the runtime loop that ties them together.

pub mod binding;
pub mod config;
pub mod debounce;
pub mod error;
pub mod hardware;
pub mod library;
pub mod player;
pub mod poller;
pub mod runtime;
pub mod session;

pub use binding::{bind_buttons, Button};
pub use config::{default_config_path, GpioConfig, JukeboxConfig, PlayerConfig};
pub use debounce::{ButtonPress, Debouncer, EdgePolicy, SettleWorker};
pub use error::{JukeboxError, Result};
pub use hardware::{Board, InputReader, Level, SimulatedBoard, SimulatedPins, TransitionHandler};
pub use library::discover_tracks;
pub use player::{ClockPlayer, MediaPlayer, STOPPED_POSITION};
pub use poller::{LedFrame, LedSync};
pub use runtime::Jukebox;
pub use session::{classify_position, PlaybackSession, PlaybackState, PositionClass, PressOutcome};

#[cfg(feature = "rpi")]
pub use hardware::RpiBoard;
#[cfg(feature = "audio")]
pub use player::RodioPlayer;
