mod console;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use jukebox_core::{
    bind_buttons, default_config_path, discover_tracks, Board, ClockPlayer, Jukebox,
    JukeboxConfig, JukeboxError, MediaPlayer, SimulatedBoard,
};
use tracing_subscriber::EnvFilter;

fn main() -> jukebox_core::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            music_folder,
            simulate,
            silent,
        } => run(cli.config, music_folder, simulate, silent),
        Commands::InitConfig { force } => init_config(cli.config, force),
        Commands::List { music_folder } => list(cli.config, music_folder),
    }
}

fn run(
    config_path: Option<PathBuf>,
    music_folder: Option<PathBuf>,
    simulate: bool,
    silent: bool,
) -> jukebox_core::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "initializing pi jukebox");
    let config = load_config(config_path, music_folder)?;

    let tracks = discover_tracks(&config.music_folder, &config.player.extensions)?;
    let buttons = bind_buttons(tracks, &config.gpio);

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    shutdown::watch_signals(shutdown_tx.clone())?;

    let board: Box<dyn Board> = if simulate {
        let board = SimulatedBoard::new();
        console::spawn(
            board.pins(),
            &buttons,
            config.gpio.bounce_time() * 2,
            shutdown_tx.clone(),
        )?;
        Box::new(board)
    } else {
        open_board(&config)?
    };
    let player = open_player(&config, silent)?;

    let mut jukebox = Jukebox::new(&config, buttons, board, player);
    jukebox.run(&shutdown_rx)?;

    tracing::info!("exiting");
    Ok(())
}

fn init_config(config_path: Option<PathBuf>, force: bool) -> jukebox_core::Result<()> {
    let path = resolve_config_path(config_path)?;
    if path.exists() && !force {
        return Err(JukeboxError::msg(format!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        )));
    }

    let config = JukeboxConfig::default();
    config.save(&path)?;
    std::fs::create_dir_all(&config.music_folder)?;
    println!("wrote {}", path.display());
    println!("music folder: {}", config.music_folder.display());
    Ok(())
}

fn list(config_path: Option<PathBuf>, music_folder: Option<PathBuf>) -> jukebox_core::Result<()> {
    let config = load_config(config_path, music_folder)?;
    let tracks = discover_tracks(&config.music_folder, &config.player.extensions)?;
    let total = tracks.len();
    let buttons = bind_buttons(tracks, &config.gpio);

    println!("{:>6}  {:>5}  {:>4}  track", "button", "input", "led");
    for button in &buttons {
        println!(
            "{:>6}  {:>5}  {:>4}  {}",
            button.index,
            button.input_pin,
            button.led_pin,
            display_name(&button.track)
        );
    }
    if total > buttons.len() {
        println!("{} track(s) not bound, no buttons left", total - buttons.len());
    }
    Ok(())
}

fn load_config(
    config_path: Option<PathBuf>,
    music_folder: Option<PathBuf>,
) -> jukebox_core::Result<JukeboxConfig> {
    let path = resolve_config_path(config_path)?;
    let mut config = JukeboxConfig::load_or_init(&path)?;
    if let Some(folder) = music_folder {
        config.music_folder = folder;
    }
    config.validate()?;

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn resolve_config_path(config_path: Option<PathBuf>) -> jukebox_core::Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

#[cfg(feature = "rpi")]
fn open_board(config: &JukeboxConfig) -> jukebox_core::Result<Box<dyn Board>> {
    let board = jukebox_core::RpiBoard::open(config.gpio.hardware_bounce())?;
    Ok(Box::new(board))
}

#[cfg(not(feature = "rpi"))]
fn open_board(_config: &JukeboxConfig) -> jukebox_core::Result<Box<dyn Board>> {
    tracing::error!("rebuild with `--features rpi` for GPIO access, or pass --simulate");
    Err(JukeboxError::Unsupported("GPIO"))
}

#[cfg(feature = "audio")]
fn open_player(config: &JukeboxConfig, silent: bool) -> jukebox_core::Result<Box<dyn MediaPlayer>> {
    if silent {
        return Ok(Box::new(ClockPlayer::new(config.player.simulated_track_length())));
    }
    let player = jukebox_core::RodioPlayer::open(
        config.player.output_device.as_deref(),
        config.player.volume,
        config.player.call_timeout(),
    )?;
    Ok(Box::new(player))
}

#[cfg(not(feature = "audio"))]
fn open_player(config: &JukeboxConfig, silent: bool) -> jukebox_core::Result<Box<dyn MediaPlayer>> {
    if !silent {
        tracing::warn!("built without audio support, tracks play silently");
    }
    Ok(Box::new(ClockPlayer::new(config.player.simulated_track_length())))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Button-driven jukebox for the Raspberry Pi", long_about = None)]
struct Cli {
    /// Configuration file. Defaults to the user config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the jukebox until interrupted.
    Run {
        /// Override the music folder from the configuration file.
        #[arg(short, long)]
        music_folder: Option<PathBuf>,
        /// Use an in-memory board driven from stdin instead of GPIO.
        #[arg(long)]
        simulate: bool,
        /// Do not open an audio device; tracks play silently.
        #[arg(long)]
        silent: bool,
    },
    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show which track each button plays.
    List {
        /// Override the music folder from the configuration file.
        #[arg(short, long)]
        music_folder: Option<PathBuf>,
    },
}
