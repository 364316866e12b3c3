use std::path::PathBuf;

use log::{error, info, warn};
use rhythm_player::messaging::host::spawn_stdin_reader;
use rhythm_player::{
    AudioEngine, ConfigSource, PlayerConfig, RhythmPlayer, create_command_channel,
};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

fn main() {
    let explicit_config = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, source) = PlayerConfig::load(explicit_config.as_deref());

    // stdout is left to the host; logs go to stderr
    TermLogger::init(
        config.log_level_filter(),
        ConfigBuilder::default().build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .unwrap_or_else(|err| {
        eprintln!("init_logger error: {:?}", err);
    });

    match source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => info!("No config file, using defaults"),
        ConfigSource::Fallback { path, error } => {
            warn!("Could not use config {}: {}; using defaults", path.display(), error)
        }
    }

    info!("Audio engine initialisation...");
    let engine = match AudioEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Audio output unavailable: {}", e);
            return;
        }
    };

    let (command_tx, command_rx) = create_command_channel(config.command_capacity);
    if let Err(e) = spawn_stdin_reader(command_tx) {
        error!("Failed to start host reader: {}", e);
        return;
    }

    let mut player = RhythmPlayer::new(engine, config.tempo(), config.tone);
    info!("Rhythm player ready at {}", player.tempo());

    player.run(&command_rx);
}
