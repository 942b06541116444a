use loop_player::cli::{CliArgs, USAGE};
use loop_player::telemetry::init_logging;
use loop_player::{play, PlayerSettings};

/// Exit code for any setup or playback failure
const EXIT_FAILURE: i32 = -1;

fn main() {
    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("loop-player: {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let settings = match PlayerSettings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("loop-player: failed to load settings: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    // Keep the guard alive for the program duration
    let log_guard = match init_logging(&settings.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Loop Player v{}", env!("CARGO_PKG_VERSION"));

    match play(&args.source, &settings, args.max_frames) {
        Ok(exit) => tracing::info!(?exit, "exiting"),
        Err(e) => {
            match e.code() {
                Some(code) => eprintln!("loop-player: {} (code {})", e, code),
                None => eprintln!("loop-player: {}", e),
            }
            drop(log_guard);
            std::process::exit(EXIT_FAILURE);
        }
    }
}
