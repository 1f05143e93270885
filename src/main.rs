use anyhow::Result;
use clap::Parser;
use stt_relay::audio::list_input_devices;
use stt_relay::{app, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "stt-relay")]
#[command(about = "Stream microphone audio to a realtime STT server")]
struct Args {
    /// Configuration file (TOML, extension optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Input device name (overrides config)
    #[arg(long)]
    device: Option<String>,

    /// Model identifier (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Language code (overrides config)
    #[arg(long)]
    language: Option<String>,

    /// Directory for session artifacts (overrides config)
    #[arg(long)]
    output_dir: Option<String>,

    /// List audio input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if args.list_devices {
        for name in list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(device) = args.device {
        config.audio.device = Some(device);
    }
    if let Some(model) = args.model {
        config.server.model = model;
    }
    if let Some(language) = args.language {
        config.server.language = language;
    }
    if let Some(output_dir) = args.output_dir {
        config.recording.output_dir = output_dir;
    }

    config.validate()?;

    let summary = app::run(config).await?;

    // Transport faults surface through the exit code; a signal or a clean
    // peer close does not.
    if summary.stop_reason.is_fault() {
        std::process::exit(1);
    }

    Ok(())
}
