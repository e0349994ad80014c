//! TopGUW command line decoder
//!
//! Decodes one GSM logical channel from a capture file through the external
//! decoder and prints the frames as JSON.

mod settings;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gsm_channels::{CancelToken, Cell, Channel, DecodeContext, Frame, RrMessage};
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Radio resource messages that can be searched for
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MessageArg {
    ImmediateAssignment,
    CipheringModeCommand,
    Si5,
    Si6,
}

impl From<MessageArg> for RrMessage {
    fn from(arg: MessageArg) -> Self {
        match arg {
            MessageArg::ImmediateAssignment => RrMessage::IMMEDIATE_ASSIGNMENT,
            MessageArg::CipheringModeCommand => RrMessage::CIPHERING_MODE_COMMAND,
            MessageArg::Si5 => RrMessage::SYSTEM_INFORMATION_5,
            MessageArg::Si6 => RrMessage::SYSTEM_INFORMATION_6,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "topguw", version, about = "Decode a GSM logical channel from a capture file")]
struct Args {
    /// Channel type (SDCCH8, BCCH)
    channel: String,

    /// Timeslot (0-7)
    #[arg(short, long)]
    timeslot: u8,

    /// Sub-slot; omit for channels without one
    #[arg(short = 'u', long)]
    subslot: Option<u8>,

    /// Capture file recorded from the cell
    #[arg(short, long)]
    capture: PathBuf,

    /// Cell frequency, as accepted by the decoder
    #[arg(short, long)]
    frequency: String,

    /// A5 algorithm version
    #[arg(long, requires = "kc")]
    a5: Option<String>,

    /// Session key Kc
    #[arg(long, requires = "a5")]
    kc: Option<String>,

    /// Decoder executable, overrides the settings file
    #[arg(long)]
    decoder: Option<PathBuf>,

    /// Settings file (default: $XDG_CONFIG_HOME/topguw/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,

    /// Print only the frame numbers carrying this message
    #[arg(long, value_enum)]
    find: Option<MessageArg>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON output, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topguw=info,gsm_channels=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(decoder) = &args.decoder {
        settings.decoder.program = decoder.clone();
    }
    if args.save_settings {
        let path = args
            .settings
            .clone()
            .or_else(Settings::settings_path)
            .context("Could not determine settings path")?;
        settings.save(&path)?;
        tracing::info!("Saved settings to {}", path.display());
    }

    let mut channel = Channel::decoder(
        &args.channel,
        args.timeslot,
        args.subslot,
        Some(args.capture.clone()),
    )?;

    let key: Vec<String> = args.a5.iter().chain(args.kc.iter()).cloned().collect();
    let cancel = CancelToken::new();
    let ctx = DecodeContext::new(Cell::new(args.frequency.clone()))
        .with_device(settings.device.clone())
        .with_decoder(settings.decoder.clone())
        .with_key(key)
        .with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping decoder");
            cancel.cancel();
        }
    });

    let kind = channel.kind();
    channel
        .start_async(&ctx)
        .await
        .with_context(|| format!("Failed to decode {} on timeslot {}", kind, args.timeslot))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.find {
        Some(msg) => {
            let numbers = channel.find_message(msg.into());
            serde_json::to_writer_pretty(&mut out, &numbers)?;
        }
        None => {
            let frames: Vec<Frame> = channel
                .into_frames()
                .map(|frames| frames.into_values().collect())
                .unwrap_or_default();
            serde_json::to_writer_pretty(&mut out, &frames)?;
        }
    }
    writeln!(out)?;

    Ok(())
}
