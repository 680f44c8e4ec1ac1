//! livetv-tuner: inspect M3U tuner sources from the command line.
//!
//! Every subcommand prints JSON on stdout; logs go to stderr and the log
//! directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use livetv_model::{MediaSourceDescriptor, TransportKind};
use livetv_tuner::config::{self, ConfigFile};
use livetv_tuner::logging;
use livetv_tuner::tuner::SourceUsage;
use livetv_tuner::{
    LeaseSupervisor, M3uTunerHost, PlaylistFetcher, PrivateNetwork, TunerAllocator,
    TunerHostRegistry,
};

/// livetv-tuner - Tuner-backed live TV from M3U playlists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the channel catalogue of one or every enabled source
    Channels {
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Show configured tuners and their current slot usage
    Tuners,
    /// Check that sources are reachable and parseable
    Validate {
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Look for sources on the network
    Discover {
        #[arg(long, default_value = "3000")]
        timeout_ms: u64,
    },
    /// Describe how a channel would be played
    MediaSource {
        #[arg(short, long)]
        source: String,
        #[arg(short, long)]
        channel: String,
    },
}

#[derive(Serialize)]
struct TunersOutput {
    tuners: Vec<livetv_model::TunerInfo>,
    usage: Vec<SourceUsage>,
}

#[derive(Serialize)]
struct ValidationOutput {
    source_id: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct MediaSourceOutput {
    media_sources: Vec<MediaSourceDescriptor>,
    transport: TransportKind,
}

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_RETENTION_DAYS: u64 = 7;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path > auto-detect > defaults
    let file_config = match config::resolve_config_path(args.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence for the log directory
    let log_dir = args.log_dir.clone().unwrap_or_else(|| {
        PathBuf::from(
            file_config
                .logging
                .log_dir
                .as_deref()
                .unwrap_or(DEFAULT_LOG_DIR),
        )
    });
    let retention_days = file_config
        .logging
        .retention_days
        .unwrap_or(DEFAULT_RETENTION_DAYS);
    logging::init_logging(
        &log_dir,
        retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    let ConfigFile {
        lease,
        network,
        sources,
        ..
    } = file_config;

    let allocator = TunerAllocator::new();
    let network = Arc::new(PrivateNetwork::new().with_local_hosts(network.local_hosts));
    let host = M3uTunerHost::new(PlaylistFetcher::new()?, network, allocator.clone());

    let mut registry = TunerHostRegistry::new(sources)?;
    registry.register_host(Arc::new(host));
    info!(
        "livetv-tuner starting with {} configured source(s)",
        registry.sources().len()
    );

    let cancel = CancellationToken::new();
    let supervisor = LeaseSupervisor::new(allocator.clone(), lease).spawn(cancel.clone());
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    let result = run(args.command, &registry, &allocator, &cancel).await;

    cancel.cancel();
    if let Some(handle) = supervisor {
        let _ = handle.await;
    }

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

async fn run(
    command: Command,
    registry: &TunerHostRegistry,
    allocator: &TunerAllocator,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Channels { source: Some(id) } => {
            let channels = registry.list_channels(&id, cancel).await?;
            print_json(&channels)
        }
        Command::Channels { source: None } => {
            let catalogues = registry.list_all_channels(cancel).await;
            print_json(&catalogues)
        }
        Command::Tuners => print_json(&TunersOutput {
            tuners: registry.tuner_infos(),
            usage: allocator.snapshot(),
        }),
        Command::Validate { source } => {
            let ids: Vec<String> = match source {
                Some(id) => vec![registry.source(&id)?.id.clone()],
                None => registry.sources().iter().map(|s| s.id.clone()).collect(),
            };

            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                let outcome = registry.validate(&id, cancel).await;
                if let Err(e) = &outcome {
                    warn!("Source {} failed validation: {}", id, e);
                }
                results.push(ValidationOutput {
                    source_id: id,
                    valid: outcome.is_ok(),
                    error: outcome.err().map(|e| e.to_string()),
                });
            }
            print_json(&results)
        }
        Command::Discover { timeout_ms } => {
            let found = registry
                .discover_sources(Duration::from_millis(timeout_ms))
                .await;
            print_json(&found)
        }
        Command::MediaSource { source, channel } => {
            let channel = registry.find_channel(&source, &channel, cancel).await?;
            let source = registry.source(&source)?;
            let host = registry.host_for(source)?;
            let media_sources = host.channel_media_sources(source, &channel)?;
            let transport = media_sources
                .first()
                .map(|ms| host.choose_transport(source, ms))
                .unwrap_or(TransportKind::BufferedLoop);
            print_json(&MediaSourceOutput {
                media_sources,
                transport,
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
