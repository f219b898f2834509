use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use nip94_action::{
    build_metadata_event, env_fallback, error_annotation, sign_event, validate_inputs,
    viewer_links, ActionOutputs, Error, NostrRelayConnector, PublisherConfig, RawInputs,
    RelayPublisher, ValidationProfile, CUSTOM_TAGS_ENV, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_MIN_ACKS, DEFAULT_PUBLISH_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "nip94-publish")]
#[command(about = "Publish a NIP-94 file metadata event to Nostr relays")]
struct Args {
    /// Comma separated wss:// relay URLs.
    #[arg(long, env = "INPUT_RELAYS", default_value = "")]
    relays: String,
    #[arg(long, env = "INPUT_URL", default_value = "")]
    url: String,
    #[arg(long, env = "INPUT_MIMETYPE", default_value = "")]
    mime_type: String,
    /// SHA-256 of the file, hex.
    #[arg(long, env = "INPUT_FILEHASH", default_value = "")]
    file_hash: String,
    #[arg(long, env = "INPUT_CONTENT")]
    content: Option<String>,
    /// nsec1 bech32 or 64 hex characters.
    #[arg(long, env = "INPUT_NSEC", default_value = "", hide_env_values = true, hide_default_value = true)]
    nsec: String,
    #[arg(long, env = "INPUT_ORIGINALHASH")]
    original_hash: Option<String>,
    #[arg(long, env = "INPUT_SIZE")]
    size: Option<String>,
    #[arg(long, env = "INPUT_DIMENSIONS")]
    dimensions: Option<String>,
    #[arg(long, env = "INPUT_FILENAME")]
    filename: Option<String>,
    /// JSON object of extra tags, e.g. {"version":"1.2.0"}. Also read from
    /// INPUT_CUSTOMTAGSJSON or INPUT_CUSTOM_TAGS_JSON.
    #[arg(long)]
    custom_tags_json: Option<String>,
    #[arg(long, env = "INPUT_REQUIREORIGINALHASH")]
    require_original_hash: bool,
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_PUBLISH_TIMEOUT_SECS)]
    publish_timeout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_MIN_ACKS)]
    min_acks: usize,
    /// Stop waiting on remaining relays once this many have acknowledged.
    #[arg(long)]
    stop_after_acks: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding relay attempts");
            on_signal.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "Publish failed");
            println!("{}", error_annotation(&err.to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<(), Error> {
    let profile = if args.require_original_hash {
        ValidationProfile::Strict
    } else {
        ValidationProfile::Standard
    };

    let raw = RawInputs {
        relays: args.relays,
        url: args.url,
        mime_type: args.mime_type,
        file_hash: args.file_hash,
        content: args.content,
        original_hash: args.original_hash,
        size: args.size,
        dimensions: args.dimensions,
        filename: args.filename,
        custom_tags_json: args
            .custom_tags_json
            .or_else(|| env_fallback(&CUSTOM_TAGS_ENV)),
        nsec: SecretString::from(args.nsec),
    };
    let inputs = validate_inputs(&raw, profile)?;
    drop(raw);

    let metadata = build_metadata_event(&inputs.file);
    if let Ok(json) = serde_json::to_string(&metadata) {
        debug!(event = %json, "Built file metadata event");
    }
    let event = sign_event(&metadata, inputs.secret_key)?;
    info!(event_id = %event.id_hex(), pubkey = %event.pubkey_hex(), "Signed file metadata event");

    let mut config = PublisherConfig {
        min_acks: args.min_acks,
        ..PublisherConfig::default()
    }
    .with_timeouts(
        Duration::from_secs(args.connect_timeout_secs),
        Duration::from_secs(args.publish_timeout_secs),
    );
    if let Some(acks) = args.stop_after_acks {
        config = config.with_stop_after_acks(acks);
    }

    let connector = Arc::new(NostrRelayConnector::new(config.connect_timeout));
    let report = RelayPublisher::new(connector, config)
        .publish_with_cancel(&inputs.relays, &event, cancel)
        .await?;

    info!(
        event_id = %report.event_id,
        note_id = %report.note_id,
        success = report.success(),
        failed = report.failed(),
        "Publish complete"
    );
    for link in viewer_links(&report.note_id) {
        info!(link = %link, "View event");
    }

    ActionOutputs::from_report(&report).write_from_env()?;
    Ok(())
}
