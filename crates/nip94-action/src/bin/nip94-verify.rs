use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use nip94_action::{
    env_fallback, error_annotation, validate_verify_inputs, Error, EventVerifier,
    NostrRelayConnector, RawVerifyInputs, VerifierConfig, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_VERIFY_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "nip94-verify")]
#[command(about = "Check that a published NIP-94 event is served back unchanged")]
struct Args {
    #[arg(long, env = "INPUT_RELAYS", default_value = "")]
    relays: String,
    /// Hex event id or note1 encoding. Falls back to EVENT_ID.
    #[arg(long, env = "INPUT_EVENTID")]
    event_id: Option<String>,
    /// Falls back to EXPECTED_CONTENT.
    #[arg(long, env = "INPUT_EXPECTEDCONTENT")]
    expected_content: Option<String>,
    /// Falls back to FILE_HASH.
    #[arg(long, env = "INPUT_FILEHASH")]
    file_hash: Option<String>,
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_VERIFY_TIMEOUT_SECS)]
    timeout_secs: u64,
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
            warn!("Interrupted; abandoning verification");
            on_signal.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "Verification failed");
            println!("{}", error_annotation(&err.to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<(), Error> {
    let raw = RawVerifyInputs {
        relays: args.relays,
        event_id: input_or(args.event_id, "EVENT_ID"),
        expected_content: input_or(args.expected_content, "EXPECTED_CONTENT"),
        file_hash: input_or(args.file_hash, "FILE_HASH"),
    };
    let request = validate_verify_inputs(&raw)?;

    let config = VerifierConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let connector = Arc::new(NostrRelayConnector::new(config.connect_timeout));
    let verified = EventVerifier::new(connector, config)
        .verify_with_cancel(&request, cancel)
        .await?;

    info!(
        event_id = %verified.event_id,
        relay = %verified.relay,
        pubkey = %verified.pubkey,
        "Event verified"
    );
    Ok(())
}

fn input_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .or_else(|| env_fallback(&[fallback]))
        .unwrap_or_default()
}
