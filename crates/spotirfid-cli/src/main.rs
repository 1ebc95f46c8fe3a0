//! Command-line front end for the SpotiRFID reader engine.
//!
//! ```sh
//! spotirfid check --config config.json
//! spotirfid simulate --config config.json --pending spotify:album:999
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotirfid_core::{AppConfig, AuthKey};
use spotirfid_hardware::mock::{MockIndicator, MockPicc, MockPiccHandle, SimulatedTag};
use spotirfid_rfid::{CardSession, StorageCodec};
use spotirfid_workflow::{MockRemote, ScanLoop, ScanOutcome, WorkflowState};

/// UID given to the simulated master tag.
const MASTER_TAG_UID: [u8; 4] = [0x04, 0x99, 0x88, 0x77];

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a configuration file and print it
    Check {
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
    /// Run a master, write and report cycle against a simulated reader
    Simulate {
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Value the remote service hands out for writing
        #[arg(long, short = 'p')]
        pending: Option<String>,

        /// Kind of tag to write to
        #[arg(long, value_enum, default_value_t = TagKind::Ultralight)]
        tag: TagKind,

        /// UID of the tag to write to, as hex
        #[arg(long, default_value = "04A1B2C3")]
        uid: String,

        /// Key A programmed on the simulated tag, as hex
        #[arg(long)]
        tag_key: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TagKind {
    Ultralight,
    Classic,
}

impl TagKind {
    fn tag(self, uid: Vec<u8>) -> SimulatedTag {
        match self {
            TagKind::Ultralight => SimulatedTag::ultralight(uid),
            TagKind::Classic => SimulatedTag::classic_1k(uid),
        }
    }
}

fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let text = text.trim();
    if !text.is_ascii() {
        bail!("hex string {text:?} contains non-ASCII characters");
    }
    if text.len() % 2 != 0 {
        bail!("hex string {text:?} has an odd number of digits");
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .with_context(|| format!("invalid hex digits in {text:?}"))
        })
        .collect()
}

fn parse_key(text: &str) -> anyhow::Result<AuthKey> {
    let bytes = parse_hex(text)?;
    let key: [u8; 6] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("key must be 6 bytes"))?;
    Ok(AuthKey::new(key))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "spotirfid=debug" } else { "spotirfid=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn check(path: &Path) -> anyhow::Result<()> {
    let mut config = AppConfig::load(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    if !config.wifi.password.is_empty() {
        config.wifi.password = "********".to_string();
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("Configuration OK");
    Ok(())
}

/// Take the tag out of the field after `delay`, then present it again after `delay`.
fn lift_and_replace(field: &MockPiccHandle, delay: Duration) {
    let field = field.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(tag) = field.remove() {
            info!("Simulated tag lifted from reader");
            tokio::time::sleep(delay).await;
            field.present(tag);
            info!("Simulated tag presented again");
        }
    });
}

async fn simulate(
    path: &Path,
    pending: Option<String>,
    kind: TagKind,
    uid: &str,
    tag_key: Option<&str>,
) -> anyhow::Result<()> {
    let config = AppConfig::load(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    let marker = config.master_marker()?;
    let timing = config.session_timing();
    let uid = parse_hex(uid)?;

    let mut target = kind.tag(uid);
    if let Some(key) = tag_key {
        target = target.with_key(parse_key(key)?);
    }

    let (chip, field) = MockPicc::new();
    let mut session = CardSession::new(chip, timing);
    session.init().await.context("reader did not initialize")?;

    let mut remote = MockRemote::new(config.worker.reader_id.clone());
    remote.set_pending_value(pending);

    let indicator = MockIndicator::new();
    let mut scan_loop = ScanLoop::new(session, StorageCodec::default(), remote, indicator.clone());
    let mut state = WorkflowState::new(marker);

    info!(pins = ?config.rfid, led = config.led_pin, "Simulated reader ready");

    let master = kind
        .tag(MASTER_TAG_UID.to_vec())
        .with_user_data(config.master_tag_id.as_bytes());
    field.present(master);
    let outcome = scan_loop.run_iteration(&mut state).await;
    println!("master tag:   {outcome:?}");
    field.remove();

    field.present(target);
    lift_and_replace(&field, timing.removal_timeout / 4);
    let outcome = scan_loop.run_iteration(&mut state).await;
    println!("write cycle:  {outcome:?}");

    let mut outcome = ScanOutcome::NoCard;
    let deadline = tokio::time::Instant::now() + timing.removal_timeout;
    while outcome == ScanOutcome::NoCard && tokio::time::Instant::now() < deadline {
        outcome = scan_loop.run_iteration(&mut state).await;
    }
    println!("next scan:    {outcome:?}");

    println!("mode:         {}", state.mode());
    println!("indicator on: {}", indicator.is_on());
    for request in scan_loop.remote().requests() {
        println!("POST {}", request.to_json()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check { config } => check(&config),
        Command::Simulate {
            config,
            pending,
            tag,
            uid,
            tag_key,
        } => simulate(&config, pending, tag, &uid, tag_key.as_deref()).await,
    }
}
