use anyhow::Context as _;
use clap::Parser;
use decision_engine::config::Settings;
use decision_engine::execution::{ExchangeTrade, PublishingTrader};
use decision_engine::protocol::{Envelope, JsonFrame};
use decision_engine::strategy::MavgStrategy;
use decision_engine::Engine;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Automated trading decision engine
///
/// Reads inbound envelopes as JSON lines and writes outbound requests as JSON lines to
/// stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "decision-engine", version)]
struct Cli {
    /// Settings file (defaults to engine.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay file of inbound envelopes; stdin when omitted
    #[arg(short, long)]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    setup_logging(&settings.log_filter);

    tracing::info!("Decision engine starting");

    // Outbound requests from every exchange adapter
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Envelope>();
    let traders: Vec<Box<dyn ExchangeTrade>> = settings
        .exchanges
        .iter()
        .map(|exchange| {
            Box::new(PublishingTrader::new(
                exchange.name.as_str(),
                exchange.face_values.clone(),
                outbound_tx.clone(),
            )) as Box<dyn ExchangeTrade>
        })
        .collect();
    drop(outbound_tx);

    let mut engine = Engine::new(&settings, traders)?;
    if let Some(mavg) = settings.mavg.clone() {
        engine.register_strategy(Box::new(MavgStrategy::new(mavg)?))?;
    }

    let writer = tokio::spawn(write_outbound(outbound_rx));

    let (inbound_tx, inbound_rx) = mpsc::channel(settings.queue_capacity);
    let reader = tokio::spawn(read_inbound(cli.replay, inbound_tx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, stopping after the current message");
            let _ = shutdown_tx.send(true);
        }
    });

    let context = engine.run(inbound_rx, shutdown_rx).await;

    tracing::info!(
        positions = context.keeper().positions().count(),
        open_orders = context.keeper().orders().len(),
        pending_requests = context.keeper().feedback().len(),
        dropped_candles = context.candles().dropped_samples(),
        "Final state"
    );

    reader.abort();
    // adapters hold the last outbound senders
    drop(context);
    writer.await??;

    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Feed JSON-line frames into the dispatch queue until end of input
async fn read_inbound(path: Option<PathBuf>, inbound: mpsc::Sender<Envelope>) -> anyhow::Result<()> {
    let source: Box<dyn AsyncBufRead + Unpin + Send> = match &path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open replay file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = source.lines();
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let frame: JsonFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(line = line_no, "Skipping malformed frame: {}", e);
                continue;
            }
        };
        let envelope = frame.into_envelope()?;
        if inbound.send(envelope).await.is_err() {
            // dispatch worker already stopped
            break;
        }
    }

    tracing::info!(lines = line_no, "Inbound stream finished");
    Ok(())
}

/// Publish outbound envelopes as JSON lines on stdout
async fn write_outbound(mut outbound: mpsc::UnboundedReceiver<Envelope>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(envelope) = outbound.recv().await {
        let frame = JsonFrame::from_envelope(&envelope)?;
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}
