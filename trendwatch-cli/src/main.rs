use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trendwatch_cli::export::{export_to_file, summary_line};
use trendwatch_cli::{App, EnvelopeSource, Settings};
use trendwatch_engine::{MonitorRegistry, TimeFrame};

#[derive(Parser, Debug)]
#[command(name = "trendwatch")]
#[command(about = "Forecast live metric streams and estimate when they cross a threshold")]
struct Args {
    /// Read envelopes from a file instead of stdin
    #[arg(short, long, conflicts_with = "connect")]
    file: Option<PathBuf>,

    /// Read envelopes from a TCP endpoint (host:port)
    #[arg(short, long, conflicts_with = "file")]
    connect: Option<String>,

    /// Topic to monitor; repeat for several. Without any, every topic seen
    /// on the stream is monitored
    #[arg(short, long)]
    topic: Vec<String>,

    /// Threshold for all monitored topics
    #[arg(long)]
    threshold: Option<f64>,

    /// Initial time frame (2h, 8h, 1d, 1w, 1m)
    #[arg(long)]
    timeframe: Option<TimeFrame>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append prediction records to this file
    #[arg(long)]
    persist: Option<PathBuf>,

    /// Send prediction records to this TCP endpoint (host:port)
    #[arg(long)]
    persist_tcp: Option<String>,

    /// POST prediction records to this URL (requires the `http` feature)
    #[arg(long)]
    persist_http: Option<String>,

    /// Seed the forecast noise for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Write the final state of every topic to this JSON file
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    apply_args(&mut settings, &args);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, settings))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Flags override the file and the environment.
fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(threshold) = args.threshold {
        settings.engine.default_threshold = threshold;
    }
    if let Some(time_frame) = args.timeframe {
        settings.engine.default_time_frame = time_frame;
    }
    for topic in &args.topic {
        if !settings.topics.contains(topic) {
            settings.topics.push(topic.clone());
        }
    }
    if let Some(path) = &args.persist {
        settings.persist.file = Some(path.clone());
    }
    if let Some(addr) = &args.persist_tcp {
        settings.persist.tcp = Some(addr.clone());
    }
    if let Some(url) = &args.persist_http {
        settings.persist.http = Some(url.clone());
    }
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut builder = MonitorRegistry::builder().settings(settings.engine.clone());
    for output in settings.persist.outputs()? {
        builder = builder.output(output);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let registry = builder.build();

    for topic in &settings.topics {
        registry.subscribe(topic);
    }
    let thresholds: Vec<(String, f64)> = settings
        .thresholds
        .iter()
        .map(|(topic, threshold)| (topic.clone(), *threshold))
        .collect();
    let applied = registry.set_thresholds(&thresholds).await;
    if applied < thresholds.len() {
        warn!(
            configured = thresholds.len(),
            applied, "Some thresholds name topics that are not monitored"
        );
    }

    let default_topic = match settings.topics.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };
    let auto_subscribe = settings.topics.is_empty();
    let mut source = open_source(&args, default_topic).await?;
    info!(
        source = %source.description(),
        topics = registry.len(),
        auto_subscribe,
        "Monitoring"
    );

    let mut app = App::new(registry, auto_subscribe);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            envelope = source.recv() => match envelope {
                Some(envelope) => {
                    app.route(envelope).await;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    let models = app.registry.sync_all().await;
    for model in models.values() {
        println!("{}", summary_line(model));
    }
    if let Some(path) = &args.export {
        export_to_file(&models, path)?;
        info!(path = %path.display(), topics = models.len(), "Exported");
    }

    if source.malformed() > 0 {
        warn!(lines = source.malformed(), "Skipped malformed input lines");
    }
    if app.stats.unrouted > 0 {
        warn!(envelopes = app.stats.unrouted, "Skipped envelopes for unmonitored topics");
    }
    let dropped = app.registry.dropped_records();
    if dropped > 0 {
        warn!(records = dropped, "Dropped prediction records");
    }

    app.registry.shutdown().await;
    Ok(())
}

async fn open_source(args: &Args, default_topic: Option<String>) -> Result<EnvelopeSource> {
    if let Some(addr) = &args.connect {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        info!(addr = %addr, "Connected");
        return Ok(EnvelopeSource::spawn(stream, addr, default_topic));
    }
    if let Some(path) = &args.file {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        return Ok(EnvelopeSource::spawn(file, &path.display().to_string(), default_topic));
    }
    Ok(EnvelopeSource::spawn(tokio::io::stdin(), "stdin", default_topic))
}
