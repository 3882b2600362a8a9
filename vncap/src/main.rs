//! vncap — entry point.
//!
//! ```text
//! vncap                         Record with settings from vncap.toml
//! vncap --out clip.gif          Write to a different file
//! vncap --fps 10                Periodic capture at 10 frames per second
//! vncap --reactive              Request each frame as the last one lands
//! vncap --duration 5            Stop after 5 seconds
//! vncap --gen-config            Write default config to stdout
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vncap::config::{CaptureMode, VncapConfig};
use vncap::demo::DemoServer;
use vncap::signal::StopSignal;
use vncap_core::{GifTimelineEncoder, Session, record};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vncap", about = "Record a framebuffer session into an animated GIF")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vncap.toml")]
    config: PathBuf,

    /// Output GIF path (overrides `output.path`).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Periodic capture rate in frames per second.
    #[arg(long, conflicts_with = "reactive")]
    fps: Option<f64>,

    /// Request frames as fast as the server answers.
    #[arg(long)]
    reactive: bool,

    /// Stop recording after this many seconds.
    #[arg(short, long)]
    duration: Option<f64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut VncapConfig) {
        if let Some(out) = &self.out {
            config.output.path = out.clone();
        }
        if let Some(fps) = self.fps {
            config.capture.mode = CaptureMode::Periodic;
            config.capture.fps = fps;
        }
        if self.reactive {
            config.capture.mode = CaptureMode::Reactive;
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&VncapConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = VncapConfig::load(&cli.config);
    cli.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let capture = config.to_capture_config()?;
    let limit = match cli.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => return Err(format!("duration must be positive, got {secs}").into()),
        None => None,
    };

    info!("vncap v{}", env!("CARGO_PKG_VERSION"));
    info!("scheduler: {:?}", capture.scheduler);
    info!("canvas: {}x{}", config.demo.width, config.demo.height);
    info!("output: {}", config.output.path.display());

    let cancel = CancellationToken::new();

    // Ctrl-C / SIGTERM handler.
    let stop = StopSignal::install();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        let source = stop.wait().await;
        info!("{source} received, finishing recording");
        on_signal.cancel();
    });

    if let Some(limit) = limit {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!(?limit, "duration reached");
            on_timeout.cancel();
        });
    }

    let (session, peer) = Session::pair(config.demo.width.max(1), config.demo.height.max(1));
    let server = tokio::spawn(DemoServer::new(&config.demo).serve(peer));

    let timeline = record(session, &capture, cancel).await?;
    if server.await.is_err() {
        warn!("demo source task panicked");
    }

    if timeline.is_empty() {
        warn!("no frames captured; nothing written");
        return Ok(());
    }

    let mut writer = BufWriter::new(File::create(&config.output.path)?);
    GifTimelineEncoder::new(config.output.repeat)
        .with_speed(config.output.speed)
        .encode(&timeline, &mut writer)?;
    writer.flush()?;
    info!(
        frames = timeline.len(),
        "wrote {}",
        config.output.path.display()
    );

    Ok(())
}
