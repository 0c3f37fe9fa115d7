use anyhow::{Context, Result};
use api::{FocusCue, ReplayModule, ReplayScript};
use common::{FocusSignal, ProctorConfig};
use log::{debug, error, info, warn};
use proctor_d::sinks::{create_transport_sinks, EventLog, LogSink};
use proctor_d::{http, Perception, ProctorSession};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Args {
    config: PathBuf,
    replay: PathBuf,
    duration_ms: Option<u64>,
}

fn usage() -> &'static str {
    "usage: proctor_d --replay <script.json> [--config <config.json>] [--duration-ms <n>]"
}

fn parse_args() -> Result<Args> {
    let mut config = PathBuf::from("config.json");
    let mut replay = None;
    let mut duration_ms = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = args.next().map(PathBuf::from).context(usage())?,
            "--replay" => replay = args.next().map(PathBuf::from),
            "--duration-ms" => {
                let value = args.next().context(usage())?;
                duration_ms = Some(value.parse().context("--duration-ms expects milliseconds")?);
            }
            other => warn!("Ignoring unknown argument '{}'", other),
        }
    }

    Ok(Args {
        config,
        replay: replay.context(usage())?,
        duration_ms,
    })
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    info!("Starting...");
    debug!("Debug logging is active");

    let args = parse_args()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let config = ProctorConfig::load_or_create(&args.config).unwrap_or_else(|e| {
        error!("Failed to load config: {}. Using defaults.", e);
        ProctorConfig::default()
    });
    info!("Loaded Config: {:?}", config);

    let script = ReplayScript::load(&args.replay)?;
    let run_for = Duration::from_millis(args.duration_ms.unwrap_or(script.duration_ms() + 1000));
    let focus_cues = script.focus.clone();
    let replay = Arc::new(ReplayModule::new(script));

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(async move {
        let mut session = ProctorSession::new(config.clone(), Perception::from_module(replay));

        let event_log = EventLog::new(config.output.log_capacity);
        session.register_sink(Box::new(LogSink));
        session.register_sink(Box::new(event_log.clone()));
        for sink in create_transport_sinks(&config.output) {
            session.register_sink(sink);
        }

        if let Some(port) = config.output.http_port {
            let router = http::get_router(event_log.clone(), session.engine());
            tokio::spawn(async move {
                if let Err(e) = http::serve(port, router).await {
                    error!("HTTP event log failed: {}", e);
                }
            });
        }

        session.start()?;

        if let Some(notifier) = session.focus_notifier() {
            let started = tokio::time::Instant::now();
            tokio::spawn(async move {
                for cue in focus_cues {
                    tokio::time::sleep_until(started + Duration::from_millis(cue.at_ms)).await;
                    let signal = match cue.signal {
                        FocusCue::Hidden => FocusSignal::VisibilityHidden,
                        FocusCue::Blur => FocusSignal::WindowBlur,
                    };
                    if !notifier.notify(signal) {
                        break;
                    }
                }
            });
        }

        let deadline = tokio::time::Instant::now() + run_for;
        while running.load(Ordering::SeqCst) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("Shutting down...");
        session.stop();
        info!("Session recorded {} event(s)", event_log.len());
        for entry in event_log.entries() {
            info!("  {} {}", entry.event.ts, entry.message);
        }
        Ok::<(), anyhow::Error>(())
    })
}
