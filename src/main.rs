use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use whip::broadcast::Broadcaster;
use whip::feed;
use whip::{
    Accelerometer, DeadlineTimer, FeedClock, GestureEvent, OutputRange, StreamAccelerometer,
    StreamOrientation, WhipDetector,
};

/// Upper bound on a single wait when no timeout is pending.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Detect whip gestures in a stream of accelerometer readings.
#[derive(Parser, Debug)]
#[command(name = "whip", version, about)]
struct Args {
    /// JSON-lines sensor feed; `-` or omitted reads stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Accelerometer output maximum; 0 advertises no range
    #[arg(short, long, default_value_t = 40.0)]
    range: f64,

    /// Also broadcast detections to clients on this Unix socket
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[derive(Serialize)]
struct Detection<'a> {
    gesture: &'a str,
    t: u64,
}

fn open_input(input: Option<&PathBuf>) -> anyhow::Result<Box<dyn BufRead + Send>> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
        .init();

    let args = Args::parse();

    let broadcaster = match &args.socket {
        Some(path) => {
            let b = Broadcaster::bind(path)?;
            info!("socket at {}", b.path().display());
            Some(b)
        }
        None => None,
    };

    // Feed runs on its own thread; everything else happens here.
    let (tx, rx) = mpsc::channel();
    let reader = open_input(args.input.as_ref())?;
    let feed_thread = feed::spawn(reader, tx);

    let ranges = if args.range > 0.0 {
        vec![OutputRange::symmetric(args.range)]
    } else {
        Vec::new()
    };
    let clock = FeedClock::new();
    let mut det = WhipDetector::new(
        StreamAccelerometer::new(ranges),
        StreamOrientation::new(),
        DeadlineTimer::with_clock(clock.clone()),
    );

    let (event_tx, event_rx) = mpsc::channel();
    det.subscribe(move |event: &GestureEvent| {
        let _ = event_tx.send(event.clone());
    });

    if !det.start() {
        anyhow::bail!("accelerometer failed to start");
    }
    info!("waiting for whips...");

    let mut whip_count: u64 = 0;
    let stdout = io::stdout();

    loop {
        let wait = det.time_until_timeout().unwrap_or(IDLE_WAIT);
        match rx.recv_timeout(wait) {
            Ok(event) => {
                feed::deliver(&mut det, &clock, event);
            }
            Err(RecvTimeoutError::Timeout) => {
                // Stamped feeds only move their clock with the next sample.
                det.poll_timeout();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for event in event_rx.try_iter() {
            // Detected(..) accompanies every Whip; report once.
            if event != GestureEvent::Whip {
                continue;
            }
            whip_count += 1;
            let t = det.accelerometer().reading().timestamp_ms;
            let json = serde_json::to_string(&Detection {
                gesture: event.id(),
                t,
            })?;

            info!("whip #{whip_count} at t={t}");
            let mut out = stdout.lock();
            writeln!(out, "{json}")?;
            out.flush().ok();

            if let Some(b) = &broadcaster {
                b.send_line(&json);
            }
        }
    }

    det.stop();

    match feed_thread.join() {
        Ok(Ok(records)) => info!("feed ended after {records} records, {whip_count} whips"),
        Ok(Err(e)) => warn!("feed stopped: {e}"),
        Err(_) => warn!("feed thread panicked"),
    }

    Ok(())
}
