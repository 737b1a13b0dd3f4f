//! Live telemetry monitor.
//!
//! Usage: cargo run --bin live_stream -- [seconds]
//!
//! Runs the stream timer for the given duration (default 10 s), printing the
//! newest reading and any channel outside its bands once per tick.

use anyhow::{anyhow, Result};
use tokio::time::{sleep, Duration};

use labscope::catalog::{Status, LIVE_METRICS};
use labscope::config::Config;
use labscope::logging::{log, obj, v_num, Domain, Level};
use labscope::stats::summarize;
use labscope::stream::StreamController;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    cfg.validate()?;
    let seconds: u64 = match std::env::args().nth(1) {
        Some(s) => s.parse().map_err(|e| anyhow!("bad duration {}: {}", s, e))?,
        None => 10,
    };

    let mut stream = StreamController::from_config(&cfg);
    stream.start();

    let tick = stream.tick_period();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    while tokio::time::Instant::now() < deadline {
        sleep(tick).await;
        let snap = stream.snapshot();
        let Some(latest) = snap.last() else { continue };

        let alerts: Vec<String> = LIVE_METRICS
            .iter()
            .filter_map(|m| match latest.status(m.id) {
                Status::Normal => None,
                status => Some(format!("{}={:?}", m.id, status)),
            })
            .collect();

        println!(
            "{} V={:.2} I={:.1}mA T={:.1}°C f={:.1}MHz eff={:.1}% P={:.3}W snr={:.1}dB [{}/{}] {}",
            latest.timestamp.format("%H:%M:%S"),
            latest.voltage,
            latest.current,
            latest.temperature,
            latest.frequency,
            latest.efficiency,
            latest.power,
            latest.snr,
            snap.len(),
            stream.capacity(),
            alerts.join(" ")
        );
    }
    stream.stop();

    let samples: Vec<_> = stream.snapshot().iter().flat_map(|r| r.to_samples("live")).collect();
    let analysis = summarize(&samples);
    for (metric, s) in &analysis.summary {
        log(
            Level::Info,
            Domain::Stream,
            "channel_summary",
            obj(&[
                ("metric", serde_json::json!(metric)),
                ("mean", v_num(s.mean)),
                ("std", v_num(s.std)),
                ("min", v_num(s.min)),
                ("max", v_num(s.max)),
            ]),
        );
    }
    Ok(())
}
