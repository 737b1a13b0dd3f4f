//! Parameter sweep runner.
//!
//! Usage: cargo run --bin sweep -- [metric] [enable=temperature,current]
//!
//! Drives one full sweep run at the original 100 ms cadence, then reports
//! the best operating point for the chosen metric (default efficiency).

use anyhow::{bail, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{interval, Duration};

use labscope::config::Config;
use labscope::sweep::{default_parameters, pass_rate, SweepRunner};

const TICK: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let mut args = std::env::args().skip(1);
    let metric = args.next().unwrap_or_else(|| "efficiency".to_string());

    let mut params = default_parameters();
    if let Some(enable) = args.next() {
        let Some(list) = enable.strip_prefix("enable=") else {
            bail!("expected enable=<ids>, got {}", enable);
        };
        for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match params.iter_mut().find(|p| p.id == id) {
                Some(p) => p.enabled = true,
                None => bail!("unknown parameter {}", id),
            }
        }
    }

    let rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut runner = SweepRunner::new(params, rng, Utc::now());
    runner.start();

    let mut ticker = interval(TICK);
    loop {
        ticker.tick().await;
        if runner.tick(Utc::now()) {
            break;
        }
        if runner.progress() % 20 == 0 {
            eprintln!("[sweep] progress {}%", runner.progress());
        }
    }

    let results = runner.results();
    println!("results={} pass_rate={:.1}%", results.len(), pass_rate(results) * 100.0);
    match runner.best(&metric) {
        Some(best) => {
            println!("best by {}: {} ({:.3})", metric, best.id, best.metric(&metric).unwrap_or_default());
            for (k, v) in &best.parameters {
                println!("  {:<12} {:.3}", k, v);
            }
            for (k, v) in &best.metrics {
                println!("  {:<18} {:.3}", k, v);
            }
            println!("  passed={}", best.passed);
        }
        None => println!("no result carries metric {}", metric),
    }
    Ok(())
}
