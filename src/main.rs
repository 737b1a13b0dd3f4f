//! Dashboard report.
//!
//! Usage: cargo run -- [--out report.json] [--filter between:LO:HI] [--aggregation avg]
//!
//! Generates a session for the configured entities and metrics, prints a
//! summary table, and optionally writes the full JSON report.

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use std::path::PathBuf;

use labscope::catalog;
use labscope::config::Config;
use labscope::filter::DataFilter;
use labscope::logging::{log, obj, v_str, Domain, Level};
use labscope::pivot::{Aggregation, Granularity};
use labscope::report::Report;
use labscope::sample::entity_name;
use labscope::session::{AuthState, Dashboard, RenderState, Selection, StaticIdentity, User};

struct Args {
    out: Option<PathBuf>,
    filters: Vec<DataFilter>,
    aggregation: Aggregation,
    granularity: Granularity,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        out: None,
        filters: Vec::new(),
        aggregation: Aggregation::Raw,
        granularity: Granularity::Day,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{} needs a value", flag));
        match flag.as_str() {
            "--out" => args.out = Some(PathBuf::from(value()?)),
            "--filter" => {
                let spec = value()?;
                let id = format!("cli-{}", args.filters.len());
                args.filters.push(parse_filter(&id, &spec)?);
            }
            "--aggregation" => args.aggregation = parse_aggregation(&value()?)?,
            "--granularity" => {
                args.granularity = match value()?.as_str() {
                    "hour" => Granularity::Hour,
                    "day" => Granularity::Day,
                    "week" => Granularity::Week,
                    other => bail!("unknown granularity {}", other),
                }
            }
            other => bail!("unknown argument {}", other),
        }
    }
    Ok(args)
}

/// `gt:X`, `lt:X`, `eq:X` or `between:LO:HI`.
fn parse_filter(id: &str, spec: &str) -> Result<DataFilter> {
    let parts: Vec<&str> = spec.split(':').collect();
    let num = |s: &str| s.parse::<f64>().map_err(|e| anyhow!("bad filter number {}: {}", s, e));
    match parts.as_slice() {
        ["gt", x] => Ok(DataFilter::greater(id, num(x)?)),
        ["lt", x] => Ok(DataFilter::less(id, num(x)?)),
        ["eq", x] => Ok(DataFilter::equals(id, num(x)?)),
        ["between", lo, hi] => Ok(DataFilter::between(id, num(lo)?, num(hi)?)),
        _ => bail!("unrecognised filter {}", spec),
    }
}

fn parse_aggregation(s: &str) -> Result<Aggregation> {
    Ok(match s {
        "raw" => Aggregation::Raw,
        "avg" | "average" => Aggregation::Average,
        "sum" => Aggregation::Sum,
        "min" => Aggregation::Min,
        "max" => Aggregation::Max,
        "median" => Aggregation::Median,
        "std" => Aggregation::Std,
        other => bail!("unknown aggregation {}", other),
    })
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    cfg.validate()?;
    let args = parse_args()?;

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("entities", v_str(&cfg.entities.iter().map(|e| e.id.as_str()).collect::<Vec<_>>().join(","))),
            ("metrics", v_str(&cfg.metrics.join(","))),
        ]),
    );

    let mut selection = Selection::from_config(&cfg)
        .with_aggregation(args.aggregation)
        .with_granularity(args.granularity);
    for f in args.filters {
        selection = selection.with_filter(f);
    }

    // The CLI acts as an already signed-in local user.
    let identity = StaticIdentity(AuthState::SignedIn(User {
        id: "local".to_string(),
        email: "local@localhost".to_string(),
    }));

    let now = Utc::now();
    let mut dashboard = Dashboard::from_config(&cfg);
    let view = match dashboard.render(&identity, &selection, now) {
        RenderState::Ready(view) => view,
        RenderState::Loading | RenderState::SignedOut => bail!("identity not available"),
    };

    println!("=== Summary ({} samples) ===", view.samples.len());
    println!("{:<14} {:>10} {:>10} {:>10} {:>10} {:>10}  trend", "metric", "mean", "median", "std", "min", "max");
    for (metric, s) in &view.analysis.summary {
        let trend = view.analysis.trends.get(metric).map(|t| t.direction.as_str()).unwrap_or("-");
        println!(
            "{:<14} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}  {} {}",
            catalog::display_name(metric),
            s.mean,
            s.median,
            s.std,
            s.min,
            s.max,
            trend,
            catalog::unit_of(metric)
        );
    }

    println!();
    println!("=== Correlation ===");
    for (a, row) in &view.analysis.correlation {
        let cells: Vec<String> = row.iter().map(|(b, r)| format!("{}={:+.2}", b, r)).collect();
        println!("{:<14} {}", a, cells.join("  "));
    }

    println!();
    println!("=== Comparison ===");
    for (metric, cmp) in &view.metric_comparisons {
        match cmp {
            Some(c) => println!(
                "{:<14} best={:.2} ({}) worst={:.2} avg={:.2} improvement={}",
                metric,
                c.best,
                entity_name(dashboard.entities(), &c.leader),
                c.worst,
                c.average,
                c.improvement_pct.map(|p| format!("{:.1}%", p)).unwrap_or_else(|| "n/a".to_string())
            ),
            None => println!("{:<14} (needs two or more entities)", metric),
        }
    }

    println!();
    println!(
        "anomalies={} pivot_rows={}",
        view.analysis.anomalies.len(),
        view.pivot.len()
    );

    if let Some(path) = args.out {
        let report = Report::from_view(&selection, &view, now);
        report.write_to(&path)?;
        println!("report written to {} (digest {})", path.display(), report.sample_digest);
    }

    Ok(())
}
