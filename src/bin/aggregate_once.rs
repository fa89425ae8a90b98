use anyhow::{Context, Result};

use hoops_aggregator::adapters::SourceQuery;
use hoops_aggregator::config::AggregatorConfig;
use hoops_aggregator::http_client::build_http_client;
use hoops_aggregator::orchestrator::Aggregator;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = AggregatorConfig::from_env()?;
    let query = SourceQuery {
        class_year: parse_arg("--class").and_then(|v| v.parse::<u16>().ok()),
        state: parse_arg("--state").map(|s| s.to_ascii_lowercase()),
        team: None,
    };
    let aggregator = Aggregator::from_config(&cfg, build_http_client()?);

    let report = match aggregator.aggregate(&query).await {
        Ok(report) => report,
        Err(err) => {
            println!("Aggregate failed: {err}");
            for e in err.errors.iter().take(12) {
                println!(" - {e}");
            }
            std::process::exit(1);
        }
    };

    println!("Aggregate complete");
    println!(
        "Datasets: {}/{}",
        report.summary.datasets_succeeded, report.summary.datasets_attempted
    );
    println!("Players: {}", report.summary.total_players);
    for status in &report.datasets {
        println!(
            " {:<11} {:?} via {} ({} records, {} errors)",
            status.dataset.as_str(),
            status.status,
            status.successful_adapter.as_deref().unwrap_or("-"),
            status.count,
            status.errors.len()
        );
    }
    if !report.errors.is_empty() {
        println!("Errors: {}", report.errors.len());
        for err in report.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    if has_flag("--json") {
        let body = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{body}");
    }
    Ok(())
}

fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
