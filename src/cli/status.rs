//! `switchboard status` - query a running router's health surface.

use super::StatusArgs;
use anyhow::Context;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HealthView {
    status: String,
    uptime_seconds: u64,
    providers: Vec<ProviderSpendView>,
}

#[derive(Debug, Deserialize)]
struct ProviderSpendView {
    provider: String,
    daily_usd: f64,
    daily_cap_usd: f64,
    monthly_usd: f64,
    monthly_cap_usd: f64,
}

pub async fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("requesting {}", url))?;
    let body = response.text().await.context("reading health body")?;

    if args.json {
        println!("{}", body);
        return Ok(());
    }

    let health: HealthView = serde_json::from_str(&body).context("parsing health response")?;

    let status = match health.status.as_str() {
        "ok" => health.status.as_str().green().to_string(),
        _ => health.status.as_str().yellow().to_string(),
    };
    println!(
        "Status: {}  (up {})",
        status,
        format_uptime(health.uptime_seconds)
    );

    println!("{}", format_spend_table(&health.providers));
    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

fn format_spend_table(providers: &[ProviderSpendView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Today", "Daily cap", "Month", "Monthly cap"]);

    for p in providers {
        let daily = format!("${:.2}", p.daily_usd);
        let daily = if p.daily_usd >= p.daily_cap_usd {
            daily.as_str().red().to_string()
        } else {
            daily
        };
        table.add_row(vec![
            Cell::new(&p.provider),
            Cell::new(daily),
            Cell::new(format!("${:.2}", p.daily_cap_usd)),
            Cell::new(format!("${:.2}", p.monthly_usd)),
            Cell::new(format!("${:.2}", p.monthly_cap_usd)),
        ]);
    }

    table.to_string()
}
