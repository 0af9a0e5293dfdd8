use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trackly::analytics::{aggregate, filter_events, DateRange, FilterSpec, TokenFilter};
use trackly::models::VisitEvent;

#[derive(Parser)]
#[command(name = "trackly-admin")]
#[command(about = "Offline visit statistics for Trackly exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statistics summary for the matching visits
    Stats(FilterArgs),
    /// Print the matching visits
    Filter(FilterArgs),
}

#[derive(Args)]
struct FilterArgs {
    /// JSON file holding an array of visits
    #[arg(long)]
    visits: PathBuf,
    /// today, 7d, 15d, month or custom (default: custom when --start/--end is given, else 7d)
    #[arg(long)]
    range: Option<DateRange>,
    /// First UTC day of a custom range (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last UTC day of a custom range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Only consider visits of this link
    #[arg(long)]
    link: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    browser: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    referrer: Option<String>,
    #[arg(long)]
    os: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    visitor_type: Option<String>,
    #[arg(long)]
    traffic_type: Option<String>,
    #[arg(long)]
    connection: Option<String>,
    #[arg(long)]
    carrier: Option<String>,
    /// true for VPN visits only, false for direct visits only
    #[arg(long)]
    vpn: Option<bool>,
    /// true for repeat visitors only, false for first-time visitors only
    #[arg(long)]
    repeated: Option<bool>,
    /// Token filter as name=value; may be repeated
    #[arg(long = "token", value_parser = parse_token_filter)]
    tokens: Vec<TokenFilter>,
}

fn parse_token_filter(raw: &str) -> Result<TokenFilter, String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(TokenFilter::new(name, value)),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

impl FilterArgs {
    fn spec(&self) -> FilterSpec {
        let custom_dates = self.start.is_some() || self.end.is_some();
        let date_range = self.range.unwrap_or(if custom_dates {
            DateRange::Custom
        } else {
            DateRange::Last7Days
        });
        if custom_dates && date_range != DateRange::Custom {
            tracing::warn!("--start/--end only apply to the custom range and are ignored");
        }

        FilterSpec {
            date_range,
            start_date: self.start,
            end_date: self.end,
            token_filters: self.tokens.clone(),
            country: self.country.clone(),
            region: self.region.clone(),
            city: self.city.clone(),
            device: self.device.clone(),
            browser: self.browser.clone(),
            language: self.language.clone(),
            referrer: self.referrer.clone(),
            os: self.os.clone(),
            source: self.source.clone(),
            visitor_type: self.visitor_type.clone(),
            traffic_type: self.traffic_type.clone(),
            connection: self.connection.clone(),
            carrier: self.carrier.clone(),
            is_vpn: self.vpn,
            repeated: self.repeated,
        }
    }

    fn load_visits(&self) -> Result<Vec<VisitEvent>> {
        let raw = std::fs::read_to_string(&self.visits)
            .with_context(|| format!("failed to read {}", self.visits.display()))?;
        let mut visits: Vec<VisitEvent> = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON array of visits", self.visits.display()))?;

        if let Some(link) = &self.link {
            visits.retain(|v| &v.link_id == link);
        }
        tracing::debug!(count = visits.len(), "loaded visits");
        Ok(visits)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stats(args) => {
            let visits = args.load_visits()?;
            let summary = aggregate(&visits, &args.spec());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Filter(args) => {
            let visits = args.load_visits()?;
            let matched = filter_events(&visits, &args.spec());
            eprintln!("✓ {} of {} visits matched", matched.len(), visits.len());
            println!("{}", serde_json::to_string_pretty(&matched)?);
        }
    }

    Ok(())
}
