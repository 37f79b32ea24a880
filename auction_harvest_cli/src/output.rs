use auction_harvest::{AuctionUnit, FailedUnit, RunReport};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "ID")]
    auction_id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Expected")]
    expected: u32,
    #[tabled(rename = "Kept")]
    kept: u32,
    #[tabled(rename = "Images")]
    images: usize,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Updated")]
    updated: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Count")]
    count: String,
}

#[derive(Tabled)]
struct UnresolvedRow {
    #[tabled(rename = "ID")]
    auction_id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

// -- Row builders --

fn build_unit_rows(units: &[AuctionUnit]) -> Vec<UnitRow> {
    units
        .iter()
        .map(|u| UnitRow {
            auction_id: u.auction_id.clone(),
            title: truncate(&u.title, 48),
            status: u.status.to_string(),
            expected: u.expected,
            kept: u.filtered_count,
            images: u.images_total(),
            attempts: u.attempts,
            updated: u
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn build_count_rows(report: &RunReport) -> Vec<CountRow> {
    let s = &report.statuses;
    let rows: [(&'static str, usize); 13] = [
        ("complete", s.complete),
        ("partial", s.partial),
        ("no_match", s.no_match),
        ("timeout", s.timeout),
        ("failed", s.failed),
        ("pending", s.pending),
        ("vehicles kept", report.vehicles_kept),
        ("records excluded", report.records_excluded),
        ("images downloaded", report.images_downloaded),
        ("images already present", report.images_skipped),
        ("images failed", report.images_failed),
        ("checkpoint write failures", report.persistence_failures),
        ("sweep rounds", report.sweep_rounds_run as usize),
    ];
    rows.into_iter()
        .map(|(metric, count)| CountRow {
            metric,
            count: count.to_string(),
        })
        .collect()
}

fn build_unresolved_rows(units: &[FailedUnit]) -> Vec<UnresolvedRow> {
    units
        .iter()
        .map(|u| UnresolvedRow {
            auction_id: u.auction_id.clone(),
            title: truncate(&u.title, 48),
            status: u.status.to_string(),
            error: u.error.clone().unwrap_or_default(),
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

// -- Table output --

pub fn print_units_table(units: &[AuctionUnit]) {
    println!("{}", Table::new(build_unit_rows(units)));
}

pub fn print_report_table(report: &RunReport) {
    let mut counts = Table::new(build_count_rows(report));
    counts.with(Style::rounded());
    println!("{}", counts);

    if report.unresolved.is_empty() {
        println!("All auctions resolved.");
        return;
    }
    println!("\nNeeds attention ({}):", report.unresolved.len());
    println!("{}", Table::new(build_unresolved_rows(&report.unresolved)));
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
