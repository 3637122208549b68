use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use cohort_stats::stats::{CategoryCount, Dimension};
use cohort_stats::{Config, StatsService};

use prettytable::{format, Cell, Row, Table};

fn header(titles: &[&str]) -> Row {
    Row::new(titles.iter().map(|t| Cell::new(t).style_spec("bFg")).collect())
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(header(titles));
    table
}

fn counts_table(title: &str, top: &[CategoryCount], percentages: &BTreeMap<String, f64>) -> Table {
    let mut table = new_table(&[title, "Students", "Share %"]);
    for entry in top {
        let pct = percentages.get(&entry.name).copied().unwrap_or(0.0);
        table.add_row(Row::new(vec![
            Cell::new(&entry.name),
            Cell::new(&entry.count.to_string()).style_spec("r"),
            Cell::new(&format!("{pct:.1}")).style_spec("r"),
        ]));
    }
    table
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // optional YAML config as the only argument; COHORT_* variables still apply
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;
    tracing::info!(path = %config.data_path.display(), "building cohort report");

    let service = StatsService::load(config).context("loading cohort data")?;

    let summary = service.summary();
    let mut table = new_table(&["Rows", "Columns", "Rows in file", "Sampled", "Warnings"]);
    table.add_row(Row::new(vec![
        Cell::new(&summary.row_count.to_string()).style_spec("r"),
        Cell::new(&summary.column_count.to_string()).style_spec("r"),
        Cell::new(&summary.total_rows.to_string()).style_spec("r"),
        Cell::new(&summary.sampled.to_string()),
        Cell::new(&summary.warnings.to_string()).style_spec("r"),
    ]));
    println!("\n--- Data Summary ---");
    table.printstd();

    let features: Vec<&str> = service.features().iter().map(|f| f.as_str()).collect();
    println!("\nAvailable features: {}", features.join(", "));

    for dimension in [
        Dimension::Gender,
        Dimension::Nationality,
        Dimension::City,
        Dimension::School,
        Dimension::Specialty,
        Dimension::BacType,
    ] {
        let dist = service.distribution(dimension)?;
        if dist.total == 0 || dist.distinct == 0 {
            continue;
        }
        println!("\n--- Top {} ({} distinct) ---", dimension, dist.distinct);
        counts_table(dimension.as_str(), &dist.top, &dist.percentages).printstd();
    }

    let stats = service.statistics();
    let marks = service.mark_correlations()?;
    let mut table = new_table(&["Metric", "Value"]);
    let mut metric = |name: &str, value: String| {
        table.add_row(Row::new(vec![Cell::new(name), Cell::new(&value).style_spec("r")]));
    };
    metric("Graduation rate %", format!("{:.1}", stats.graduation_rate));
    metric("Scholarship holders %", format!("{:.1}", stats.scholarship_percentage));
    metric(
        "Average mark",
        marks.overall_avg.map_or_else(|| "-".to_string(), |m| format!("{m:.1}")),
    );
    metric("Graduation threshold", format!("{:.1}", stats.graduation_threshold));
    println!("\n--- Cohort Metrics ---");
    table.printstd();

    let revenue = service.faculty_revenue()?;
    let mut table = new_table(&["School", "Fee", "Revenue"]);
    for (school, amount) in &revenue.faculty_revenues {
        let fee = revenue.school_fees.get(school).copied().unwrap_or(0);
        table.add_row(Row::new(vec![
            Cell::new(school),
            Cell::new(&fee.to_string()).style_spec("r"),
            Cell::new(&amount.to_string()).style_spec("r"),
        ]));
    }
    println!("\n--- Faculty Revenue ---");
    table.printstd();

    let enrollment = service.next_year_students()?;
    let fees = service.average_fee()?;
    let mut table = new_table(&["Forecast", "Current", "Next year"]);
    table.add_row(Row::new(vec![
        Cell::new(&format!("Students ({} growth {:.1}%)", enrollment.next_year, enrollment.avg_growth_rate)),
        Cell::new(
            &enrollment
                .historical_counts
                .get(&enrollment.current_year)
                .copied()
                .unwrap_or(0)
                .to_string(),
        )
        .style_spec("r"),
        Cell::new(&enrollment.predicted_count.to_string()).style_spec("r"),
    ]));
    table.add_row(Row::new(vec![
        Cell::new(&format!("Average fee (+{}%)", fees.increase_percentage)),
        Cell::new(&fees.current_avg_fee.to_string()).style_spec("r"),
        Cell::new(&fees.predicted_fee.to_string()).style_spec("r"),
    ]));
    println!("\n--- Forecasts ---");
    table.printstd();

    tracing::info!("cohort report finished");
    Ok(())
}
