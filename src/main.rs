// Entry point and interactive menu.
//
// The binary watches a directory of JSON record files written by the web
// client and prints the live impact views on demand:
// - Option [1] re-reads the files and prints load diagnostics.
// - Options [2]-[5] print one view each as a markdown table.
// - Option [6] exports every view to CSV plus a JSON summary.
//
// Before every action the storage watcher is polled, so edits made by other
// processes are picked up without restarting.
use chrono::Datelike;
use foodbridge_impact::config::Config;
use foodbridge_impact::output;
use foodbridge_impact::util::format_int;
use foodbridge_impact::{
    ImpactView, JsonFileStore, LocalNotifier, NamedValue, RecomputeController, StatsView,
    StatusCount, StorageWatcher, SystemClock,
};
use serde::Serialize;
use std::error::Error;
use std::io::{self, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Controller = RecomputeController<JsonFileStore, LocalNotifier, SystemClock>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportSummary {
    generated_at: String,
    stats: StatsView,
    impact: ImpactView,
    monthly_leaderboard: Vec<NamedValue>,
    statuses: Vec<StatusCount>,
}

/// Print `prompt` and read one trimmed line from stdin.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Parse `YYYY-MM` into `(year, month)`.
fn parse_year_month(s: &str) -> Option<(i32, u32)> {
    let (y, m) = s.split_once('-')?;
    let year = y.trim().parse::<i32>().ok()?;
    let month = m.trim().parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Handle option [1]: re-read the record files and report what was found.
fn handle_load(store: &JsonFileStore, controller: &Controller) {
    let (donations, d_report) = store.load_donations();
    let (requests, r_report) = store.load_requests();
    println!(
        "Loaded {} donations and {} requests from {}",
        format_int(donations.len()),
        format_int(requests.len()),
        store.dir().display()
    );
    let skipped = d_report.parse_errors + r_report.parse_errors;
    if skipped > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            format_int(skipped)
        );
    }
    println!();
    controller.notify_data_changed();
}

fn handle_stats(controller: &Controller) {
    let stats = controller.stats();
    output::preview_table("Live Stats", None, &[stats], 1, "no data");
}

fn handle_impact(controller: &Controller) {
    let impact = controller.impact();
    println!(
        "Meals saved over the last 7 days: {}\n",
        format_int(impact.weekly_total())
    );
    output::preview_table("Weekly Donations Trend", Some("last 7 days, oldest first"), &impact.weekly, 7, "no rows");
    output::preview_table("Distribution of Food Types", None, &impact.types, 4, "no rows");
    output::preview_table(
        "Top Donors",
        Some("all time, by quantity donated"),
        &impact.top_donors,
        controller.limits().top_donors,
        "no donors yet",
    );
}

fn handle_leaderboard(controller: &Controller) {
    let input = read_line("Enter month (YYYY-MM, blank for current): ");
    let (year, month) = if input.is_empty() {
        let now = controller.now();
        (now.year(), now.month())
    } else {
        match parse_year_month(&input) {
            Some(ym) => ym,
            None => {
                println!("Invalid month. Please use YYYY-MM.\n");
                return;
            }
        }
    };
    let board = controller.monthly_leaderboard(year, month);
    let title = format!("Monthly Leaderboard {}-{:02}", year, month);
    output::preview_table(&title, None, &board, board.len(), "No donations yet this month.");
}

fn handle_statuses(controller: &Controller) {
    let rows = controller.status_breakdown();
    output::preview_table("Status Breakdown", None, &rows, rows.len(), "no rows");
}

/// Handle option [6]: write every view to the export directory.
fn handle_export(controller: &Controller, config: &Config) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(&config.export_dir)?;
    let impact = controller.impact();
    let summary = ExportSummary {
        generated_at: controller.now().to_rfc3339(),
        stats: controller.stats(),
        monthly_leaderboard: controller.current_leaderboard(),
        statuses: controller.status_breakdown(),
        impact,
    };

    let dir = &config.export_dir;
    output::write_csv(&dir.join("impact_weekly_trend.csv"), &summary.impact.weekly)?;
    output::write_csv(&dir.join("impact_food_types.csv"), &summary.impact.types)?;
    output::write_csv(&dir.join("impact_top_donors.csv"), &summary.impact.top_donors)?;
    output::write_csv(&dir.join("monthly_leaderboard.csv"), &summary.monthly_leaderboard)?;
    output::write_csv(&dir.join("status_breakdown.csv"), &summary.statuses)?;
    output::write_json(&dir.join("impact_summary.json"), &summary)?;
    println!("Outputs saved to {}\n", dir.display());
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "foodbridge_impact=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Reading records from {}", config.data_dir.display());

    let store = JsonFileStore::new(config.data_dir.clone());
    let notifier = LocalNotifier::new();
    let mut watcher = StorageWatcher::new(store.watched_paths());
    let controller = RecomputeController::with_limits(
        store.clone(),
        notifier.clone(),
        SystemClock,
        config.limits,
    );

    loop {
        println!("Select Report:");
        println!("[1] Load the data");
        println!("[2] Live stats");
        println!("[3] Impact report");
        println!("[4] Monthly leaderboard");
        println!("[5] Status breakdown");
        println!("[6] Export reports");
        println!("[7] Exit\n");
        let choice = read_line("Enter choice: ");
        if watcher.poll(&notifier) {
            tracing::info!("Record files changed on disk; views will be recomputed");
        }
        match choice.as_str() {
            "1" => handle_load(&store, &controller),
            "2" => handle_stats(&controller),
            "3" => handle_impact(&controller),
            "4" => handle_leaderboard(&controller),
            "5" => handle_statuses(&controller),
            "6" => {
                if let Err(e) = handle_export(&controller, &config) {
                    eprintln!("Write error: {}\n", e);
                }
            }
            "7" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-7.\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_year_month;

    #[test]
    fn parses_year_month_input() {
        assert_eq!(parse_year_month("2025-03"), Some((2025, 3)));
        assert_eq!(parse_year_month("2025-13"), None);
        assert_eq!(parse_year_month("March"), None);
    }
}
