use super::ui;
use crate::core::error::CycleError;
use crate::core::rates::ProviderId;
use crate::core::source::{CycleOutcome, SourceManager};
use anyhow::{Result, bail};
use comfy_table::{Cell, Table};
use futures::future::join_all;

pub type CycleReport = (ProviderId, Result<CycleOutcome, CycleError>);

/// Runs a single cycle for every manager concurrently. Each manager first
/// resumes from the store so an unchanged feed reports no new data.
pub async fn refresh_all(managers: &mut [SourceManager]) -> Vec<CycleReport> {
    let pb = ui::new_progress_bar(managers.len() as u64);
    pb.set_message("Fetching rates");

    let cycles = managers.iter_mut().map(|manager| {
        let pb = pb.clone();
        async move {
            manager.resume_from_store().await;
            let outcome = manager.refresh_once().await;
            pb.inc(1);
            (manager.id(), outcome)
        }
    });
    let reports = join_all(cycles).await;
    pb.finish_and_clear();
    reports
}

/// One cycle per provider, printed as a table. Fails only when every
/// provider failed.
pub async fn run(mut managers: Vec<SourceManager>) -> Result<()> {
    if managers.is_empty() {
        bail!("No providers configured");
    }

    let reports = refresh_all(&mut managers).await;
    println!("{}", outcome_table(&reports));

    let failed = reports.iter().filter(|(_, r)| r.is_err()).count();
    if failed == reports.len() {
        bail!("All {failed} providers failed");
    }
    Ok(())
}

fn outcome_table(reports: &[CycleReport]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Status"),
        ui::header_cell("Timestamp"),
        ui::header_cell("Detail"),
    ]);

    for (provider, result) in reports {
        let row = match result {
            Ok(CycleOutcome::Stored(entry)) => vec![
                Cell::new(provider),
                ui::status_cell(true, "stored"),
                Cell::new(&entry.timestamp),
                Cell::new(format!("{} valuations", entry.valuations.len())),
            ],
            Ok(CycleOutcome::NoNewData) => vec![
                Cell::new(provider),
                ui::status_cell(true, "unchanged"),
                ui::na_cell(),
                Cell::new(ui::style_text("no newer data", ui::StyleType::Subtle)),
            ],
            Err(e) => vec![
                Cell::new(provider),
                ui::status_cell(false, &e.kind().to_string()),
                ui::na_cell(),
                Cell::new(ui::style_text(&e.to_string(), ui::StyleType::Error)),
            ],
        };
        table.add_row(row);
    }
    table
}
