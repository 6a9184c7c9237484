use super::ui;
use crate::core::entry::CanonicalEntry;
use crate::core::rates::ProviderId;
use crate::core::store::EntryStore;
use anyhow::Result;
use comfy_table::{Cell, Table};
use std::collections::BTreeSet;

/// Prints the newest stored entry of each provider.
pub async fn run(store: &dyn EntryStore, providers: &[ProviderId]) -> Result<()> {
    for &provider in providers {
        let entry = store.latest(provider).await?;
        println!(
            "\n{}",
            ui::style_text(&format!("Latest {provider} entry"), ui::StyleType::Title)
        );
        match entry {
            Some(entry) => println!("{}", entry_table(&entry)),
            None => println!(
                "{}",
                ui::style_text("No entries stored yet", ui::StyleType::Subtle)
            ),
        }
    }
    Ok(())
}

fn entry_table(entry: &CanonicalEntry) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {}", entry.base_currency)),
    ]);
    for (currency, value) in &entry.valuations {
        table.add_row(vec![Cell::new(currency), ui::rate_cell(*value)]);
    }
    table.add_row(vec![
        Cell::new(ui::style_text("timestamp", ui::StyleType::Subtle)),
        Cell::new(&entry.timestamp),
    ]);
    table
}

/// Providers named on the command line, or every configured one.
pub fn providers_to_show(requested: Option<ProviderId>, configured: &[ProviderId]) -> Vec<ProviderId> {
    match requested {
        Some(provider) => vec![provider],
        None => configured.iter().copied().collect::<BTreeSet<_>>().into_iter().collect(),
    }
}
