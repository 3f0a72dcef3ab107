use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use retain::MemoryStore;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct MaintainCommand {
    #[clap(long, help = "Only promote short-term memories; skip decay")]
    pub consolidate_only: bool,

    #[clap(
        long,
        help = "Only forget stale long-term memories; skip consolidation",
        conflicts_with = "consolidate_only"
    )]
    pub decay_only: bool,
}

impl MaintainCommand {
    pub async fn execute(&self, store: &MemoryStore, format: OutputFormat) -> CliResult<()> {
        let (promoted, forgotten) = if self.consolidate_only {
            (store.consolidate().await, Vec::new())
        } else if self.decay_only {
            (Vec::new(), store.decay().await)
        } else {
            let report = store.run_maintenance().await;
            (report.promoted, report.forgotten)
        };

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "promoted": promoted,
                    "forgotten": forgotten,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Maintenance Results");
                println!("===================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Action", "Memory"]);

                for id in &promoted {
                    table.add_row(["Promoted to long-term", &id.to_string()]);
                }
                for id in &forgotten {
                    table.add_row(["Forgotten", &id.to_string()]);
                }

                if promoted.is_empty() && forgotten.is_empty() {
                    println!("Nothing to do.");
                } else {
                    println!("{table}\n");
                }

                println!(
                    "Totals: {} promoted, {} forgotten",
                    promoted.len(),
                    forgotten.len()
                );
            }
        }

        Ok(())
    }
}
