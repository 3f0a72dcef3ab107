use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use retain::MemoryStore;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(&self, store: &MemoryStore, format: OutputFormat) -> CliResult<()> {
        let stats = store.stats().await;
        let snapshot_path = store
            .snapshot_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(memory only)".to_string());

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "working_count": stats.working_count,
                    "short_term_count": stats.short_term_count,
                    "long_term_count": stats.long_term_count,
                    "total": stats.total,
                    "snapshot": snapshot_path,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Retain Statistics");
                println!("=================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Tier", "Count"]);

                table.add_row(["Working", &stats.working_count.to_string()]);
                table.add_row(["Short-term", &stats.short_term_count.to_string()]);
                table.add_row(["Long-term", &stats.long_term_count.to_string()]);

                println!("{table}\n");

                println!("Total: {} memories", stats.total);
                println!("Snapshot: {snapshot_path}");
            }
        }

        Ok(())
    }
}
