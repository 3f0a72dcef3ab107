use std::path::Path;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use retain::config::Config;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,
}

impl ConfigCommand {
    pub fn execute(
        &self,
        config: &Config,
        source: Option<&Path>,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config, source, format),
        }
    }

    fn show(config: &Config, source: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table => {
                match source {
                    Some(path) => println!("Configuration from: {}", path.display()),
                    None => println!("Configuration: (using defaults)"),
                }
                println!("==============================\n");

                for (section, rows) in sections(config) {
                    println!("[{section}]");
                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL_CONDENSED)
                        .set_content_arrangement(ContentArrangement::Dynamic)
                        .set_header(["Setting", "Value"]);
                    for (key, value) in rows {
                        table.add_row([key.to_string(), value]);
                    }
                    println!("{table}\n");
                }
            }
        }

        Ok(())
    }
}

type Section = (&'static str, Vec<(&'static str, String)>);

fn sections(config: &Config) -> Vec<Section> {
    vec![
        (
            "Storage",
            vec![
                ("data_dir", config.storage.data_dir.display().to_string()),
                ("snapshot_file", config.storage.snapshot_file.clone()),
                ("debounce_ms", config.storage.debounce_ms.to_string()),
                ("persist", config.storage.persist.to_string()),
            ],
        ),
        (
            "Tiers",
            vec![
                ("working_capacity", config.tiers.working_capacity.to_string()),
                (
                    "short_term_capacity",
                    config.tiers.short_term_capacity.to_string(),
                ),
            ],
        ),
        (
            "Retention",
            vec![
                (
                    "consolidation_threshold",
                    config.retention.consolidation_threshold.to_string(),
                ),
                ("forgetting_rate", config.retention.forgetting_rate.to_string()),
                (
                    "importance_threshold",
                    config.retention.importance_threshold.to_string(),
                ),
                (
                    "promotion_access_count",
                    config.retention.promotion_access_count.to_string(),
                ),
            ],
        ),
        (
            "Processor",
            vec![
                (
                    "long_term_threshold",
                    config.processor.long_term_threshold.to_string(),
                ),
                (
                    "short_term_threshold",
                    config.processor.short_term_threshold.to_string(),
                ),
                (
                    "default_importance",
                    config.processor.default_importance.to_string(),
                ),
            ],
        ),
        (
            "Maintenance",
            vec![("interval_secs", config.maintenance.interval_secs.to_string())],
        ),
    ]
}
