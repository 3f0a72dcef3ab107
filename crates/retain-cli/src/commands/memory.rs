use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use retain::config::Config;
use retain::{FixedScorer, MemoryProcessor, MemoryStore, Tier};
use serde_json::Value;

use crate::error::{CliResult, parse_id};
use crate::output::{OutputFormat, content_preview, join_tags, print_memories};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Add a memory")]
    Add(AddArgs),

    #[clap(about = "List memories")]
    List(ListArgs),

    #[clap(about = "Show memory details")]
    Show(IdArgs),

    #[clap(about = "Delete a memory")]
    Delete(IdArgs),

    #[clap(about = "Link two long-term memories")]
    Associate(PairArgs),

    #[clap(about = "Unlink two long-term memories")]
    Dissociate(PairArgs),

    #[clap(about = "List memories linked to a long-term memory")]
    Related(IdArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Memory content: a JSON value, or plain text")]
    pub content: String,

    #[clap(
        long,
        short,
        help = "Importance in [0, 1]. Defaults to processor.default_importance"
    )]
    pub importance: Option<f32>,

    #[clap(long = "tag", short, help = "Tag to attach (repeatable)")]
    pub tags: Vec<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, short, help = "Only this tier (working, short_term, long_term)")]
    pub tier: Option<Tier>,

    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of memories to display"
    )]
    pub limit: usize,
}

#[derive(Parser)]
pub struct IdArgs {
    #[clap(help = "Memory ID (UUID format)")]
    pub id: String,
}

#[derive(Parser)]
pub struct PairArgs {
    #[clap(help = "First memory ID (UUID format)")]
    pub a: String,

    #[clap(help = "Second memory ID (UUID format)")]
    pub b: String,
}

impl MemoryCommand {
    pub async fn execute(
        &self,
        store: &MemoryStore,
        config: &Config,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Add(args) => Self::add(store, config, args, format).await,
            MemorySubcommand::List(args) => Self::list(store, args, format).await,
            MemorySubcommand::Show(args) => Self::show(store, args, format).await,
            MemorySubcommand::Delete(args) => Self::delete(store, args, format).await,
            MemorySubcommand::Associate(args) => Self::link(store, args, true, format).await,
            MemorySubcommand::Dissociate(args) => Self::link(store, args, false, format).await,
            MemorySubcommand::Related(args) => Self::related(store, args, format).await,
        }
    }

    async fn add(
        store: &MemoryStore,
        config: &Config,
        args: &AddArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let content = parse_content(&args.content);
        let importance = args
            .importance
            .unwrap_or(config.processor.default_importance);

        let processor = MemoryProcessor::new(
            store.clone(),
            Arc::new(FixedScorer::new(importance)),
            config.processor,
        );
        let id = processor.process(content, &args.tags, None).await?;
        let tier = processor.select_tier(importance);

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": id.to_string(),
                    "tier": tier,
                    "created": true,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Memory created in {tier}.");
                println!("ID: {id}");
            }
        }

        Ok(())
    }

    async fn list(store: &MemoryStore, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        let mut memories = match args.tier {
            Some(tier) => store.list(tier).await,
            None => store.all().await,
        };
        memories.truncate(args.limit);

        print_memories(&memories, format)?;
        Ok(())
    }

    async fn show(store: &MemoryStore, args: &IdArgs, format: OutputFormat) -> CliResult<()> {
        let id = parse_id(&args.id)?;

        let memory = store
            .get(id)
            .await
            .ok_or_else(|| format!("Memory not found: {}", args.id))?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&memory)?);
            }
            OutputFormat::Table => {
                let associations = if memory.associations.is_empty() {
                    "-".to_string()
                } else {
                    memory
                        .associations
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join("\n")
                };

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Property", "Value"]);

                table.add_row(["ID", &memory.id.to_string()]);
                table.add_row(["Content", &content_preview(&memory.content)]);
                table.add_row(["Tier", &memory.tier.to_string()]);
                table.add_row(["Importance", &format!("{:.4}", memory.importance)]);
                table.add_row(["Tags", &join_tags(&memory)]);
                table.add_row(["Created", &memory.created_at.to_rfc3339()]);
                table.add_row(["Last Accessed", &memory.last_access.to_rfc3339()]);
                table.add_row(["Access Count", &memory.access_count.to_string()]);
                table.add_row(["Associations", &associations]);

                println!("{table}");
            }
        }

        Ok(())
    }

    async fn delete(store: &MemoryStore, args: &IdArgs, format: OutputFormat) -> CliResult<()> {
        let id = parse_id(&args.id)?;

        let removed = store.remove(id).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": args.id,
                    "tier": removed.tier,
                    "deleted": true,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Memory {} deleted from {}.", args.id, removed.tier);
            }
        }

        Ok(())
    }

    async fn link(
        store: &MemoryStore,
        args: &PairArgs,
        associate: bool,
        format: OutputFormat,
    ) -> CliResult<()> {
        let a = parse_id(&args.a)?;
        let b = parse_id(&args.b)?;

        let changed = if associate {
            store.associate(a, b).await?
        } else {
            store.dissociate(a, b).await?
        };

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "a": args.a,
                    "b": args.b,
                    "linked": associate,
                    "changed": changed,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => match (associate, changed) {
                (true, true) => println!("Linked {} and {}.", args.a, args.b),
                (true, false) => println!("{} and {} are already linked.", args.a, args.b),
                (false, true) => println!("Unlinked {} and {}.", args.a, args.b),
                (false, false) => println!("{} and {} were not linked.", args.a, args.b),
            },
        }

        Ok(())
    }

    async fn related(store: &MemoryStore, args: &IdArgs, format: OutputFormat) -> CliResult<()> {
        let id = parse_id(&args.id)?;
        let related = store.related(id).await?;
        print_memories(&related, format)?;
        Ok(())
    }
}

/// JSON when the argument parses as JSON, otherwise `{"content": <text>}`
fn parse_content(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => serde_json::json!({ "content": raw }),
    }
}
