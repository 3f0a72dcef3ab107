use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use retain::MemoryItem;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// One-line rendering of a memory payload: the `content` string when there
/// is one, compact JSON otherwise
pub fn content_preview(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("content") {
            Some(Value::String(s)) => s.clone(),
            _ => content.to_string(),
        },
        other => other.to_string(),
    }
}

pub fn join_tags(memory: &MemoryItem) -> String {
    if memory.tags.is_empty() {
        "-".to_string()
    } else {
        memory.tags.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Print a list of memories as JSON or as a summary table
pub fn print_memories(memories: &[MemoryItem], format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(memories)?);
        }
        OutputFormat::Table => {
            if memories.is_empty() {
                println!("No memories found.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["ID", "Content", "Tier", "Importance", "Tags", "Accesses", "Created"]);

            for memory in memories {
                table.add_row([
                    truncate_string(&memory.id.to_string(), 8),
                    truncate_string(&content_preview(&memory.content), 50),
                    memory.tier.to_string(),
                    format!("{:.2}", memory.importance),
                    truncate_string(&join_tags(memory), 30),
                    memory.access_count.to_string(),
                    format_timestamp(&memory.created_at),
                ]);
            }

            println!("{table}");
            println!("\nTotal: {} memories", memories.len());
        }
    }
    Ok(())
}
