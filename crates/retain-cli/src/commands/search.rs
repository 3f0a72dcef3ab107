use chrono::{DateTime, Utc};
use clap::Parser;
use retain::{MemoryQuery, MemoryStore, Tier};

use crate::error::CliResult;
use crate::output::{OutputFormat, print_memories};

#[derive(Parser)]
pub struct SearchCommand {
    #[clap(long = "tag", short, help = "Match memories sharing any of these tags (repeatable)")]
    pub tags: Vec<String>,

    #[clap(long, short = 'm', help = "Minimum importance (inclusive)")]
    pub min_importance: Option<f32>,

    #[clap(long, help = "Created at or after (RFC 3339)", requires = "until")]
    pub since: Option<DateTime<Utc>>,

    #[clap(long, help = "Created at or before (RFC 3339)", requires = "since")]
    pub until: Option<DateTime<Utc>>,

    #[clap(long, help = "Only this tier (working, short_term, long_term)")]
    pub tier: Option<Tier>,

    #[clap(
        long,
        short,
        help = "Declarative JSON query, e.g. '{\"tags\": [\"meeting\"], \"importance\": 0.4}'",
        conflicts_with_all = ["tags", "min_importance", "since", "until"]
    )]
    pub query: Option<String>,
}

impl SearchCommand {
    pub async fn execute(&self, store: &MemoryStore, format: OutputFormat) -> CliResult<()> {
        let query = self.build_query()?;
        let results = store.search(&query, self.tier).await;
        print_memories(&results, format)?;
        Ok(())
    }

    fn build_query(&self) -> CliResult<MemoryQuery> {
        if let Some(ref raw) = self.query {
            let value = serde_json::from_str(raw)?;
            return Ok(MemoryQuery::from_json(value)?);
        }

        let mut query = MemoryQuery::new();
        if !self.tags.is_empty() {
            query = query.with_tags(self.tags.iter().cloned());
        }
        if let Some(min) = self.min_importance {
            query = query.with_min_importance(min);
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            query = query.created_between(since, until);
        }
        Ok(query)
    }
}
