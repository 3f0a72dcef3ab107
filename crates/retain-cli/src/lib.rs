pub mod commands;
pub mod error;
pub mod output;

pub use commands::{
    ConfigCommand, MaintainCommand, MemoryCommand, SearchCommand, StatsCommand,
};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, content_preview, format_timestamp, truncate_string};
