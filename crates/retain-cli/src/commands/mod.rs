pub mod config;
pub mod maintain;
pub mod memory;
pub mod search;
pub mod stats;

pub use config::ConfigCommand;
pub use maintain::MaintainCommand;
pub use memory::MemoryCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
