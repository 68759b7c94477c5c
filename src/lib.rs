// Fleet Profit System - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod config;
pub mod entities;
pub mod gateway;
pub mod seed;
pub mod store;

// Re-export commonly used types
pub use config::{password_digest, Config, ALLOWED_EXTENSIONS};
pub use entities::{Driver, Expense, Settings, Trip, Unit};
pub use gateway::Gateway;
pub use seed::{load_seed_file, seed_initial_data, SeedData, SeedReport};
pub use store::{Collection, Filter, ParsedId, Store, DEFAULT_DB_FILE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
