//! Agent configuration
//!
//! A single `foundry-agent.toml` holds the operator options. The file is
//! read once per signal and treated as an immutable snapshot.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_agent_toml, parse_agent_toml_str, to_toml};
pub use paths::{InstallLayout, default_config_dir, default_state_dir};
pub use schema::AgentConfig;
pub use store::ConfigStore;
