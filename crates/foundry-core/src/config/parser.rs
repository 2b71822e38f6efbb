//! Reading and writing foundry-agent.toml.

use super::schema::AgentConfig;
use anyhow::{Context, Result};
use std::path::Path;

pub fn parse_agent_toml(path: &Path) -> Result<AgentConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_agent_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Deserialize and validate. Syntax and type errors name the line they
/// occur on and quote it.
pub fn parse_agent_toml_str(content: &str) -> Result<AgentConfig> {
    let config: AgentConfig = toml::from_str(content).map_err(|e| locate(&e, content))?;
    config.validate()?;
    Ok(config)
}

fn locate(error: &toml::de::Error, content: &str) -> anyhow::Error {
    let Some(span) = error.span() else {
        return anyhow::anyhow!("invalid TOML: {}", error.message());
    };
    let offset = span.start.min(content.len());
    let line = 1 + content.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count();
    let text = content.lines().nth(line - 1).unwrap_or_default().trim();
    anyhow::anyhow!("invalid TOML on line {line} `{text}`: {}", error.message())
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &AgentConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}
