//! `deskbridge tools`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::services::{DiscoveryDocument, ManifestPublisher};

/// Arguments for `deskbridge tools`.
#[derive(Args, Debug, Default)]
pub struct ToolsArgs {}

/// The discovery document, rendered for the terminal.
#[derive(Debug, Serialize)]
pub struct ToolListOutput {
    /// Document as served at the discovery path.
    #[serde(flatten)]
    pub document: DiscoveryDocument,
}

impl CommandOutput for ToolListOutput {
    fn to_human(&self) -> String {
        let tools = &self.document.tools;
        if tools.is_empty() {
            return "No tools registered.".to_string();
        }

        let mut table = list_table(&["name", "required", "description"]);
        for tool in tools {
            let required = if tool.input_schema.required.is_empty() {
                "-".to_string()
            } else {
                tool.input_schema.required.join(", ")
            };
            table.add_row(vec![tool.name.clone(), required, truncate(&tool.description, 60)]);
        }

        let noun = if tools.len() == 1 { "tool" } else { "tools" };
        format!("{} {noun}:\n{table}", tools.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.document).unwrap_or_default()
    }
}

/// Print the tools the configured bridge would expose.
pub async fn execute(_args: ToolsArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let registry = super::build_registry(&config)?;
    let publisher = ManifestPublisher::new(Arc::new(registry));

    output(
        &ToolListOutput {
            document: publisher.build(),
        },
        json_mode,
    );
    Ok(())
}
