//! `azqr plugins`

use std::collections::BTreeMap;

use anyhow::Result;
use clap::{Args, Subcommand};

use azqr_core::domain::{PluginScanArgs, ScanParams};
use azqr_plugins::{Plugin, PluginError, global_registry};
use azqr_scanners::scanner_registry;

use crate::cli::context::CliContext;
use crate::cli::{Cli, exit_codes};

#[derive(Args, Debug)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub command: PluginsCommand,
}

#[derive(Subcommand, Debug)]
pub enum PluginsCommand {
    /// List registered plugins
    List,

    /// Show a plugin's metadata and report columns
    Info { name: String },

    /// Run one internal plugin without the scan stages
    Run {
        name: String,

        #[arg(short = 's', long = "subscription-id")]
        subscriptions: Vec<String>,

        #[arg(short = 'g', long = "resource-group")]
        resource_groups: Vec<String>,

        /// Show full subscription ids
        #[arg(long = "no-mask")]
        no_mask: bool,
    },
}

pub async fn run(ctx: &CliContext, _cli: &Cli, args: &PluginsArgs) -> Result<u8> {
    match &args.command {
        PluginsCommand::List => {
            print!("{}", list_table(&global_registry().list()));
            Ok(exit_codes::SUCCESS)
        }
        PluginsCommand::Info { name } => {
            let plugin = global_registry()
                .get(name)
                .ok_or_else(|| PluginError::NotFound(name.clone()))?;
            print!("{}", describe(&plugin));
            Ok(exit_codes::SUCCESS)
        }
        PluginsCommand::Run {
            name,
            subscriptions,
            resource_groups,
            no_mask,
        } => {
            if global_registry().get(name).is_none() {
                return Err(PluginError::NotFound(name.clone()).into());
            }
            let params = ScanParams::for_plugins(
                PluginScanArgs {
                    subscriptions: subscriptions.clone(),
                    resource_groups: resource_groups.clone(),
                    mask: Some(!no_mask),
                },
                BTreeMap::from([(name.clone(), true)]),
                scanner_registry(),
            )?;

            let report = ctx.runner().scan_plugins(params).await?;
            for result in &report.plugin_results {
                println!("{} ({} rows)", result.sheet_name, result.table.len().saturating_sub(1));
                for row in &result.table {
                    println!("{}", row.join("\t"));
                }
            }
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn list_table(plugins: &[std::sync::Arc<Plugin>]) -> String {
    if plugins.is_empty() {
        return "No plugins registered\n".to_string();
    }
    let width = plugins
        .iter()
        .map(|p| p.metadata.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!("{:<width$}  {:<8}  {:<8}  DESCRIPTION\n", "NAME", "VERSION", "TYPE");
    for plugin in plugins {
        let m = &plugin.metadata;
        out.push_str(&format!(
            "{:<width$}  {:<8}  {:<8}  {}\n",
            m.name,
            m.version,
            m.plugin_type.to_string(),
            m.description
        ));
    }
    out
}

fn describe(plugin: &Plugin) -> String {
    let m = &plugin.metadata;
    let mut out = format!(
        "Name:        {}\nVersion:     {}\nType:        {}\nDescription: {}\nAuthor:      {}\nLicense:     {}\n",
        m.name, m.version, m.plugin_type, m.description, m.author, m.license
    );
    if let Some(path) = &m.command_path {
        out.push_str(&format!("Path:        {}\n", path.display()));
    }
    if !m.column_metadata.is_empty() {
        out.push_str("Columns:\n");
        for column in &m.column_metadata {
            out.push_str(&format!("  - {} ({})\n", column.name, column.data_key));
        }
    }
    if !plugin.yaml_recommendations.is_empty() {
        out.push_str(&format!("Queries:     {}\n", plugin.yaml_recommendations.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use azqr_plugins::{ColumnMetadata, FilterType, PluginMetadata, PluginType};

    use super::*;

    fn plugin(name: &str) -> Plugin {
        Plugin {
            metadata: PluginMetadata {
                name: name.into(),
                version: "1.0.0".into(),
                description: "Test plugin".into(),
                author: "azqr".into(),
                license: "MIT".into(),
                plugin_type: PluginType::Internal,
                command_path: None,
                column_metadata: vec![ColumnMetadata::new("Resource Type", "resourceType", FilterType::Dropdown)],
            },
            internal_scanner: None,
            yaml_recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_list_table_aligns_names() {
        let table = list_table(&[Arc::new(plugin("a")), Arc::new(plugin("carbon-emissions"))]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].starts_with("carbon-emissions  1.0.0"));
        assert!(lines[2].contains("internal"));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(list_table(&[]), "No plugins registered\n");
    }

    #[test]
    fn test_describe_includes_columns() {
        let text = describe(&plugin("carbon-emissions"));
        assert!(text.contains("Name:        carbon-emissions"));
        assert!(text.contains("  - Resource Type (resourceType)"));
        assert!(!text.contains("Path:"));
    }
}
