//! `azqr scan`

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use azqr_core::domain::{ScanParams, StageConfigs, load_filters};
use azqr_scanners::scanner_registry;

use crate::cli::context::CliContext;
use crate::cli::{Cli, exit_codes};

#[derive(Args, Debug, Default)]
pub struct ScanCommandArgs {
    /// Management group name; subscriptions under it are scanned recursively
    #[arg(short = 'm', long = "management-group-id")]
    pub management_groups: Vec<String>,

    /// Subscription id
    #[arg(short = 's', long = "subscription-id")]
    pub subscriptions: Vec<String>,

    /// Resource group name; needs exactly one subscription id
    #[arg(short = 'g', long = "resource-group")]
    pub resource_groups: Vec<String>,

    /// YAML filter file
    #[arg(short = 'e', long)]
    pub filters: Option<PathBuf>,

    /// Scanner keys to run, e.g. `st`, `kv`
    #[arg(long = "service", value_delimiter = ',')]
    pub services: Vec<String>,

    /// Stages to enable (`name`) or disable (`-name`)
    #[arg(long = "stages", value_delimiter = ',', allow_hyphen_values = true)]
    pub stages: Vec<String>,

    /// Stage option as `stage.key=value`
    #[arg(long = "stage-param")]
    pub stage_params: Vec<String>,

    /// Output file name, without extension
    #[arg(short = 'o', long = "output-name")]
    pub output_name: Option<String>,

    /// Directory the report files are written to
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Write a JSON report
    #[arg(long)]
    pub json: bool,

    /// Print the JSON report on stdout
    #[arg(long)]
    pub stdout: bool,

    /// Write an Excel report
    #[arg(long)]
    pub xlsx: bool,

    /// Write CSV reports
    #[arg(long)]
    pub csv: bool,

    /// Show full subscription ids in the report
    #[arg(long = "no-mask")]
    pub no_mask: bool,

    /// Skip the service scanners' rule engines
    #[arg(long = "no-azqr")]
    pub no_azqr: bool,

    /// Skip the graph recommendations
    #[arg(long = "no-aprl")]
    pub no_aprl: bool,

    /// Internal plugin to run with the scan
    #[arg(long = "plugin")]
    pub plugins: Vec<String>,
}

/// Turn command-line arguments into scan parameters
pub fn build_params(args: &ScanCommandArgs, debug: bool) -> Result<ScanParams> {
    let filters = load_filters(args.filters.as_deref(), &args.services, scanner_registry())?;

    let mut stages = StageConfigs::with_defaults();
    if !args.stages.is_empty() {
        stages.configure_stages(&args.stages)?;
    }
    stages.apply_stage_params(&args.stage_params)?;

    let enabled_internal_plugins: BTreeMap<String, bool> =
        args.plugins.iter().map(|p| (p.clone(), true)).collect();

    // JSON stands in for the Excel default
    let json = args.json || !(args.stdout || args.xlsx || args.csv);

    Ok(ScanParams {
        management_groups: args.management_groups.clone(),
        subscriptions: args.subscriptions.clone(),
        resource_groups: args.resource_groups.clone(),
        output_name: args.output_name.clone().unwrap_or_default(),
        stages,
        xlsx: args.xlsx,
        mask: !args.no_mask,
        csv: args.csv,
        json,
        stdout: args.stdout,
        debug,
        scanner_keys: args.services.clone(),
        filters,
        enabled_internal_plugins,
        use_azqr_recommendations: !args.no_azqr,
        use_aprl_recommendations: !args.no_aprl,
    })
}

pub async fn run(ctx: &CliContext, cli: &Cli, args: &ScanCommandArgs) -> Result<u8> {
    let params = build_params(args, cli.debug)?;
    let report = ctx
        .runner()
        .with_output_dir(args.output_dir.clone())
        .scan(params)
        .await?;

    info!(
        output_name = %report.output_name,
        graph = report.graph.len(),
        azqr = report.azqr.len(),
        "Scan finished"
    );
    Ok(exit_codes::SUCCESS)
}
