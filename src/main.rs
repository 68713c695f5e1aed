use std::fs::{self, File};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use vdi_collector::cli::{Args, Commands};
use vdi_collector::config::{load_or_create_config, TargetCategory, TriageConfig};
use vdi_collector::constants::DEFAULT_LOG_NAME;
use vdi_collector::identity::{export_table, MergeScope};
use vdi_collector::models::{BatchReport, VolumeStatus};
use vdi_collector::orchestrator::{correlate_workspaces, run_batch};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = &args.command {
        initialize_logging(args.verbose, None)?;
        return handle_subcommand(cmd, &args);
    }

    if args.inputs.is_empty() {
        bail!("No evidence inputs given (see --help)");
    }

    // Load configuration and apply command-line overrides
    let config = load_and_apply_config(&args)?;

    fs::create_dir_all(&config.options.workspace_root).context(format!(
        "Failed to create workspace root {}",
        config.options.workspace_root.display()
    ))?;
    let log_path = args
        .log_file
        .then(|| config.options.workspace_root.join(DEFAULT_LOG_NAME));
    initialize_logging(args.verbose, log_path.as_deref())?;

    info!("Starting pooled VDI triage of {} inputs", args.inputs.len());

    let report = run_batch(&args.inputs, &config)?;
    print_report(&report);

    info!("VDI triage completed");
    Ok(())
}

/// Initialize logging with the specified verbosity level, optionally
/// mirroring it to a file
fn initialize_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = File::create(path)
            .context(format!("Failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config and correlate)
fn handle_subcommand(cmd: &Commands, args: &Args) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            TriageConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
        Commands::Correlate { workspaces, output } => {
            let scope = if args.per_volume_merge { MergeScope::Volume } else { MergeScope::Table };
            let table = correlate_workspaces(workspaces, args.profile_list_dir.as_deref(), scope);
            export_table(&table, output)?;
            println!("{} identity records written to {}", table.len(), output.display());
            Ok(())
        }
    }
}

/// Load configuration and apply command-line overrides
fn load_and_apply_config(args: &Args) -> Result<TriageConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;
    let options = &mut config.options;

    if let Some(workspace) = &args.workspace {
        options.workspace_root = workspace.clone();
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if let Some(dir) = &args.profile_list_dir {
        options.profile_list_dir = Some(dir.clone());
    }
    if let Some(name) = &args.identity_csv {
        options.identity_csv = name.clone();
    }
    if args.per_volume_merge {
        options.merge_scope = MergeScope::Volume;
    }

    if let Some(names) = &args.categories {
        let categories = parse_categories(names);
        config.retain_categories(&categories);
        if config.targets.is_empty() {
            bail!("No targets match the requested categories: {}", names);
        }
    }

    Ok(config)
}

/// Parse a comma-separated category list, skipping unknown names
fn parse_categories(names: &str) -> Vec<TargetCategory> {
    names
        .split(',')
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| {
            let category = TargetCategory::from_name(name);
            if category.is_none() {
                warn!("Ignoring unknown target category: {}", name);
            }
            category
        })
        .collect()
}

/// One line per target outcome, grouped by volume
fn print_report(report: &BatchReport) {
    for volume in &report.volumes {
        match volume.status {
            VolumeStatus::Processed => println!(
                "== {} ({}/{} targets)",
                volume.volume_id,
                volume.succeeded_targets(),
                volume.results.len()
            ),
            _ => println!(
                "== {} [FAIL] {}",
                volume.volume_id,
                volume.error.as_deref().unwrap_or("unusable volume")
            ),
        }

        for result in &volume.results {
            let status = if result.success { "[OK]  " } else { "[FAIL]" };
            println!("{} {} ({}): {}", status, result.path, result.user, result.message);
        }
    }

    match &report.identity_csv {
        Some(path) => println!("{} identity records written to {}", report.identity_records, path),
        None => println!("No identity table written"),
    }
    println!(
        "{} of {} volumes processed",
        report.processed_volumes(),
        report.volumes.len()
    );
}
