//! jmxctl - Main entry point
//!
//! Loads an option file, resolves it into a `ServiceJmxSpec` and plans,
//! applies or validates it.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use jmxctl::apply::{Primitives, converge};
use jmxctl::cli::{Cli, Commands};
use jmxctl::config_file::JmxOptions;
use jmxctl::engine::plan::calculate_plan;
use jmxctl::primitives::{EnvFileEditor, KeytoolImporter, LocalFiles, SystemdService};
use jmxctl::types::ServiceJmxSpec;

/// Initialize tracing with `RUST_LOG` taking precedence over `-v`
fn init_logger(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.log_level());
    debug!("CLI arguments parsed");

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate { config } => {
            let spec = load_spec(config)?;
            info!(service = %spec.service_name, "option file is valid");
            println!("✓ Options are valid for service {}", spec.service_name);
        }
        Commands::Plan { config } => {
            let spec = load_spec(config)?;
            println!("{}", calculate_plan(&spec).summary());
        }
        Commands::Apply { config, no_restart } => {
            let spec = load_spec(config)?;
            if cli.dry_run {
                info!("dry run: printing plan only");
                println!("{}", calculate_plan(&spec).summary());
                return Ok(());
            }
            run_apply(&spec, !no_restart)?;
        }
    }
    Ok(())
}

/// Load, validate and resolve an option file
fn load_spec(path: &Path) -> Result<ServiceJmxSpec> {
    info!("Loading options from: {:?}", path);
    let options = JmxOptions::load_from_file(path)?;
    let spec = options
        .resolve()
        .with_context(|| format!("Invalid options in {:?}", path))?;
    Ok(spec)
}

fn run_apply(spec: &ServiceJmxSpec, restart: bool) -> Result<()> {
    let files = LocalFiles::new();
    let env = EnvFileEditor::new();
    let keystore = KeytoolImporter::new();
    let prims = Primitives {
        files: &files,
        env: &env,
        keystore: &keystore,
    };

    let report = converge(spec, &prims, &SystemdService::new(), restart)
        .with_context(|| format!("Failed to converge JMX for {}", spec.service_name))?;

    if report.is_changed() {
        for change in &report.changed {
            println!("  ~ {}", change);
        }
        if report.restarted {
            println!("✓ {} converged, service restarted", spec.service_name);
        } else {
            println!("✓ {} converged, restart skipped", spec.service_name);
        }
    } else {
        println!("✓ {} already converged", spec.service_name);
    }
    Ok(())
}
