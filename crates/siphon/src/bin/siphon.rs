//! siphon - route PipeWire streams and devices through a shared hub sink
//!
//! Subcommands:
//! - `siphon list` - show selectable endpoints and the hub
//! - `siphon plan` - print the commands a selection would issue
//! - `siphon apply` - converge the graph on a selection once
//! - `siphon watch` - apply, then keep the graph converged until Ctrl-C
//! - `siphon config` - print the effective configuration

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use siphon::{watch_until, ApplyReport, Engine, EndpointListing, EndpointView, HubStatus, Outcome, Plan};
use siphon_graph::{EndpointId, Role};
use siphonconf::SiphonConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "siphon")]
#[command(about = "Route PipeWire streams and devices through a shared hub sink")]
#[command(version)]
struct Cli {
    /// Config file, replacing ./siphon.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List selectable endpoints, their link state and the hub
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the commands a selection would issue, without running them
    Plan(Selection),

    /// Apply a selection once; exits 1 if any command failed
    Apply(Selection),

    /// Apply a selection and keep re-applying as the graph changes
    Watch(Selection),

    /// Print the effective configuration and where it came from
    Config,
}

#[derive(Args)]
struct Selection {
    /// Input endpoint to route into the hub (stream:<id>, source:<id>, tap:<id>)
    #[arg(short, long = "input")]
    inputs: Vec<EndpointId>,

    /// Output sink fed from the hub monitor (sink:<id>)
    #[arg(short, long = "output")]
    outputs: Vec<EndpointId>,

    /// Endpoint whose hub links should be removed
    #[arg(short, long = "disable")]
    disable: Vec<EndpointId>,

    /// Request the hub (default)
    #[arg(long, conflicts_with = "no_hub")]
    hub: bool,

    /// Tear the hub down if it is ours
    #[arg(long)]
    no_hub: bool,

    /// Treat an existing hub with the configured name as ours
    #[arg(long)]
    adopt_hub: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) =
        SiphonConfig::load_with_sources_from(cli.config.as_deref()).context("Failed to load configuration")?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.telemetry.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { json } => {
            let engine = Engine::from_config(&config)?;
            engine.refresh().await.context("Failed to read the PipeWire graph")?;
            let listing = engine.endpoints().await;
            let hub = engine.hub_status().await;
            if json {
                let out = serde_json::json!({ "hub": hub, "inputs": listing.inputs, "outputs": listing.outputs });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_listing(&listing, &hub);
            }
        }
        Commands::Plan(selection) => {
            config.hub.adopt_existing |= selection.adopt_hub;
            let engine = Engine::from_config(&config)?;
            engine.refresh().await.context("Failed to read the PipeWire graph")?;
            stage(&engine, &selection).await?;
            print_plan(&engine.plan().await);
        }
        Commands::Apply(selection) => {
            config.hub.adopt_existing |= selection.adopt_hub;
            let engine = Engine::from_config(&config)?;
            engine.refresh().await.context("Failed to read the PipeWire graph")?;
            stage(&engine, &selection).await?;
            let report = engine.apply().await.context("Apply skipped")?;
            print_report(&report);
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
        Commands::Watch(selection) => {
            config.hub.adopt_existing |= selection.adopt_hub;
            let engine = Engine::from_config(&config)?;
            engine.refresh().await.context("Failed to read the PipeWire graph")?;
            stage(&engine, &selection).await?;
            watch(engine, config.refresh.period()).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml());
            println!();
            if sources.files.is_empty() {
                println!("# sources: defaults only");
            }
            for file in &sources.files {
                println!("# file: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
        }
    }

    Ok(())
}

/// Push a command line selection into the engine's intent.
async fn stage(engine: &Engine, selection: &Selection) -> Result<()> {
    let snapshot = engine.snapshot().await;
    let requested = selection.inputs.iter().chain(&selection.outputs).chain(&selection.disable);
    for id in requested {
        if !snapshot.contains_endpoint(*id) {
            warn!(endpoint = %id, "endpoint not present in the graph, ignoring");
        }
    }

    for id in &selection.inputs {
        engine.toggle_input(*id, true).await?;
    }
    for id in &selection.outputs {
        engine.toggle_output(*id, true).await?;
    }
    for id in &selection.disable {
        match id.role() {
            Role::Input => engine.toggle_input(*id, false).await?,
            Role::Output => engine.toggle_output(*id, false).await?,
        }
    }
    engine.set_hub_requested(selection.hub || !selection.no_hub).await;
    Ok(())
}

async fn watch(engine: Engine, period: Option<std::time::Duration>) -> Result<()> {
    let report = engine.apply().await.context("Initial apply skipped")?;
    print_report(&report);

    let Some(interval) = period else {
        warn!("refresh.enabled is false, nothing to watch after the initial apply");
        return Ok(());
    };

    info!(interval_ms = interval.as_millis() as u64, "watching graph, Ctrl-C to stop");
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, stopping"),
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C, stopping"),
        }
    };
    watch_until(&engine, interval, ctrl_c, print_report)
        .await
        .map_err(|e| anyhow!("refresh task failed: {}", e))?;
    Ok(())
}

fn print_listing(listing: &EndpointListing, hub: &HubStatus) {
    match hub.node {
        Some(node) => println!("hub {}: node {} ({}ch)", hub.name, node, hub.channels),
        None => println!("hub {}: absent", hub.name),
    }

    println!("\nINPUTS");
    for view in &listing.inputs {
        print_endpoint(view);
    }
    println!("\nOUTPUTS");
    for view in &listing.outputs {
        print_endpoint(view);
    }
}

fn print_endpoint(view: &EndpointView) {
    println!(
        "  {:<12} {:<9} {}",
        view.endpoint.id.to_string(),
        view.status.as_str(),
        view.endpoint.label
    );
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("nothing to do");
    }
    for (i, command) in plan.commands.iter().enumerate() {
        println!("{:>3}. {}", i + 1, command);
    }
    for id in &plan.mapping.skipped {
        println!("  note: {} has no ports to map", id);
    }
    for u in &plan.mapping.unmatched {
        println!(
            "  note: {} leaves {} source / {} destination port(s) unpaired",
            u.endpoint, u.sources, u.destinations
        );
    }
}

fn print_report(report: &ApplyReport) {
    if report.is_empty() {
        println!("nothing to do");
        return;
    }
    for (command, outcome) in &report.outcomes {
        let mark = match outcome {
            Outcome::Applied => " ok ",
            Outcome::Failed { .. } => "FAIL",
            Outcome::Skipped { .. } => "skip",
        };
        println!("[{}] {}  {}", mark, command, outcome);
    }
    println!(
        "{} applied, {} failed, {} skipped",
        report.applied(),
        report.failed(),
        report.skipped()
    );
}
