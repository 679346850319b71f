//! # CLI Command Implementations

use crate::api;
use crate::scenario::{Roster, Scenario, ScenarioRunner};
use nodenet_core::{NetworkConfig, NetworkError, NodeNetwork, RemakeReport, VariantTable};
use std::path::Path;

/// Output flags shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub verbose: bool,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Load the registry configuration, or the builtin one.
pub fn load_config(path: Option<&Path>) -> Result<NetworkConfig, NetworkError> {
    match path {
        Some(path) => NetworkConfig::load(path),
        None => Ok(NetworkConfig::builtin()),
    }
}

/// Run a scenario file against a fresh network.
pub fn run_scenario(
    config: Option<&Path>,
    scenario: &Path,
    verify: bool,
) -> Result<(ScenarioRunner, Vec<RemakeReport>), NetworkError> {
    let mut config = load_config(config)?;
    if verify {
        config.engine.verify_after_remake = true;
    }
    let network = NodeNetwork::from_config(&config, &VariantTable::builtin())?;
    let scenario = Scenario::load(scenario)?;

    let mut runner = ScenarioRunner::new(network, verify);
    let reports = runner.run(&scenario)?;
    Ok((runner, reports))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn print_reports(reports: &[RemakeReport]) {
    for r in reports {
        println!(
            "  tick {:>3}: scanned {:>4}  created {:>3}  reused {:>3}  retired {:>3}  splits {:>3}  merges {:>3}  ({} us)",
            r.tick, r.nodes_scanned, r.created, r.reused, r.retired, r.splits, r.merges, r.elapsed_micros
        );
    }
    println!();
}

fn print_roster(roster: &Roster) {
    println!("nodenet Roster (tick {})", roster.tick);
    println!("========================");
    println!("Nodes:  {}", roster.metrics.node_count);
    println!("Edges:  {}", roster.metrics.edge_count);
    println!("Groups: {}", roster.metrics.group_count);
    println!();

    for group in &roster.groups {
        let data = group.debug_data.as_deref().unwrap_or("");
        println!(
            "  {:<8} {:<12} {:<6} {:>4} nodes  {}",
            group.net_id.to_string(),
            group.kind,
            group.variant,
            group.node_count,
            data
        );
    }
    if !roster.nodes.is_empty() {
        println!();
        for node in &roster.nodes {
            let net = node
                .net_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            println!("  {:<12} {:<12} {:<12} {}", node.name, node.owner.to_string(), node.kind, net);
        }
    }
}

// =============================================================================
// KINDS COMMAND
// =============================================================================

/// List the registered group kinds.
pub fn cmd_kinds(config: Option<&Path>, output: Output) -> Result<(), NetworkError> {
    let config = load_config(config)?;
    config.validate()?;

    if output.json {
        let kinds: Vec<_> = config
            .kinds
            .iter()
            .map(|k| {
                serde_json::json!({
                    "name": k.name,
                    "variant": k.variant,
                    "singleton_groups": config.singleton_groups(k),
                })
            })
            .collect();
        print_json(&serde_json::json!({ "kinds": kinds }));
        return Ok(());
    }

    println!("Registered Group Kinds");
    println!("======================");
    for kind in &config.kinds {
        let singletons = if config.singleton_groups(kind) {
            "singletons"
        } else {
            "no singletons"
        };
        println!("  {:<16} {:<8} {}", kind.name.as_str(), kind.variant, singletons);
    }
    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run a scenario and print the roster.
pub fn cmd_run(config: Option<&Path>, scenario: &Path, output: Output) -> Result<(), NetworkError> {
    let (runner, reports) = run_scenario(config, scenario, false)?;
    let roster = runner.roster();

    if output.json {
        let mut value = serde_json::to_value(&roster)
            .map_err(|e| NetworkError::Io(format!("Cannot encode roster: {}", e)))?;
        if output.verbose {
            let reports = serde_json::to_value(&reports)
                .map_err(|e| NetworkError::Io(format!("Cannot encode reports: {}", e)))?;
            if let Some(map) = value.as_object_mut() {
                map.insert("reports".to_string(), reports);
            }
        }
        print_json(&value);
        return Ok(());
    }

    if output.verbose {
        print_reports(&reports);
    }
    print_roster(&roster);
    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Run a scenario with full verification after every tick.
pub fn cmd_verify(
    config: Option<&Path>,
    scenario: &Path,
    output: Output,
) -> Result<(), NetworkError> {
    let (runner, reports) = run_scenario(config, scenario, true)?;
    runner.network().verify()?;

    if output.json {
        print_json(&serde_json::json!({
            "consistent": true,
            "ticks": reports.len(),
            "groups": runner.network().group_count(),
        }));
        return Ok(());
    }

    if output.verbose {
        print_reports(&reports);
    }
    println!(
        "Consistent after {} ticks ({} groups)",
        reports.len(),
        runner.network().group_count()
    );
    Ok(())
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Run a scenario, then serve its roster.
pub async fn cmd_serve(
    config: Option<&Path>,
    scenario: &Path,
    host: &str,
    port: u16,
) -> Result<(), NetworkError> {
    let (runner, reports) = run_scenario(config, scenario, false)?;
    let roster = runner.roster();

    println!("nodenet debug server starting...");
    println!();
    println!("Scenario: {:?} ({} ticks)", scenario, reports.len());
    println!("Groups:   {}", roster.metrics.group_count);
    println!();
    println!("Endpoints:");
    println!("  GET /health           - Health check");
    println!("  GET /groups           - Live groups");
    println!("  GET /groups/{{net_id}}  - One group");
    println!("  GET /nodes            - Named nodes");
    println!("  GET /metrics          - Counters");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, roster).await
}
