//! Aether CLI - run propagations, integrity checks, and scenarios from the shell.

use aether::scenario::ORCHESTRATION_BATCH;
use aether::{
    AetherConfig, CONFIG_FILE, EnergyLeveler, HealthMajority, IntegrityReport, IntegrityValidator,
    LatticeError, MemoryStore, MultiChainHarmonics, NewsClient, Propagation, PropagationReport,
    RecordingScheduler, Shape, SwarmEvolution, SwarmOrchestration, SynergyAggregator,
    SynergyCoordinator, Verdict, VecTaskQueue, build_lattice, integrate_insights, load_config,
    load_topology, rng_from, save_topology, summarize,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const TOPOLOGY_FILE: &str = "topology.yaml";

#[derive(Parser)]
#[command(name = "aether")]
#[command(about = "Energy-bounded signal propagation over node lattices")]
#[command(version)]
struct Cli {
    /// Config file (default: ./aether.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample aether.yaml and topology.yaml in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Flood a signal through a topology from one node
    Propagate {
        /// Topology file (YAML)
        #[arg(short, long, default_value = TOPOLOGY_FILE)]
        topology: PathBuf,

        /// Signal to deliver
        #[arg(short, long)]
        signal: String,

        /// Start node ID
        #[arg(long)]
        from: String,

        /// Energy spent per visited node (default: energy_cost from config)
        #[arg(short, long)]
        cost: Option<f64>,

        /// Stop relaying at nodes that cannot afford the cost
        #[arg(long)]
        gated: bool,

        /// Write resulting energies back to the topology file
        #[arg(long)]
        save: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every node's energy against a threshold
    Validate {
        /// Topology file (YAML)
        #[arg(short, long, default_value = TOPOLOGY_FILE)]
        topology: PathBuf,

        /// Minimum healthy energy (default: integrity_threshold from config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Force a node to zero energy before checking (repeatable)
        #[arg(long)]
        drain: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a built-in scenario
    Simulate {
        /// Scenario to run
        #[arg(value_parser = clap::builder::PossibleValuesParser::new([
            "evolution", "aggregate", "coordinate", "integrity", "harmonics", "orchestrate",
        ]))]
        scenario: String,

        /// Node count (chain count for harmonics)
        #[arg(short, long)]
        nodes: Option<usize>,

        /// Rounds (ticks for orchestrate)
        #[arg(short, long, default_value = "3")]
        rounds: usize,

        /// RNG seed (default: seed from config, else random)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fetch headlines and flood them through a coordinator lattice
    Insight {
        /// RNG seed (default: seed from config, else random)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "aether=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn is_json(format: &str) -> bool {
    format == "json"
}

fn emit_error(format: &str, code: &str, detail: &str) -> ! {
    if is_json(format) {
        eprintln!("{}", json!({"error": code, "detail": detail}));
    } else {
        eprintln!("{}", format!("Error: {}", detail).red());
    }
    process::exit(1);
}

fn lattice_failure(format: &str, e: LatticeError) -> ! {
    emit_error(format, "lattice", &e.to_string())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => emit_error("json", "serialization", &e.to_string()),
    }
}

fn current_dir(format: &str) -> PathBuf {
    env::current_dir().unwrap_or_else(|e| emit_error(format, "cwd", &e.to_string()))
}

fn resolve_config(path: Option<PathBuf>, format: &str) -> AetherConfig {
    let path = path.unwrap_or_else(|| current_dir(format).join(CONFIG_FILE));
    load_config(&path).unwrap_or_else(|e| {
        emit_error(
            format,
            "config",
            &format!("{}: {}", path.display(), e),
        )
    })
}

fn print_propagation(report: &PropagationReport) {
    println!(
        "{}",
        format!(
            "Propagated '{}' from {} (cost {}, {:?})",
            report.signal, report.origin, report.energy_cost, report.mode
        )
        .bold()
    );
    for visit in &report.visits {
        let relay = if visit.relayed {
            "".normal()
        } else {
            " [not relayed]".yellow()
        };
        println!(
            "  {} {:<20} {} -> {}{}",
            format!("hop {}", visit.hop).dimmed(),
            visit.node_id.cyan(),
            visit.energy_before,
            visit.energy_after,
            relay
        );
    }
    println!(
        "{}",
        format!(
            "{} nodes reached, {} energy spent",
            report.visits.len(),
            report.energy_spent()
        )
        .dimmed()
    );
}

fn print_integrity(report: &IntegrityReport) {
    println!("{}", "=== Graph Integrity Report ===".bold());
    for check in &report.checks {
        let line = check.to_string();
        match check.verdict {
            Verdict::Pass => println!("{}", line),
            Verdict::Fail => println!("{}", line.red()),
        }
    }
    let overall = format!("Overall Result: INTEGRITY {}", report.verdict());
    match report.verdict() {
        Verdict::Pass => println!("{}", overall.green().bold()),
        Verdict::Fail => println!("{}", overall.red().bold()),
    }
}

fn print_node_states(nodes: &[aether::Node]) {
    println!();
    println!("{}", "NODE STATES".bold());
    for node in nodes {
        let last = node.last_signal().unwrap_or("-");
        println!(
            "  {:<20} energy={:<8} signals={:<3} last={}",
            node.id().cyan(),
            node.energy(),
            node.state.received_signals.len(),
            last.dimmed()
        );
    }
}

fn run_simulation(
    scenario: &str,
    nodes: Option<usize>,
    rounds: usize,
    seed: Option<u64>,
    config: &AetherConfig,
    format: &str,
) {
    let mut rng = rng_from(seed.or(config.seed));
    let energy = config.default_energy;
    let cost = config.energy_cost;

    match scenario {
        "evolution" => {
            let mut swarm = SwarmEvolution::new(nodes.unwrap_or(5), energy, cost);
            let reports = swarm
                .run_rounds(rounds, &mut rng, &mut EnergyLeveler)
                .unwrap_or_else(|e| lattice_failure(format, e));
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "rounds": reports,
                    "nodes": swarm.lattice().nodes().iter().map(|n| n.snapshot()).collect::<Vec<_>>(),
                }));
            } else {
                for round in &reports {
                    println!("{}", format!("--- Round {}/{} ---", round.round, rounds).bold());
                    print_propagation(&round.propagation);
                }
                print_node_states(swarm.lattice().nodes());
            }
        }
        "aggregate" => {
            let mut aggregator = SynergyAggregator::new(nodes.unwrap_or(4), energy, cost);
            aggregator.assign_data(&[
                "BTC Reaches New High",
                "ETH Upgrade Completed",
                "Doge Meme Craze",
                "Solana Gains Traction",
            ]);
            let reports = aggregator
                .propagate_all(&mut rng)
                .unwrap_or_else(|e| lattice_failure(format, e));
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "propagations": reports,
                    "nodes": aggregator.lattice().nodes().iter().map(|n| n.snapshot()).collect::<Vec<_>>(),
                }));
            } else {
                for report in &reports {
                    print_propagation(report);
                }
                print_node_states(aggregator.lattice().nodes());
            }
        }
        "coordinate" => {
            let mut coordinator = SynergyCoordinator::new(nodes.unwrap_or(4), energy, cost);
            let mut scheduler = RecordingScheduler::default();
            let tasks = coordinator.assign_tasks(&mut rng, &mut scheduler);
            let consensus = coordinator.evaluate(
                &HealthMajority {
                    min_energy: config.integrity_threshold,
                },
                "Approve new synergy protocol?",
            );
            let reports = coordinator
                .propagate_random(&mut rng)
                .unwrap_or_else(|e| lattice_failure(format, e));
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "tasks": tasks,
                    "consensus": consensus,
                    "propagations": reports,
                }));
            } else {
                for (id, task) in &tasks {
                    println!("  {} {}", id.cyan(), task);
                }
                println!(
                    "Consensus on '{}': {} ({} for, {} against)",
                    consensus.proposal,
                    if consensus.approved {
                        "approved".green()
                    } else {
                        "rejected".red()
                    },
                    consensus.votes_for,
                    consensus.votes_against
                );
                for report in &reports {
                    print_propagation(report);
                }
                print_node_states(coordinator.lattice().nodes());
            }
        }
        "integrity" => {
            let mut validator = IntegrityValidator::new(nodes.unwrap_or(5), energy);
            let before = validator.validate(config.integrity_threshold);
            let drained = validator.drain(0);
            let after = validator.validate(config.integrity_threshold);
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "before": before,
                    "drained": drained,
                    "after": after,
                }));
            } else {
                print_integrity(&before);
                if let Some(id) = drained {
                    println!();
                    println!("{}", format!("Node {} forcibly depleted to 0 energy.", id).yellow());
                    println!();
                }
                print_integrity(&after);
            }
        }
        "harmonics" => {
            let mut harmonics = MultiChainHarmonics::new(nodes.unwrap_or(2), energy, cost);
            let reports = harmonics
                .propagate_cross_chain(&mut rng)
                .unwrap_or_else(|e| lattice_failure(format, e));
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "propagations": reports,
                }));
            } else {
                if reports.is_empty() {
                    println!("{}", "Not enough chains for cross-chain signals.".yellow());
                }
                for report in &reports {
                    println!("{}", format!("[Chain {}]", report.chain).dimmed());
                    print_propagation(&report.propagation);
                }
                for (i, chain) in harmonics.chains().iter().enumerate() {
                    println!();
                    println!("{}", format!("Chain {}", i + 1).bold());
                    print_node_states(chain.nodes());
                }
            }
        }
        "orchestrate" => {
            let mut orchestration = SwarmOrchestration::new(nodes.unwrap_or(3), energy);
            let mut queue =
                VecTaskQueue::new((1..=rounds * ORCHESTRATION_BATCH).map(|i| format!("task-{i}")));
            let mut store = MemoryStore::new();
            let decider = HealthMajority {
                min_energy: config.integrity_threshold,
            };
            let report = orchestration.run(rounds, &mut queue, &mut store, &decider, &mut rng);
            if is_json(format) {
                print_json(&json!({
                    "scenario": scenario,
                    "orchestration": report,
                }));
            } else {
                for tick in &report.ticks {
                    println!(
                        "{} fetched {} task(s)",
                        format!("[tick {}]", tick.tick).dimmed(),
                        tick.fetched.len()
                    );
                    for (id, task) in &tick.assignments {
                        println!("  {} <- {}", id.cyan(), task);
                    }
                    if let Some(outcome) = &tick.consensus {
                        println!(
                            "  consensus: {}",
                            if outcome.approved {
                                "approved".green()
                            } else {
                                "rejected".red()
                            }
                        );
                    }
                }
                println!();
                println!("{}", "FINAL STORED STATES".bold());
                for stored in &report.final_states {
                    let state = stored
                        .state
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let at = stored
                        .stored_at
                        .map(|t| t.format("%H:%M:%S%.3f").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("  {} {} {}", stored.node_id.cyan(), at.dimmed(), state.dimmed());
                }
            }
        }
        other => emit_error(format, "scenario", &format!("Unknown scenario: {}", other)),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            let cwd = current_dir("text");
            let config = if force {
                let path = cli.config.unwrap_or_else(|| cwd.join(CONFIG_FILE));
                load_config(&path).unwrap_or_default()
            } else {
                resolve_config(cli.config, "text")
            };

            let config_path = cwd.join(CONFIG_FILE);
            let topology_path = cwd.join(TOPOLOGY_FILE);
            if !force {
                for path in [&config_path, &topology_path] {
                    if path.exists() {
                        emit_error(
                            "text",
                            "exists",
                            &format!("{} already exists (use --force to overwrite)", path.display()),
                        );
                    }
                }
            }

            if let Err(e) = std::fs::write(&config_path, aether::config::default_config_yaml()) {
                emit_error("text", "io", &format!("{}: {}", config_path.display(), e));
            }
            println!("{}", format!("Created {}", CONFIG_FILE).green());

            let sample = build_lattice("Node", 5, config.default_energy, Shape::Ring);
            if let Err(e) = save_topology(&topology_path, &sample) {
                emit_error("text", "io", &e.to_string());
            }
            println!("{}", format!("Created {}", TOPOLOGY_FILE).green());
            println!();
            println!("Next steps:");
            println!("  aether propagate --signal ping --from Node-1");
            println!("  aether validate");
        }

        Commands::Propagate {
            topology,
            signal,
            from,
            cost,
            gated,
            save,
            format,
        } => {
            let config = resolve_config(cli.config, &format);
            let mut lattice = load_topology(&topology, config.default_energy)
                .unwrap_or_else(|e| emit_error(&format, "topology", &e.to_string()));

            let mode = if gated {
                Propagation::EnergyGated
            } else {
                Propagation::Flood
            };
            let report = lattice
                .propagate_signal_with(&signal, &from, cost.unwrap_or(config.energy_cost), mode)
                .unwrap_or_else(|e| emit_error(&format, "lattice", &e.to_string()));

            if save {
                if let Err(e) = save_topology(&topology, &lattice) {
                    emit_error(&format, "topology", &e.to_string());
                }
            }

            if is_json(&format) {
                print_json(&json!({
                    "propagation": report,
                    "visited": report.visited(),
                    "nodes": lattice.nodes().iter().map(|n| n.snapshot()).collect::<Vec<_>>(),
                }));
            } else {
                print_propagation(&report);
                if save {
                    println!("{}", format!("Saved {}", topology.display()).dimmed());
                }
            }
        }

        Commands::Validate {
            topology,
            threshold,
            drain,
            format,
        } => {
            let config = resolve_config(cli.config, &format);
            let mut lattice = load_topology(&topology, config.default_energy)
                .unwrap_or_else(|e| emit_error(&format, "topology", &e.to_string()));
            for id in &drain {
                if let Err(e) = lattice.drain_node(id) {
                    emit_error(&format, "lattice", &e.to_string());
                }
            }

            let report = lattice.validate_integrity(threshold.unwrap_or(config.integrity_threshold));
            if is_json(&format) {
                print_json(&json!({
                    "passed": report.passed(),
                    "verdict": report.verdict(),
                    "threshold": report.threshold,
                    "checks": report.checks,
                }));
            } else {
                print_integrity(&report);
            }

            if !report.passed() {
                process::exit(2);
            }
        }

        Commands::Simulate {
            scenario,
            nodes,
            rounds,
            seed,
            format,
        } => {
            let config = resolve_config(cli.config, &format);
            run_simulation(&scenario, nodes, rounds, seed, &config, &format);
        }

        Commands::Insight { seed, format } => {
            let config = resolve_config(cli.config, &format);
            let rt = tokio::runtime::Runtime::new()
                .unwrap_or_else(|e| emit_error(&format, "runtime", &e.to_string()));
            let client = NewsClient::from_config(config.news.clone());
            let headlines = rt.block_on(client.fetch_latest());

            let mut rng = rng_from(seed.or(config.seed));
            let report = integrate_insights(
                &headlines,
                config.default_energy,
                config.energy_cost,
                &mut rng,
            )
            .unwrap_or_else(|e| emit_error(&format, "lattice", &e.to_string()));

            if is_json(&format) {
                print_json(&json!({
                    "headlines": headlines,
                    "insight": report,
                }));
            } else {
                if headlines.is_empty() {
                    println!("{}", "No headlines fetched; using coordinator signals.".yellow());
                } else {
                    print!("{}", summarize(&headlines));
                    println!();
                }
                println!("{}", report.summary);
            }
        }
    }
}
