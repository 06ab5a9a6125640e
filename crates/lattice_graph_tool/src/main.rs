// SPDX-License-Identifier: MIT OR Apache-2.0
//! `lattice-graph` - inspect and realize Lattice graph assets.
//!
//! Graph assets are RON files. Subgraph nodes reference other assets by
//! file stem, looked up in a library directory.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use lattice_graph::node::NodeData;
use lattice_graph::settings::SETTINGS_FILE_NAME;
use lattice_graph::{Graph, GraphAsset, GraphContext, GraphSettings, LoadReport};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults apply when omitted)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory of graph assets that subgraph nodes may reference
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print nodes, ports, edges, parameters and diagnostics of an asset
    Inspect {
        /// Graph asset to inspect
        asset: PathBuf,
    },

    /// Inline every subgraph node and write the flattened graph
    Realize {
        /// Graph asset to realize
        asset: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("lattice_graph=info".parse()?)
        .add_directive("lattice_graph_tool=info".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => GraphSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => GraphSettings::default(),
    };
    let ctx = GraphContext::standard().with_settings(settings);
    if let Some(dir) = &cli.library {
        load_library(&ctx, dir)?;
    }

    match cli.command {
        Commands::Inspect { asset } => {
            let (graph, report) = load_graph(&ctx, &asset)?;
            print_graph(&graph);
            print_report(&report);
        }
        Commands::Realize { asset, out } => {
            let (mut graph, report) = load_graph(&ctx, &asset)?;
            print_report(&report);
            let realized = graph
                .realize()
                .with_context(|| format!("Failed to realize {}", asset.display()))?;
            if realized.failed_rewires > 0 {
                tracing::warn!("{} boundary edges could not be rewired", realized.failed_rewires);
            }
            for node in &realized.skipped {
                tracing::warn!("Subgraph node {} was removed without being inlined", node);
            }

            let text = graph.to_asset().to_ron()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Wrote {}", path.display());
                }
                None => println!("{text}"),
            }
        }
    }

    Ok(())
}

fn load_graph(ctx: &GraphContext, path: &Path) -> Result<(Graph, LoadReport)> {
    Graph::load(path, ctx.clone()).with_context(|| format!("Failed to load {}", path.display()))
}

/// Register every asset under `dir`, keyed by file stem.
///
/// Assets are loaded after the assets their subgraph nodes reference, so
/// boundary ports resolve while edges are restored.
fn load_library(ctx: &GraphContext, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("Library {} is not a directory", dir.display());
    }

    let mut assets: IndexMap<String, GraphAsset> = IndexMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("ron")
            || path.file_name().and_then(|n| n.to_str()) == Some(SETTINGS_FILE_NAME)
        {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let asset = GraphAsset::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
        if assets.insert(stem.to_string(), asset).is_some() {
            tracing::warn!("Asset name '{}' appears more than once, keeping {}", stem, path.display());
        }
    }

    let mut done = HashSet::new();
    let mut in_progress = HashSet::new();
    let names: Vec<String> = assets.keys().cloned().collect();
    for name in names {
        register_asset(ctx, &name, &assets, &mut done, &mut in_progress);
    }
    tracing::info!("Loaded {} library graphs from {}", done.len(), dir.display());
    Ok(())
}

fn register_asset(
    ctx: &GraphContext,
    name: &str,
    assets: &IndexMap<String, GraphAsset>,
    done: &mut HashSet<String>,
    in_progress: &mut HashSet<String>,
) {
    if done.contains(name) {
        return;
    }
    let Some(asset) = assets.get(name) else {
        return;
    };
    if !in_progress.insert(name.to_string()) {
        tracing::warn!("Library asset '{}' references itself through its subgraphs", name);
        return;
    }

    for record in &asset.nodes {
        if let NodeData::Subgraph { asset: Some(child) } = &record.data {
            register_asset(ctx, child, assets, done, in_progress);
        }
    }

    let (graph, report) = Graph::from_asset(asset.clone(), ctx.clone());
    if !report.is_clean() {
        tracing::warn!("Library asset '{}' loaded with losses", name);
        print_report(&report);
    }
    ctx.register_graph(name, graph);
    in_progress.remove(name);
    done.insert(name.to_string());
}

fn print_graph(graph: &Graph) {
    println!("Graph '{}'", graph.name);

    if !graph.parameters().is_empty() {
        println!("\nParameters:");
        for parameter in graph.parameters() {
            println!(
                "  {:?} {} : {} ({})",
                parameter.direction, parameter.name, parameter.port_type, parameter.id
            );
        }
    }

    println!("\nNodes ({}):", graph.node_count());
    for node in graph.nodes() {
        let label = node.name.as_deref().unwrap_or(&node.node_type);
        println!("  {} [{}] {}", label, node.node_type, node.id);
        for port in node.ports() {
            let marker = if port.required { "*" } else { "" };
            println!(
                "    {:?} {}{} : {} ({} edges)",
                port.direction,
                port.id,
                marker,
                port.port_type,
                port.edges().len()
            );
        }
        for message in node.messages() {
            println!("    ! {message}");
        }
    }

    println!("\nEdges ({}):", graph.edge_count());
    for edge in graph.edges() {
        println!(
            "  {}.{} -> {}.{}",
            edge.from.node, edge.from.port, edge.to.node, edge.to.port
        );
    }
}

fn print_report(report: &LoadReport) {
    for dropped in &report.dropped_edges {
        eprintln!("dropped edge {}: {}", dropped.edge.id, dropped.reason);
    }
    for node in &report.skipped_nodes {
        eprintln!("skipped node {} of unknown type '{}'", node.id, node.node_type);
    }
    for (node, old, new) in &report.renamed_members {
        eprintln!("node {node}: member '{old}' resolved as '{new}'");
    }
    for id in &report.duplicate_parameters {
        eprintln!("parameter {id} is declared more than once");
    }
}
