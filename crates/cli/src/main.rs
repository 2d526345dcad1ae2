use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use depcost_core::queries::{visible_edges, EdgeClass};
use depcost_core::{
    AnalysisConfig, CargoWorkspaceProvider, CostMode, DependencyProvider, Graph, GraphSnapshot,
    Progress, Session, StackKind, StaticProvider,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// depcost - Dependency cost and cycle analysis
#[derive(Parser, Debug)]
#[command(name = "depcost")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(about = "Find circular and redundant dependencies between projects", long_about = None)]
struct Cli {
    /// Cargo workspace to analyze
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Root project; defaults to the package at PATH
    #[arg(long)]
    root: Option<String>,

    /// Read dependencies from a TOML file instead of Cargo manifests
    #[arg(long, value_name = "FILE")]
    deps: Option<PathBuf>,

    /// Analysis configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker threads for cost aggregation
    #[arg(long)]
    threads: Option<usize>,

    /// Spill traversal frames to a scratch file
    #[arg(long)]
    spill: bool,

    /// Directory for the scratch file (implies --spill)
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Read path costs from a snapshot taken before aggregation
    #[arg(long)]
    deterministic: bool,

    /// Do not log the number of paths found per edge
    #[arg(long)]
    quiet_paths: bool,

    /// Hide non-cycle edges whose cost is above this value
    #[arg(long, default_value_t = 1)]
    hide_above: u64,

    /// Emit JSON output instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(threads) = self.threads {
            config.pool_size = threads;
        }
        if self.scratch_dir.is_some() || self.spill {
            config.stack = StackKind::Spill {
                scratch_dir: self.scratch_dir.clone(),
            };
        }
        if self.deterministic {
            config.cost_mode = CostMode::Snapshot;
        }
        if self.quiet_paths {
            config.log_path_counts = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.analysis_config()?;

    match &cli.deps {
        Some(deps) => {
            let provider = StaticProvider::load(deps)?;
            let Some(root) = cli.root.clone() else {
                bail!("--root is required with --deps");
            };
            if !provider.contains(&root) {
                bail!("Project `{}` is not listed in {}", root, deps.display());
            }
            analyze(&cli, provider, root, config)
        }
        None => {
            let provider = CargoWorkspaceProvider::discover(&cli.path)?;
            let root = match cli.root.clone().or_else(|| provider.root_package().map(str::to_string)) {
                Some(root) => root,
                None => bail!(
                    "No package at {}; pick one with --root",
                    cli.path.display()
                ),
            };
            if !provider.contains(&root) {
                bail!("Package `{}` not found below {}", root, cli.path.display());
            }
            analyze(&cli, provider, root, config)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEPCOST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "depcost=debug,info"
        } else {
            "depcost=info,warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn analyze<P>(cli: &Cli, provider: P, root: P::Project, config: AnalysisConfig) -> Result<()>
where
    P: DependencyProvider,
{
    let session = Session::new(provider, root, config)?;
    let progress = Progress::new();

    let report = match session.run(&progress) {
        Ok(report) => report,
        Err(err) if err.is_cancelled() => bail!("Analysis cancelled"),
        Err(err) => return Err(anyhow::Error::new(err).context("Analysis failed")),
    };
    info!(
        elapsed_ms = report.cost.elapsed.as_millis() as u64,
        paths = report.cost.paths,
        "done"
    );

    let Some(graph) = session.into_graph() else {
        bail!("Analysis finished without a graph");
    };

    if cli.json {
        let snapshot = GraphSnapshot::capture(&graph);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_text(&graph, cli.hide_above);
    }
    Ok(())
}

fn print_text(graph: &Graph, hide_above: u64) {
    let visible = visible_edges(graph, hide_above);
    let cycles = graph.edges().filter(|e| e.in_cycle()).count();

    println!(
        "{} projects, {} connections, {} in cycles, {} hidden above cost {}",
        graph.node_count(),
        graph.edge_count(),
        cycles,
        graph.edge_count() - visible.len(),
        hide_above
    );

    for edge_index in visible {
        let edge = &graph[edge_index];
        let marker = match EdgeClass::of(edge) {
            EdgeClass::Cycle => "  (cycle)",
            EdgeClass::Transitive | EdgeClass::Direct => "",
        };
        println!(
            "{} -> {}  cost {}{}",
            graph.node_name(edge.source()),
            graph.node_name(edge.target()),
            edge.cost(),
            marker
        );
    }
}
