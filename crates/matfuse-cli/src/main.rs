//! matfuse CLI: validate, explain, and run reorg graphs; exercise fused
//! row-wise kernels.

mod demo;

use clap::{Parser, Subcommand};
use matfuse_core::config::{ExecConfig, OptimizerConfig};
use matfuse_core::matrix::{MatrixBlock, SparseBlock};
use matfuse_exec::{FusedRowwise, LopExecutor, RowType};
use matfuse_planner::{parse_yaml_graph, HopKind, ParsedGraph};
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "matfuse")]
#[command(about = "matfuse: reorg planning and fused row-wise kernels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a graph YAML file and check that it lowers
    Validate {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Show placements and the physical plan for a graph (EXPLAIN)
    Explain {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,

        /// Local memory budget in bytes (overrides config)
        #[arg(long)]
        mem_budget: Option<u64>,

        /// Print the physical plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lower a graph and run it on synthetic inputs
    Run {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,

        /// Density of the synthetic inputs
        #[arg(long, default_value_t = 0.5)]
        density: f64,
    },

    /// Run a demo row kernel serially and in parallel and compare
    Rowwise {
        #[arg(long, default_value_t = 10_000)]
        rows: usize,

        #[arg(long, default_value_t = 100)]
        cols: usize,

        /// Worker threads for the parallel run (capped by config)
        #[arg(long)]
        threads: Option<usize>,

        /// NO_AGG, ROW_AGG, FULL_AGG, COL_AGG or COL_AGG_T
        #[arg(long, default_value = "ROW_AGG")]
        row_type: RowType,

        #[arg(long, default_value_t = 1.0)]
        density: f64,

        /// Store the input sparse
        #[arg(long)]
        sparse: bool,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { graph } => validate_graph(&graph).map(|n| {
            println!("✓ Graph is valid ({n} physical operators)");
        }),
        Commands::Explain {
            graph,
            mem_budget,
            json,
        } => explain_graph(&graph, mem_budget, json),
        Commands::Run { graph, density } => run_graph(&graph, density),
        Commands::Rowwise {
            rows,
            cols,
            threads,
            row_type,
            density,
            sparse,
        } => run_rowwise(rows, cols, threads, row_type, density, sparse),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_graph(path: &Path, mem_budget: Option<u64>) -> CliResult<ParsedGraph> {
    let src = fs::read_to_string(path)?;
    let mut parsed = parse_yaml_graph(&src, OptimizerConfig::from_env())?;
    if let Some(b) = mem_budget {
        let mut cfg = parsed.graph.config().clone();
        cfg.local_mem_budget_bytes = b;
        parsed.graph.set_config(cfg);
    }
    Ok(parsed)
}

fn validate_graph(path: &Path) -> CliResult<usize> {
    let mut parsed = load_graph(path, None)?;
    let program = parsed.graph.lower_all()?;
    Ok(program.roots.iter().map(|r| r.count()).sum())
}

fn explain_graph(path: &Path, mem_budget: Option<u64>, json: bool) -> CliResult<()> {
    let mut parsed = load_graph(path, mem_budget)?;
    let program = parsed.graph.lower_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let cfg = parsed.graph.config();
    println!("Graph Plan");
    println!("==========");
    println!();
    println!("Optimization: {:?}", cfg.optimization_type);
    println!(
        "Local Budget: {} bytes ({:.2} MB)",
        cfg.local_mem_budget_bytes,
        cfg.local_mem_budget_bytes as f64 / 1_048_576.0
    );
    println!();
    println!("Nodes:");
    print!("{}", parsed.graph.explain());
    println!();
    println!("Physical Plan ({}):", program.fingerprint()?.short());
    print!("{program}");
    Ok(())
}

fn run_graph(path: &Path, density: f64) -> CliResult<()> {
    let mut parsed = load_graph(path, None)?;
    let program = parsed.graph.lower_all()?;

    let mut exec = LopExecutor::new();
    for hop in parsed.graph.iter() {
        if !matches!(hop.kind(), HopKind::Input) {
            continue;
        }
        let (rows, cols) = hop
            .characteristics()
            .dims()
            .ok_or_else(|| format!("input '{}' has unknown dims", hop.name()))?;
        exec.bind(hop.name(), demo::synth_block(rows as usize, cols as usize, density));
    }

    let out = exec.run(&program)?;
    println!("✓ Graph executed successfully");
    println!("  Duration: {}ms", out.manifest.finished_ms - out.manifest.started_ms);
    println!("  Plan hash: {}", out.manifest.plan_hash);
    for (root, block) in program.roots.iter().zip(&out.results) {
        println!(
            "  {} -> {}x{} (nnz {})",
            root.kind.label(),
            block.rows(),
            block.cols(),
            block.non_zeros()
        );
    }
    println!("{}", serde_json::to_string_pretty(&out.manifest)?);
    Ok(())
}

fn run_rowwise(
    rows: usize,
    cols: usize,
    threads: Option<usize>,
    row_type: RowType,
    density: f64,
    sparse: bool,
) -> CliResult<()> {
    let cfg = ExecConfig::from_env();
    let k = threads
        .unwrap_or(cfg.max_parallel_tasks)
        .clamp(1, cfg.max_parallel_tasks.max(1));
    let kernel = demo::kernel_for(row_type)
        .ok_or_else(|| format!("no demo kernel for {row_type}"))?;
    let op = FusedRowwise::new(row_type, kernel).with_config(cfg);

    let d = demo::synth_block(rows, cols, density);
    let a = if sparse {
        MatrixBlock::from(SparseBlock::from_dense(&d))
    } else {
        MatrixBlock::from(d)
    };
    let scalars = [2.0];

    let t0 = Instant::now();
    let serial = op.execute(&[&a], &scalars)?;
    let t_serial = t0.elapsed();
    let t1 = Instant::now();
    let parallel = op.execute_parallel(&[&a], &scalars, k)?;
    let t_parallel = t1.elapsed();

    println!("{row_type} over {rows}x{cols} (nnz {}):", a.nnz());
    println!("  serial:   {:>10.3} ms", t_serial.as_secs_f64() * 1e3);
    println!("  parallel: {:>10.3} ms (k={k})", t_parallel.as_secs_f64() * 1e3);
    println!(
        "  output:   {}x{} (nnz {}), results agree: {}",
        parallel.rows(),
        parallel.cols(),
        parallel.non_zeros(),
        serial.approx_eq(&parallel, 1e-9)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GRAPH: &str = r#"
config:
  optimization_type: heuristic
nodes:
  - input: { name: X, rows: 4, cols: 4 }
  - reorg: { name: d, op: diag_m2v, input: X }
"#;

    fn write_graph(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("matfuse-cli-{}-{name}.yaml", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(GRAPH.as_bytes()).unwrap();
        path
    }

    #[test]
    fn validate_counts_operators() {
        let path = write_graph("validate");
        // data + partial + group + aggregate
        assert_eq!(validate_graph(&path).unwrap(), 4);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn cli_budget_overrides_file() {
        let path = write_graph("budget");
        let parsed = load_graph(&path, Some(1234)).unwrap();
        assert_eq!(parsed.graph.config().local_mem_budget_bytes, 1234);
        let _ = fs::remove_file(path);
    }
}
