use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the ride core workspace",
    long_about = "A unified CLI for running the lifecycle demo, contention experiments,\n\
                  benchmarks, and CI checks in the ride core workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ride lifecycle demo with the offline city table
    Demo,
    /// Run a contention experiment sweep
    Contention {
        /// Driver counts to sweep, comma separated
        #[arg(long, default_value = "2,8,32")]
        drivers: String,
        /// Worker threads per run, comma separated
        #[arg(long, default_value = "4,8")]
        threads: String,
        /// Operations per worker thread
        #[arg(long, default_value_t = 2_000)]
        ops: usize,
        /// Write full reports to this JSON file
        #[arg(long)]
        json: Option<String>,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run load tests (ignored tests in ride_core)
    LoadTest,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Run the demo and a short contention sweep
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn spawn(program: &str, args: &[&str]) -> ExitStatus {
    eprintln!("+ {program} {}", args.join(" "));
    match Command::new(program).args(args).status() {
        Ok(status) => status,
        Err(error) => {
            eprintln!("failed to execute {program}: {error}");
            exit(1);
        }
    }
}

fn run_cargo(args: &[&str]) {
    let status = spawn("cargo", args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = spawn("git", args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_demo() {
    run_cargo(&["run", "-p", "ride_core", "--example", "ride_lifecycle"]);
}

fn run_contention(drivers: &str, threads: &str, ops: usize, json: Option<&str>) {
    let ops = ops.to_string();
    let mut args = vec![
        "run",
        "-p",
        "ride_experiments",
        "--release",
        "--bin",
        "contention",
        "--",
        "--drivers",
        drivers,
        "--threads",
        threads,
        "--ops",
        &ops,
    ];
    if let Some(path) = json {
        args.extend(["--json", path]);
    }
    run_cargo(&args);
}

fn run_bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", "ride_core", "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test ride_core");
    run_cargo(&["test", "-p", "ride_core"]);

    step("Test ride_core with geoapify");
    run_cargo(&["test", "-p", "ride_core", "--features", "geoapify"]);

    step("Test ride_experiments");
    run_cargo(&["test", "-p", "ride_experiments"]);
}

fn ci_examples() {
    step("Run ride_lifecycle demo");
    run_demo();

    step("Run short contention sweep");
    run_contention("1,4", "4", 500, None);
}

fn ci_bench() {
    step("Run benchmarks");
    run_bench(&[]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Contention {
            drivers,
            threads,
            ops,
            json,
        } => run_contention(&drivers, &threads, ops, json.as_deref()),
        Commands::Bench => run_bench(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                if let Err(error) = std::fs::remove_dir_all(baseline_dir) {
                    eprintln!("failed to remove target/criterion: {error}");
                    exit(1);
                }
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            run_bench(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            run_bench(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LoadTest => {
            run_cargo(&[
                "test",
                "-p",
                "ride_core",
                "--test",
                "load_tests",
                "--",
                "--ignored",
            ]);
        }
    }
}
