use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use pinpoint::{parse_file, MutationEngine, INTERPRETER_STACK_SIZE};

mod config;
mod report;
mod run;

use crate::config::{HarnessConfig, TestCase};
use crate::report::{diff, summary, MutantReport, Verdict};
use crate::run::{killed, run};

const DEFAULT_NUM_MUTANTS: usize = 10;
const DEFAULT_TIMEOUT_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(version, about = "Generate single-edit mutants of a program and report which tests they kill")]
struct Args {
    /// Path to the subject program
    subject: PathBuf,

    /// Path to .toml configuration (weights, timeout, mutants, tests)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Path to .toml test suite; replaces the tests of the configuration
    #[arg(short, long, value_name = "FILE")]
    suite: Option<PathBuf>,
    /// Number of mutants to generate [default: 10]
    #[arg(short, long)]
    num_mutants: Option<usize>,
    /// Per-test timeout in milliseconds [default: 1000]
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Write `no-mutations.py` and `<i>.py` for each mutant into this directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// Mutant i is seeded with `seed_offset + i`
    #[arg(long, default_value_t = 0)]
    seed_offset: u64,
    /// Print a unified diff of each mutant against the original
    #[arg(long)]
    diff: bool,
}

struct Mutant {
    name: String,
    program: pinpoint::Program,
    source: String,
}

fn write_source(dir: &Path, name: &str, source: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, source).with_context(|| format!("could not write {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Args::parse();

    // parse config or take default
    let configuration = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let tests: Vec<TestCase> = match &cli.suite {
        Some(path) => HarnessConfig::load(path)?.tests,
        None => configuration.tests.clone(),
    };
    if tests.is_empty() {
        bail!("no tests to run: pass --suite or add [[tests]] to the configuration");
    }
    let num_mutants = cli.num_mutants.or(configuration.num_mutants).unwrap_or(DEFAULT_NUM_MUTANTS);
    let timeout = Duration::from_millis(cli.timeout.or(configuration.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS));

    let original =
        parse_file(&cli.subject).with_context(|| format!("could not parse {}", cli.subject.display()))?;
    let original_source = original.emit();

    if let Some(dir) = &cli.out {
        fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;
        write_source(dir, "no-mutations.py", &original_source)?;
    }

    // Step 1: create the mutants
    info!("creating {num_mutants} mutants");
    let mut engine = MutationEngine::new(configuration.weights);
    let mut mutants = Vec::with_capacity(num_mutants);
    for i in 0..num_mutants {
        let name = format!("{i}.py");
        let mut rng = StdRng::seed_from_u64(cli.seed_offset + i as u64);
        let (program, mutation) = engine.mutate_owned(original.clone(), &mut rng);
        match &mutation {
            Some(m) => info!("{name}: {} #{} at {}:{}: {}", m.category, m.index, m.span.line, m.span.col, m.description),
            None => info!("{name}: no eligible sites"),
        }
        let source = program.emit();
        if let Some(dir) = &cli.out {
            if let Err(err) = write_source(dir, &name, &source) {
                println!("FAILED to create mutant {i}: {err:#}");
                continue;
            }
        }
        mutants.push(Mutant { name, program, source });
    }

    // Step 2: run each mutant on the full suite
    let worker_tests = tests.clone();
    let worker = thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || {
            let baseline = run(&original, &worker_tests, timeout);
            if let Some((test, _)) = worker_tests
                .iter()
                .zip(&baseline)
                .find(|(_, o)| !matches!(o, run::Outcome::Returned(_)))
            {
                warn!("original program does not return normally on {test}");
            }
            mutants
                .into_iter()
                .map(|m| {
                    let outcomes = run(&m.program, &worker_tests, timeout);
                    let verdict = Verdict::from_killed(killed(&worker_tests, &baseline, &outcomes));
                    (MutantReport { name: m.name, verdict }, m.source)
                })
                .collect::<Vec<_>>()
        })
        .context("could not start interpreter thread")?;
    let results = worker.join().map_err(|_| anyhow!("interpreter thread panicked"))?;

    // Step 3: report
    let mut reports = Vec::with_capacity(results.len());
    for (report, source) in results {
        println!("{report}");
        if cli.diff {
            print!("{}", diff(&original_source, &source, &report.name));
        }
        reports.push(report);
    }
    print!("{}", summary(&reports, tests.len()));
    Ok(())
}
