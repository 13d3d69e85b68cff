//! # WTP Grader
//!
//! Runs WTP conformance cases against `<binaries>/WTP-base` and
//! `<binaries>/WTP-opt`. Needs root for network namespaces.
//!
//! ```bash
//! sudo wtp-grader -A -B --binaries ./submission
//! sudo wtp-grader --base 4 --verbose
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;
use wtp_grader::{
    Binaries, CaseRunner, ConfigError, HarnessConfig, Netns, Pacer, Part, SuiteResult,
    TestCaseSpec, TestTables, case_line, run_suite, testdefs,
};

#[derive(Parser, Debug)]
#[command(
    name = "wtp-grader",
    about = "Conformance grader for WTP sender/receiver pairs",
    group(
        ArgGroup::new("selection")
            .required(true)
            .multiple(true)
            .args(["base", "opt", "part_a", "part_b"])
    )
)]
struct Cli {
    /// Run a single base test by index.
    #[arg(short = 'b', long, value_name = "N")]
    base: Option<usize>,

    /// Run a single opt test by index.
    #[arg(short = 'o', long, value_name = "N")]
    opt: Option<usize>,

    /// Run every base test.
    #[arg(short = 'A', long = "part-a")]
    part_a: bool,

    /// Run every opt test.
    #[arg(short = 'B', long = "part-b")]
    part_b: bool,

    /// Log command lines, PIDs and per-step details.
    #[arg(short, long)]
    verbose: bool,

    /// TOML file with [[base]] and [[opt]] cases, replacing the built-in tables.
    #[arg(long, value_name = "FILE")]
    tests: Option<PathBuf>,

    /// Directory containing WTP-base/ and WTP-opt/.
    #[arg(long, default_value = ".")]
    binaries: PathBuf,

    /// Directory the test input files are resolved against.
    #[arg(long, default_value = "grader/test_files")]
    test_files: PathBuf,

    /// Path to the wtp-relay binary. Defaults to the one next to this binary.
    #[arg(long)]
    relay_bin: Option<PathBuf>,
}

/// A case to run on its own, already bounds-checked.
struct Single<'a> {
    part: Part,
    index: usize,
    case: &'a TestCaseSpec,
    binaries: Binaries,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit 1; --help keeps clap's behaviour.
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .compact()
        .init();

    let started = Instant::now();

    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } != 0 {
        return Err(ConfigError::NotRoot.into());
    }

    let relay_bin = match cli.relay_bin {
        Some(path) => path,
        None => default_relay_bin().context("failed to locate wtp-relay")?,
    };
    if !relay_bin.is_file() {
        return Err(ConfigError::MissingBinary {
            what: "relay",
            path: relay_bin,
        }
        .into());
    }

    let tables = match &cli.tests {
        Some(path) => TestTables::load(path, &cli.test_files)?,
        None => testdefs::builtin(&cli.test_files)?,
    };

    let mut singles = Vec::new();
    for (part, index) in [(Part::Base, cli.base), (Part::Opt, cli.opt)] {
        if let Some(index) = index {
            singles.push(Single {
                part,
                index,
                case: tables.case(part, index)?,
                binaries: checked_binaries(&cli.binaries, part)?,
            });
        }
    }
    let mut parts = Vec::new();
    for (part, wanted) in [(Part::Base, cli.part_a), (Part::Opt, cli.part_b)] {
        if wanted {
            parts.push((part, checked_binaries(&cli.binaries, part)?));
        }
    }

    let harness = HarnessConfig {
        relay_bin,
        ..HarnessConfig::default()
    };
    tracing::debug!(
        relay = %harness.relay_bin.display(),
        binaries = %cli.binaries.display(),
        test_files = %cli.test_files.display(),
        "wtp-grader starting"
    );
    let runner = CaseRunner::new(
        Netns {
            hosts: harness.hosts.clone(),
        },
        harness,
    );

    let mut pacer = Pacer::new(runner.harness().rest_interval);
    for single in &singles {
        pacer.next_case().await;
        println!(
            "********* Running {} test number: {} *********",
            single.part, single.index
        );
        let outcome = runner
            .run(single.part, single.index, single.case, &single.binaries)
            .await;
        println!("{}", case_line(&outcome));
    }

    if !parts.is_empty() {
        let mut summary = SuiteResult::default();
        for (part, binaries) in &parts {
            println!("\n### Running all {part} tests.");
            let cases = tables.part(*part);
            let result = run_suite(&runner, &mut pacer, *part, cases, binaries).await;
            summary = summary.merge(result);
        }
        println!("\n{summary}");
    }

    println!("Elapsed time: {:.2?}", started.elapsed());
    Ok(())
}

fn checked_binaries(root: &Path, part: Part) -> Result<Binaries, ConfigError> {
    let binaries = Binaries::for_part(root, part);
    binaries.check()?;
    Ok(binaries)
}

fn default_relay_bin() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe.with_file_name("wtp-relay"))
}
