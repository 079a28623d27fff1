use anyhow::{Context, Result};
use clap::Parser;
use convertdrv::cli::{Cli, Op, OutputFormat};
use convertdrv::config::DriverConfig;
use convertdrv::driver::ConvertDriver;
use convertdrv::miscdev::{AccessMode, Caller, MiscRegistry};
use std::io::BufRead;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Read operations from stdin, one per line
fn ops_from_stdin() -> Result<Vec<Op>> {
    let stdin = std::io::stdin();
    let mut ops = Vec::new();
    for (lineno, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read operations from stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let op = line
            .parse::<Op>()
            .map_err(|e| anyhow::anyhow!("stdin line {}: {}", lineno + 1, e))?;
        ops.push(op);
    }
    Ok(ops)
}

fn load_config(args: &Cli) -> Result<DriverConfig> {
    match &args.config {
        Some(path) => DriverConfig::from_file(path)
            .with_context(|| format!("Invalid configuration in {}", path.display())),
        None => Ok(DriverConfig::default()),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = load_config(&args)?;

    let ops = if args.ops.is_empty() {
        ops_from_stdin()?
    } else {
        args.ops.clone()
    };

    let registry = MiscRegistry::new();
    let driver = ConvertDriver::init(&registry, &config)?;
    let file = driver
        .open(Caller::current(), AccessMode::ReadWrite)
        .with_context(|| format!("Cannot open {}", driver.device().path()))?;

    let mut failed = 0usize;
    for op in &ops {
        let report = op.run(&driver, &file);
        match args.format {
            OutputFormat::Text if report.ok => println!("{}", report.to_text()),
            OutputFormat::Text => eprintln!("{}", report.to_text()),
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        }
        if !report.ok {
            failed += 1;
        }
    }

    file.close();

    if failed > 0 {
        anyhow::bail!("{} of {} operations failed", failed, ops.len());
    }
    Ok(())
}
