//! bookkeeper-native: start a JVM on the vendored BookKeeper jars, open a
//! ledger and append a payload to it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use bookkeeper_native::classpath;
use bookkeeper_native::descriptors::BOOKKEEPER_TYPES;
use bookkeeper_native::runner::{self, AppendOutcome, RunReport};
use bookkeeper_native::settings::{Overrides, Settings};
use jvm_bridge::jvm::{JniRuntime, ManagedRuntime};
use jvm_bridge::DescriptorCache;

#[derive(Parser)]
#[command(name = "bookkeeper-native")]
#[command(version)]
#[command(about = "Append entries to a BookKeeper ledger through the Java client")]
struct Cli {
    /// JSON settings file; every field is optional
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the run report as JSON on completion
    #[arg(long)]
    report: bool,

    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply(cli.overrides);
    settings.validate()?;

    let classpath = classpath::build_classpath(&settings.vendor_dir);
    let jvm = ManagedRuntime::start(&classpath).context("Failed to create the JVM")?;

    let report = drive(&jvm, &settings)?;
    jvm.stop();

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Everything that needs the attached thread. The descriptor cache is torn
/// down before the thread detaches.
fn drive(jvm: &ManagedRuntime, settings: &Settings) -> anyhow::Result<RunReport> {
    let env = jvm.attach()?;
    let runtime = JniRuntime::new(&env);

    let mut cache = DescriptorCache::resolve(&runtime, BOOKKEEPER_TYPES)
        .context("Failed to resolve BookKeeper classes")?;

    let report = runner::run(&cache, settings, |outcome| {
        if let AppendOutcome::Appended(entry_id) = outcome {
            println!("Appended id={entry_id}");
        }
    });

    cache.teardown();
    Ok(report?)
}
