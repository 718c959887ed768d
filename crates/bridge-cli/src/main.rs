//! rt-bridge: load compiled modules into the IREE runtime and invoke them.
//!
//! This is the command-line front end for `lib-runtime-ffi`.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_runtime_ffi::{self as bridge, RuntimeError};
use lib_types::HostTensor;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rt-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether the runtime library can be loaded
    Probe {
        /// Runtime library to try before the defaults
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Load a module and invoke one of its entry points
    Run {
        /// Run configuration file (TOML, or JSON by extension)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Compiled module (.vmfb)
        #[arg(short, long)]
        module: Option<PathBuf>,

        /// Fully qualified entry point, e.g. module.main
        #[arg(short, long)]
        entry: Option<String>,

        /// Input tensor literal, e.g. "2x3xf32=1 2 3 4 5 6" (repeatable)
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Runtime library to try before the defaults
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Parse tensor literals and print them in canonical form
    Parse {
        /// Literals such as "2x2xi32=1,2,3,4"
        #[arg(required = true)]
        literals: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Probe { library } => {
            probe(library.as_deref(), cli.format)?;
        }
        Commands::Run {
            config,
            module,
            entry,
            inputs,
            library,
        } => {
            let file = match &config {
                Some(path) => config::load_run_file(path)?,
                None => config::RunFile::default(),
            };
            let overrides = config::RunFile {
                library,
                module,
                entry,
                inputs,
            };
            let run = config::RunConfig::try_from(file.merge(overrides))?;
            run_module(&run, cli.format)?;
        }
        Commands::Parse { literals } => {
            parse_literals(&literals, cli.format)?;
        }
    }

    Ok(())
}

fn probe(library: Option<&Path>, format: OutputFormat) -> Result<()> {
    let loaded = bridge::load(library);
    if let Err(err) = &loaded {
        tracing::info!(error = %err, "Runtime not loaded");
    }
    let report = output::ProbeReport {
        available: loaded.is_ok(),
        detail: bridge::availability_detail(),
        error: loaded.err().map(|e: RuntimeError| e.to_string()),
    };
    println!("{}", output::render_probe(&report, format)?);
    Ok(())
}

fn run_module(run: &config::RunConfig, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading module from {:?}", run.module);

    bridge::load(run.library.as_deref()).context("Failed to load the IREE runtime")?;

    let module = std::fs::read(&run.module)
        .with_context(|| format!("Failed to read module: {:?}", run.module))?;
    let mut session = bridge::create_session_from_module(&module)
        .with_context(|| format!("Failed to create a session for {:?}", run.module))?;

    let inputs: Vec<HostTensor<'_>> = run.inputs.iter().map(|t| t.as_host()).collect();
    let outputs = bridge::invoke(&mut session, &run.entry, &inputs)
        .with_context(|| format!("Invocation of '{}' failed", run.entry))?;

    println!("{}", output::render_outputs(&outputs, format)?);

    tracing::info!(
        entry = %run.entry,
        outputs = outputs.len(),
        invocations = session.invocation_count(),
        "Run complete"
    );
    bridge::free_results(outputs);
    bridge::destroy_session(session);
    bridge::unload();
    Ok(())
}

fn parse_literals(literals: &[String], format: OutputFormat) -> Result<()> {
    let tensors = literals
        .iter()
        .map(|literal| {
            lib_types::parse_tensor_literal(literal)
                .with_context(|| format!("Invalid tensor literal: {literal:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    println!("{}", output::render_outputs(&tensors, format)?);
    Ok(())
}
