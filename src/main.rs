// ==============================================================================
// main.rs - Sequencing Run Setup CLI
// ==============================================================================
// Description: Entry point: validate a run, print override cycles or export
//              the sample sheet bundle
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seqsetup_core::color_balance::DEFAULT_WARNING_PERCENT;
use seqsetup_core::cycle_engine::CycleRequest;
use seqsetup_core::processor::{ProcessorOptions, RunProcessor};
use seqsetup_core::samplesheet::LineEnding;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse indexes and print the validation report as JSON
    Validate {
        #[command(flatten)]
        run: RunArgs,

        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print each sample's override cycles as written to the sample sheet
    OverrideCycles {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Write sample sheet, metadata and validation report (plus a v1 sheet
    /// on instruments that accept one)
    Export {
        #[command(flatten)]
        run: RunArgs,

        /// Output directory
        #[arg(short, long, env = "SEQSETUP_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Line ending of the sample sheet (lf or crlf)
        #[arg(long, env = "SEQSETUP_LINE_ENDING", default_value = "lf")]
        line_ending: LineEnding,

        /// Leave out the Cloud_Settings/Cloud_Data sections
        #[arg(long, env = "SEQSETUP_NO_CLOUD")]
        no_cloud: bool,

        /// Export even if validation reports errors
        #[arg(long, env = "SEQSETUP_FORCE")]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run configuration (JSON)
    #[arg(short, long, env = "SEQSETUP_RUN")]
    run: PathBuf,

    /// Color balance warning threshold (percent of signal per channel)
    #[arg(long, default_value_t = DEFAULT_WARNING_PERCENT)]
    balance_warning: f64,

    /// Read 1 cycles; setting any cycle flag recomputes all four from the kit
    #[arg(long)]
    read1: Option<u32>,

    #[arg(long)]
    read2: Option<u32>,

    #[arg(long)]
    index1: Option<u32>,

    #[arg(long)]
    index2: Option<u32>,
}

impl RunArgs {
    fn cycle_request(&self) -> Option<CycleRequest> {
        let request = CycleRequest {
            read1: self.read1,
            read2: self.read2,
            index1: self.index1,
            index2: self.index2,
        };
        (request != CycleRequest::default()).then_some(request)
    }

    fn options(&self) -> ProcessorOptions {
        ProcessorOptions {
            balance_warning_percent: self.balance_warning,
            cycle_request: self.cycle_request(),
            ..ProcessorOptions::default()
        }
    }
}

fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seqsetup_core=info,seqsetup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { run, output } => {
            let processor = RunProcessor::new(run.options());
            let mut config = RunProcessor::load_run(&run.run)?;
            let report = processor.validate(&mut config)?;

            let json = serde_json::to_string_pretty(&report)?;
            if let Some(path) = output {
                std::fs::write(&path, &json)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                info!("Validation report written to {:?}", path);
            }
            println!("{}", json);

            if report.has_errors() {
                warn!("Run has {} validation errors", report.error_count());
                std::process::exit(1);
            }
            Ok(())
        }

        Command::OverrideCycles { run } => {
            let processor = RunProcessor::new(run.options());
            let mut config = RunProcessor::load_run(&run.run)?;
            for (sample_id, override_cycles) in processor.override_cycles(&mut config)? {
                println!("{}\t{}", sample_id, override_cycles);
            }
            Ok(())
        }

        Command::Export {
            run,
            output_dir,
            line_ending,
            no_cloud,
            force,
        } => {
            let processor = RunProcessor::new(ProcessorOptions {
                output_dir,
                line_ending,
                cloud_sections: !no_cloud,
                force,
                ..run.options()
            });
            let mut config = RunProcessor::load_run(&run.run)?;
            let summary = processor.export(&mut config)?;

            info!(
                "Export completed successfully: {} files ({} errors, {} warnings)",
                summary.files.len(),
                summary.report.error_count(),
                summary.report.warning_count()
            );
            Ok(())
        }
    }
}
