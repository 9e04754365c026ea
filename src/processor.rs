// ==============================================================================
// processor.rs - Run Setup Pipeline
// ==============================================================================
// Description: Loads a run, resolves cycles, computes override cycles,
//              analyses indexes and writes the export bundle
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::color_balance::DEFAULT_WARNING_PERCENT;
use crate::cycle_engine::{annotate_run, oriented_for_export, resolve_run_cycles, validate_cycles, CycleRequest};
use crate::models::RunConfiguration;
use crate::output::{OutputFormat, OutputGenerator};
use crate::samplesheet::{LineEnding, SampleSheetSerializer, SerializerOptions};
use crate::validator::{RunValidator, ValidationReport};

/// Pipeline settings, usually filled from CLI flags
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub output_dir: PathBuf,
    pub line_ending: LineEnding,
    pub cloud_sections: bool,
    /// Export even when the validation report has errors
    pub force: bool,
    pub balance_warning_percent: f64,
    /// Replaces the run's cycles when any read is set
    pub cycle_request: Option<CycleRequest>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            line_ending: LineEnding::Lf,
            cloud_sections: true,
            force: false,
            balance_warning_percent: DEFAULT_WARNING_PERCENT,
            cycle_request: None,
        }
    }
}

/// Result of a successful export
#[derive(Debug)]
pub struct ExportSummary {
    pub report: ValidationReport,
    pub files: HashMap<OutputFormat, PathBuf>,
}

pub struct RunProcessor {
    options: ProcessorOptions,
}

impl RunProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self { options }
    }

    /// Read a run configuration from a JSON file
    pub fn load_run(path: &Path) -> Result<RunConfiguration> {
        debug!("Loading run configuration from {:?}", path);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run configuration {:?}", path))?;
        let run: RunConfiguration = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse run configuration {:?}", path))?;

        info!(
            "Loaded run {} ({}, {} samples)",
            run.display_name(),
            run.instrument.name,
            run.samples.len()
        );
        Ok(run)
    }

    /// Resolve and check cycles, then compute override cycles for every sample
    pub fn prepare(&self, run: &mut RunConfiguration) -> Result<()> {
        // 1. Resolve cycles
        if let Some(request) = &self.options.cycle_request {
            run.run_cycles = resolve_run_cycles(run.reagent_cycles, request)
                .context("Requested cycles do not fit the reagent kit")?;
        }
        validate_cycles(&run.run_cycles, run.reagent_cycles).context("Invalid run cycles")?;

        let cycles = run.run_cycles;
        info!(
            "Run cycles: Read1 {}, Index1 {}, Index2 {}, Read2 {} ({} of {})",
            cycles.read1,
            cycles.index1,
            cycles.index2,
            cycles.read2,
            cycles.total_cycles(),
            run.reagent_cycles
        );

        // 2. Override cycles
        annotate_run(run).context("Failed to compute override cycles")?;
        Ok(())
    }

    /// Prepare a run and analyse its indexes
    pub fn validate(&self, run: &mut RunConfiguration) -> Result<ValidationReport> {
        self.prepare(run)?;

        let report = RunValidator::new()
            .with_balance_warning_percent(self.options.balance_warning_percent)
            .validate(run)
            .context("Index analysis failed")?;

        info!(
            "Validation: {} errors, {} warnings",
            report.error_count(),
            report.warning_count()
        );
        Ok(report)
    }

    /// Override cycles per sample as they will be written for the instrument
    pub fn override_cycles(&self, run: &mut RunConfiguration) -> Result<Vec<(String, String)>> {
        self.prepare(run)?;

        let orientation = run.i5_orientation();
        Ok(run
            .samples
            .iter()
            .filter_map(|sample| {
                sample
                    .override_cycles
                    .as_ref()
                    .map(|oc| (sample.sample_id.clone(), oriented_for_export(oc, orientation).to_string()))
            })
            .collect())
    }

    /// Full pipeline: prepare, analyse, gate on errors, serialize and write
    pub fn export(&self, run: &mut RunConfiguration) -> Result<ExportSummary> {
        // 1-2. Cycles and override cycles; 3. Analysis
        let report = self.validate(run)?;

        // 4. Gate
        if report.has_errors() {
            if !self.options.force {
                anyhow::bail!(
                    "Run has {} validation errors; fix them or export with --force",
                    report.error_count()
                );
            }
            warn!("Exporting despite {} validation errors (forced)", report.error_count());
        }

        // 5. Serialize
        let serializer = SampleSheetSerializer::new(SerializerOptions {
            cloud_sections: self.options.cloud_sections,
        });
        let document = serializer
            .serialize(run)
            .context("Failed to build sample sheet")?;

        // 6. Write
        let files = OutputGenerator::new(&self.options.output_dir)
            .with_line_ending(self.options.line_ending)
            .generate(run, &document, &report)
            .context("Failed to write export bundle")?;

        for format in OutputFormat::ALL {
            if let Some(path) = files.get(&format) {
                info!("{}: {:?}", format.extension(), path);
            }
        }
        Ok(ExportSummary { report, files })
    }
}
