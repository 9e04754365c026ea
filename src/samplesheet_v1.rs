// ==============================================================================
// samplesheet_v1.rs - Illumina Sample Sheet v1 (IEM) Serializer
// ==============================================================================
// Description: Builds the legacy IEM sample sheet accepted by MiSeq and
//              NovaSeq 6000 from an annotated run
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format:
//   [Header]     key,value      IEMFileVersion 4
//   [Reads]      bare values    Read 1 cycles, Read 2 cycles when > 0
//   [Settings]   key,value
//   [Data]       table          [Lane,]Sample_ID,Sample_Name,Sample_Project,
//                               index,index2,Description
// Index 2 is written in the order the instrument reads it, so it is
// reverse-complemented on reverse-complement instruments. A shared
// OverrideCycles goes into [Settings]; v1 has no per-sample column.
// ==============================================================================

use crate::chemistry::Instrument;
use crate::cycle_engine::{oriented_for_export, OverrideCyclesMode};
use crate::models::{IndexType, RunConfiguration, Sample};
use crate::samplesheet::{lane_rows, non_empty, setting, CsvDocument, CsvSection, SerializationError};
use tracing::{debug, warn};

pub const IEM_FILE_VERSION: &str = "4";

const DATA_COLUMNS: [&str; 6] = [
    "Sample_ID",
    "Sample_Name",
    "Sample_Project",
    "index",
    "index2",
    "Description",
];

/// Builds v1 (IEM) sample sheets
#[derive(Debug, Default)]
pub struct SampleSheetV1Serializer;

impl SampleSheetV1Serializer {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(instrument: &Instrument) -> bool {
        instrument.samplesheet_v1
    }

    pub fn serialize(&self, run: &RunConfiguration) -> Result<CsvDocument, SerializationError> {
        if !Self::supports(run.instrument) {
            return Err(SerializationError::V1Unsupported {
                instrument: run.instrument.name,
            });
        }
        if run.samples.is_empty() {
            return Err(SerializationError::NoSamples);
        }
        if run.run_cycles.read1 == 0 {
            return Err(SerializationError::ZeroReadCycles);
        }

        let mode = OverrideCyclesMode::for_samples(&run.samples);
        let sections = vec![
            header_section(run),
            reads_section(run),
            settings_section(run, &mode),
            data_section(run),
        ];

        debug!("Serialized run {} as v1 sample sheet", run.id);
        Ok(CsvDocument { sections })
    }
}

fn header_section(run: &RunConfiguration) -> CsvSection {
    let mut entries = vec![setting("IEMFileVersion", IEM_FILE_VERSION)];
    if let Some(investigator) = non_empty(run.created_by.as_deref()) {
        entries.push(setting("Investigator Name", investigator));
    }
    if let Some(name) = non_empty(run.run_name.as_deref()) {
        entries.push(setting("Experiment Name", name));
    }
    entries.push(setting("Date", run.created_at.format("%Y-%m-%d").to_string()));
    entries.push(setting("Workflow", "GenerateFASTQ"));
    entries.push(setting("Application", "FASTQ Only"));
    if let Some(description) = non_empty(run.run_description.as_deref()) {
        entries.push(setting("Description", description));
    }
    entries.push(setting("Chemistry", "Default"));
    entries.push(setting("Custom_UUID", run.id.to_string()));

    CsvSection::key_value("Header", entries)
}

fn reads_section(run: &RunConfiguration) -> CsvSection {
    let mut values = vec![run.run_cycles.read1.to_string()];
    if run.run_cycles.read2 > 0 {
        values.push(run.run_cycles.read2.to_string());
    }
    CsvSection::values("Reads", values)
}

fn settings_section(run: &RunConfiguration, mode: &OverrideCyclesMode) -> CsvSection {
    let mut entries = vec![
        setting("ReverseComplement", "0"),
        setting("BarcodeMismatchesIndex1", run.barcode_mismatches_index1.to_string()),
        setting("BarcodeMismatchesIndex2", run.barcode_mismatches_index2.to_string()),
    ];

    match mode {
        OverrideCyclesMode::Uniform(global) => entries.push(setting(
            "OverrideCycles",
            oriented_for_export(global, run.i5_orientation()).to_string(),
        )),
        OverrideCyclesMode::PerSample => {
            warn!(
                "Run {} has per-sample override cycles; the v1 sample sheet carries none",
                run.id
            );
        }
    }

    CsvSection::key_value("Settings", entries)
}

fn data_section(run: &RunConfiguration) -> CsvSection {
    let has_lanes = run.has_explicit_lanes();
    let orientation = run.i5_orientation();

    let mut columns = Vec::with_capacity(DATA_COLUMNS.len() + 1);
    if has_lanes {
        columns.push("Lane".to_string());
    }
    columns.extend(DATA_COLUMNS.iter().map(|c| c.to_string()));

    let samples: Vec<&Sample> = run.samples.iter().collect();
    let rows = lane_rows(run, &samples)
        .into_iter()
        .map(|(lane, sample)| {
            let mut row = Vec::with_capacity(columns.len());
            if has_lanes {
                row.push(lane.map(|l| l.to_string()).unwrap_or_default());
            }
            row.push(sample.sample_id.clone());
            row.push(sample.sample_id.clone());
            row.push(sample.project.clone().unwrap_or_default());
            for index_type in IndexType::ALL {
                row.push(
                    sample
                        .read_sequence(index_type, orientation)
                        .map(|seq| seq.to_string())
                        .unwrap_or_default(),
                );
            }
            row.push(sample.description.clone().unwrap_or_default());
            row
        })
        .collect();

    CsvSection::table("Data", columns, rows)
}
