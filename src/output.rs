// ==============================================================================
// output.rs - Export Bundle Generation
// ==============================================================================
// Description: Writes the sample sheet, its JSON metadata twin and the
//              validation report for a run
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chemistry::{Chemistry, I5Orientation};
use crate::cycle_engine::infer_global_override_cycles;
use crate::models::{Flowcell, IndexType, RunConfiguration, RunCycles, Sample};
use crate::samplesheet::{CsvDocument, CsvSection, LineEnding, SerializationError};
use crate::samplesheet_v1::SampleSheetV1Serializer;
use crate::validator::ValidationReport;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files making up an export bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Illumina v2 sample sheet
    SampleSheet,
    /// Illumina v1 (IEM) sample sheet, for instruments that accept it
    SampleSheetV1,
    /// JSON twin of the sample sheet
    Metadata,
    /// Analyzer report
    Validation,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::SampleSheet,
        OutputFormat::SampleSheetV1,
        OutputFormat::Metadata,
        OutputFormat::Validation,
    ];

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::SampleSheet => "samplesheet.csv",
            OutputFormat::SampleSheetV1 => "samplesheet_v1.csv",
            OutputFormat::Metadata => "metadata.json",
            OutputFormat::Validation => "validation.json",
        }
    }

    /// Get MIME type for HTTP downloads
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::SampleSheet | OutputFormat::SampleSheetV1 => "text/csv",
            OutputFormat::Metadata | OutputFormat::Validation => "application/json",
        }
    }
}

/// Instrument block of the metadata twin
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentMetadata {
    pub name: String,
    pub platform_name: String,
    pub chemistry: Chemistry,
    pub i5_orientation: I5Orientation,
    pub flowcell: Flowcell,
    pub reagent_cycles: u32,
}

/// Per-sample entry of the metadata twin
#[derive(Debug, Clone, Serialize)]
pub struct SampleMetadata {
    pub sample_id: String,
    pub lanes: Vec<u32>,
    pub i7: Option<String>,
    pub i7_length: usize,
    pub i5: Option<String>,
    pub i5_length: usize,
    /// Forward orientation, as stored on the sample
    pub override_cycles: Option<String>,
    pub barcode_mismatches_index1: u8,
    pub barcode_mismatches_index2: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl From<&Sample> for SampleMetadata {
    fn from(sample: &Sample) -> Self {
        let sequence = |index_type| sample.sequence(index_type).map(|s| s.as_str().to_string());
        let length = |index_type| sample.sequence(index_type).map(|s| s.len()).unwrap_or(0);

        SampleMetadata {
            sample_id: sample.sample_id.clone(),
            lanes: sample.lanes.iter().copied().collect(),
            i7: sequence(IndexType::I7),
            i7_length: length(IndexType::I7),
            i5: sequence(IndexType::I5),
            i5_length: length(IndexType::I5),
            override_cycles: sample.override_cycles.as_ref().map(|oc| oc.to_string()),
            barcode_mismatches_index1: sample.barcode_mismatches_index1,
            barcode_mismatches_index2: sample.barcode_mismatches_index2,
            project: sample.project.clone(),
        }
    }
}

/// JSON twin of a rendered sample sheet
#[derive(Debug, Clone, Serialize)]
pub struct MetadataExport {
    pub run_id: Uuid,
    pub run_name: Option<String>,
    pub run_description: Option<String>,
    pub instrument: InstrumentMetadata,
    pub run_cycles: RunCycles,
    /// Shared override cycles (forward orientation), null when per-sample
    pub global_override_cycles: Option<String>,
    pub samples: Vec<SampleMetadata>,
    /// Mirror of the sample sheet sections, in file order
    pub sections: Vec<CsvSection>,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the rendered sample sheet text
    pub samplesheet_sha256: String,
}

impl MetadataExport {
    pub fn new(run: &RunConfiguration, document: &CsvDocument, samplesheet: &str) -> Self {
        MetadataExport {
            run_id: run.id,
            run_name: run.run_name.clone(),
            run_description: run.run_description.clone(),
            instrument: InstrumentMetadata {
                name: run.instrument.name.to_string(),
                platform_name: run.instrument.platform_name.to_string(),
                chemistry: run.chemistry(),
                i5_orientation: run.i5_orientation(),
                flowcell: run.flowcell.clone(),
                reagent_cycles: run.reagent_cycles,
            },
            run_cycles: run.run_cycles,
            global_override_cycles: infer_global_override_cycles(&run.samples).map(|oc| oc.to_string()),
            samples: run.samples.iter().map(SampleMetadata::from).collect(),
            sections: document.sections.clone(),
            generated_at: Utc::now(),
            samplesheet_sha256: sha256_hex(samplesheet.as_bytes()),
        }
    }
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// File stem for a run: run name (or UUID) restricted to safe characters
pub fn file_stem(run: &RunConfiguration) -> String {
    run.display_name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Writes export bundles into an output directory
pub struct OutputGenerator {
    output_dir: PathBuf,
    line_ending: LineEnding,
}

impl OutputGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            line_ending: LineEnding::default(),
        }
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Write `contents` to a temporary file in the output directory
    fn stage(&self, contents: &str) -> Result<NamedTempFile, OutputError> {
        let io_error = |source| OutputError::Io {
            path: self.output_dir.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.output_dir).map_err(io_error)?;
        file.write_all(contents.as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)?;
        Ok(file)
    }

    /// Path a format would be written to for a run
    pub fn path_for(&self, run: &RunConfiguration, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", file_stem(run), format.extension()))
    }

    /// Write the sample sheet, metadata twin and validation report, plus a
    /// v1 sample sheet when the instrument accepts one.
    ///
    /// Every file is rendered and staged in the output directory before any
    /// is moved into place; on failure no file of the bundle is left behind.
    pub fn generate(
        &self,
        run: &RunConfiguration,
        document: &CsvDocument,
        report: &ValidationReport,
    ) -> Result<HashMap<OutputFormat, PathBuf>, OutputError> {
        info!("Writing export bundle for run {} to {:?}", run.id, self.output_dir);

        std::fs::create_dir_all(&self.output_dir).map_err(|source| OutputError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let samplesheet = document.render(self.line_ending)?;
        let metadata = MetadataExport::new(run, document, &samplesheet);

        let mut contents = vec![
            (OutputFormat::SampleSheet, samplesheet),
            (OutputFormat::Metadata, serde_json::to_string_pretty(&metadata)?),
            (OutputFormat::Validation, serde_json::to_string_pretty(report)?),
        ];
        if SampleSheetV1Serializer::supports(run.instrument) {
            let v1 = SampleSheetV1Serializer::new().serialize(run)?;
            contents.push((OutputFormat::SampleSheetV1, v1.render(self.line_ending)?));
        }

        let staged = contents
            .into_iter()
            .map(|(format, text)| -> Result<_, OutputError> {
                let file = self.stage(&text)?;
                debug!("Staged {:?} ({}, {} bytes)", format, format.mime_type(), text.len());
                Ok((format, file))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut written: HashMap<OutputFormat, PathBuf> = HashMap::new();
        for (format, file) in staged {
            let path = self.path_for(run, format);
            if let Err(err) = file.persist(&path) {
                for done in written.values() {
                    if let Err(cleanup) = std::fs::remove_file(done) {
                        warn!("Could not remove {}: {}", done.display(), cleanup);
                    }
                }
                return Err(OutputError::Io {
                    path,
                    source: err.error,
                });
            }
            written.insert(format, path);
        }

        info!(
            "Export complete: sample sheet sha256 {}",
            metadata.samplesheet_sha256
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry;
    use crate::cycle_engine::annotate_run;
    use crate::models::IndexSequence;
    use crate::samplesheet::SampleSheetSerializer;
    use crate::validator::analyze_run;
    use tempfile::tempdir;

    fn sample_run() -> RunConfiguration {
        sample_run_on("NovaSeq X Series")
    }

    fn sample_run_on(instrument: &str) -> RunConfiguration {
        let mut run = RunConfiguration::new(
            chemistry::lookup(instrument).unwrap(),
            Flowcell {
                name: "10B".to_string(),
                lanes: 8,
            },
            400,
            RunCycles {
                read1: 151,
                read2: 151,
                index1: 10,
                index2: 10,
            },
        );
        run.run_name = Some("Run 001/A".to_string());
        for (id, i7, i5) in [("S1", "ATTACTCG", "TATAGCCT"), ("S2", "TCCGGAGA", "ATAGAGGC")] {
            let mut sample = Sample::new(id);
            sample.index.i7 = Some(IndexSequence::new(i7).unwrap());
            sample.index.i5 = Some(IndexSequence::new(i5).unwrap());
            run.samples.push(sample);
        }
        annotate_run(&mut run).unwrap();
        run
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::SampleSheet.extension(), "samplesheet.csv");
        assert_eq!(OutputFormat::SampleSheetV1.extension(), "samplesheet_v1.csv");
        assert_eq!(OutputFormat::Metadata.extension(), "metadata.json");
        assert_eq!(OutputFormat::Validation.extension(), "validation.json");
    }

    #[test]
    fn test_output_format_mime_type() {
        assert_eq!(OutputFormat::SampleSheet.mime_type(), "text/csv");
        assert_eq!(OutputFormat::Metadata.mime_type(), "application/json");
    }

    #[test]
    fn test_output_format_serde() {
        let json = serde_json::to_string(&OutputFormat::SampleSheet).unwrap();
        assert_eq!(json, "\"samplesheet\"");
    }

    #[test]
    fn test_file_stem_sanitized() {
        let mut run = sample_run();
        assert_eq!(file_stem(&run), "Run_001_A");
        run.run_name = None;
        assert_eq!(file_stem(&run), run.id.to_string());
    }

    #[test]
    fn test_metadata_mirrors_samplesheet() {
        let run = sample_run();
        let document = SampleSheetSerializer::default().serialize(&run).unwrap();
        let text = document.render(LineEnding::Lf).unwrap();
        let metadata = MetadataExport::new(&run, &document, &text);

        assert_eq!(metadata.run_id, run.id);
        assert_eq!(metadata.samplesheet_sha256, sha256_hex(text.as_bytes()));
        assert_eq!(metadata.samplesheet_sha256.len(), 64);
        // stored forward value, not the exported orientation
        assert_eq!(metadata.global_override_cycles.as_deref(), Some("Y151;I8N2;I8N2;Y151"));
        assert_eq!(metadata.samples[0].i7_length, 8);
        assert_eq!(metadata.sections.len(), document.sections.len());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["instrument"]["platform_name"], "NovaSeqXSeries");
        assert_eq!(json["sections"][0]["name"], "Header");
        assert_eq!(json["sections"][0]["type"], "key_value");
        assert_eq!(json["sections"][3]["type"], "table");
    }

    #[test]
    fn test_generate_writes_bundle() {
        let dir = tempdir().unwrap();
        let run = sample_run();
        let document = SampleSheetSerializer::default().serialize(&run).unwrap();
        let report = analyze_run(&run).unwrap();

        let generator = OutputGenerator::new(dir.path().join("exports"));
        let written = generator.generate(&run, &document, &report).unwrap();
        assert_eq!(written.len(), 3);

        let csv_path = &written[&OutputFormat::SampleSheet];
        assert!(csv_path.ends_with("Run_001_A.samplesheet.csv"));
        let csv_text = std::fs::read_to_string(csv_path).unwrap();
        assert!(csv_text.starts_with("[Header]\n"));

        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[&OutputFormat::Metadata]).unwrap()).unwrap();
        assert_eq!(metadata["samplesheet_sha256"], sha256_hex(csv_text.as_bytes()));

        let validation: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[&OutputFormat::Validation]).unwrap()).unwrap();
        assert_eq!(validation["run_id"], run.id.to_string());
    }

    #[test]
    fn test_generate_v1_for_supported_instrument() {
        let dir = tempdir().unwrap();
        let run = sample_run_on("NovaSeq 6000");
        let document = SampleSheetSerializer::default().serialize(&run).unwrap();
        let report = analyze_run(&run).unwrap();

        let written = OutputGenerator::new(dir.path()).generate(&run, &document, &report).unwrap();
        assert_eq!(written.len(), 4);

        let v1_text = std::fs::read_to_string(&written[&OutputFormat::SampleSheetV1]).unwrap();
        assert!(v1_text.starts_with("[Header]\nIEMFileVersion,4\n"));
        assert!(v1_text.contains("S1,S1,,ATTACTCG,AGGCTATA,\n"));

        let v2_text = std::fs::read_to_string(&written[&OutputFormat::SampleSheet]).unwrap();
        assert!(v2_text.contains("S1,ATTACTCG,TATAGCCT\n"));
    }

    #[test]
    fn test_failed_write_leaves_no_partial_bundle() {
        let dir = tempdir().unwrap();
        let run = sample_run();
        let document = SampleSheetSerializer::default().serialize(&run).unwrap();
        let report = analyze_run(&run).unwrap();

        let generator = OutputGenerator::new(dir.path());
        // a directory where the last file of the bundle should go
        let blocked = generator.path_for(&run, OutputFormat::Validation);
        std::fs::create_dir(&blocked).unwrap();

        assert!(matches!(
            generator.generate(&run, &document, &report),
            Err(OutputError::Io { .. })
        ));
        let entries: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![blocked]);
    }

    #[test]
    fn test_generate_crlf() {
        let dir = tempdir().unwrap();
        let run = sample_run();
        let document = SampleSheetSerializer::default().serialize(&run).unwrap();
        let report = analyze_run(&run).unwrap();

        let written = OutputGenerator::new(dir.path())
            .with_line_ending(LineEnding::CrLf)
            .generate(&run, &document, &report)
            .unwrap();
        let csv_text = std::fs::read_to_string(&written[&OutputFormat::SampleSheet]).unwrap();
        assert!(csv_text.starts_with("[Header]\r\n"));
    }
}
