// ==============================================================================
// samplesheet.rs - Illumina Sample Sheet v2 Serializer
// ==============================================================================
// Description: Builds the ordered sections of a v2 sample sheet from an
//              annotated run and renders them as CSV
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format:
//   [Header]              key,value
//   [Reads]               key,value
//   [<App>_Settings]      key,value      one pair per configured application
//   [<App>_Data]          table
//   [Cloud_Settings]      key,value      on by default
//   [Cloud_Data]          table          on by default
// Sections are separated by a blank line. Fields containing a comma, a
// double quote or a newline are quoted, with inner quotes doubled.
// ==============================================================================

use crate::cycle_engine::{oriented_for_export, OverrideCyclesMode};
use crate::models::{ApplicationKind, ApplicationProfile, IndexType, RunConfiguration, Sample, Setting};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const FILE_FORMAT_VERSION: &str = "2";

/// Version string written to `[Cloud_Settings]`
pub const CLOUD_GENERATED_VERSION: &str = "2.7.0";

/// Project name used in `[Cloud_Data]` when neither sample nor run has one
const DEFAULT_PROJECT_NAME: &str = "SeqSetup_Run";

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("run has no samples")]
    NoSamples,

    #[error("run has no Read 1 cycles configured")]
    ZeroReadCycles,

    #[error("required header field {0} is missing")]
    MissingHeaderField(&'static str),

    #[error("sample '{sample_id}' has no override cycles")]
    MissingOverrideCycles { sample_id: String },

    #[error("{instrument} does not accept a v1 sample sheet")]
    V1Unsupported { instrument: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("rendered sample sheet is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Line terminator used when rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    fn terminator(&self) -> Terminator {
        match self {
            LineEnding::Lf => Terminator::Any(b'\n'),
            LineEnding::CrLf => Terminator::CRLF,
        }
    }
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lf" | "unix" => Ok(LineEnding::Lf),
            "crlf" | "windows" => Ok(LineEnding::CrLf),
            other => Err(format!("unknown line ending '{}' (expected lf or crlf)", other)),
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Lf => f.write_str("lf"),
            LineEnding::CrLf => f.write_str("crlf"),
        }
    }
}

/// Content of a sample sheet section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionBody {
    /// One `key,value` row per entry
    KeyValue { entries: Vec<Setting> },
    /// Column header row followed by data rows
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// One bare value per row (v1 `[Reads]`)
    Values { values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvSection {
    pub name: String,
    #[serde(flatten)]
    pub body: SectionBody,
}

impl CsvSection {
    pub(crate) fn key_value(name: impl Into<String>, entries: Vec<Setting>) -> Self {
        Self {
            name: name.into(),
            body: SectionBody::KeyValue { entries },
        }
    }

    pub(crate) fn table(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            body: SectionBody::Table { columns, rows },
        }
    }

    pub(crate) fn values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            body: SectionBody::Values { values },
        }
    }

    /// Value of a key in a key/value section
    pub fn value(&self, key: &str) -> Option<&str> {
        match &self.body {
            SectionBody::KeyValue { entries } => entries
                .iter()
                .find(|entry| entry.key == key)
                .map(|entry| entry.value.as_str()),
            _ => None,
        }
    }

    pub fn columns(&self) -> &[String] {
        match &self.body {
            SectionBody::Table { columns, .. } => columns,
            _ => &[],
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        match &self.body {
            SectionBody::Table { rows, .. } => rows,
            _ => &[],
        }
    }

    /// All values of a table column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let position = self.columns().iter().position(|column| column == name)?;
        Some(
            self.rows()
                .iter()
                .map(|row| row.get(position).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Bare values of a value-list section
    pub fn list(&self) -> &[String] {
        match &self.body {
            SectionBody::Values { values } => values,
            _ => &[],
        }
    }

    fn records(&self) -> Vec<Vec<&str>> {
        match &self.body {
            SectionBody::KeyValue { entries } => entries
                .iter()
                .map(|entry| vec![entry.key.as_str(), entry.value.as_str()])
                .collect(),
            SectionBody::Table { columns, rows } => std::iter::once(columns)
                .chain(rows)
                .map(|row| row.iter().map(String::as_str).collect())
                .collect(),
            SectionBody::Values { values } => values.iter().map(|value| vec![value.as_str()]).collect(),
        }
    }
}

/// Ordered sample sheet sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvDocument {
    pub sections: Vec<CsvSection>,
}

impl CsvDocument {
    pub fn section(&self, name: &str) -> Option<&CsvSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Render as CSV text with consistent line endings
    pub fn render(&self, line_ending: LineEnding) -> Result<String, SerializationError> {
        let newline = line_ending.as_str();
        let mut output = String::new();

        for section in &self.sections {
            output.push('[');
            output.push_str(&section.name);
            output.push(']');
            output.push_str(newline);
            output.push_str(&render_records(&section.records(), line_ending)?);
            output.push_str(newline);
        }

        Ok(output)
    }
}

fn render_records(records: &[Vec<&str>], line_ending: LineEnding) -> Result<String, SerializationError> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(line_ending.terminator())
        .from_writer(Vec::new());

    for record in records {
        writer.write_record(record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Debug, Clone, Copy)]
pub struct SerializerOptions {
    /// Append `[Cloud_Settings]`/`[Cloud_Data]` (needed by Illumina Connected Software)
    pub cloud_sections: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self { cloud_sections: true }
    }
}

/// Builds sample sheet sections from an annotated run
pub struct SampleSheetSerializer {
    options: SerializerOptions,
}

impl SampleSheetSerializer {
    pub fn new(options: SerializerOptions) -> Self {
        Self { options }
    }

    /// Build the sample sheet for a run.
    ///
    /// The run must already carry override cycles for every sample when they
    /// differ between samples. Nothing is returned on failure.
    pub fn serialize(&self, run: &RunConfiguration) -> Result<CsvDocument, SerializationError> {
        if run.samples.is_empty() {
            return Err(SerializationError::NoSamples);
        }
        if run.run_cycles.read1 == 0 {
            return Err(SerializationError::ZeroReadCycles);
        }

        // Single decision shared by Settings and Data
        let mode = OverrideCyclesMode::for_samples(&run.samples);
        if mode.is_per_sample() {
            if let Some(sample) = run.samples.iter().find(|s| s.override_cycles.is_none()) {
                return Err(SerializationError::MissingOverrideCycles {
                    sample_id: sample.sample_id.clone(),
                });
            }
        }

        let mut sections = vec![header_section(run)?, reads_section(run)];
        for application in run.effective_applications() {
            sections.push(settings_section(run, &application, &mode));
            sections.push(data_section(run, &application, &mode));
        }
        if self.options.cloud_sections {
            sections.extend(cloud_sections(run));
        }

        debug!(
            "Serialized run {} into {} sections ({})",
            run.id,
            sections.len(),
            if mode.is_per_sample() { "per-sample override cycles" } else { "global override cycles" }
        );
        Ok(CsvDocument { sections })
    }
}

impl Default for SampleSheetSerializer {
    fn default() -> Self {
        Self::new(SerializerOptions::default())
    }
}

pub(crate) fn setting(key: &str, value: impl Into<String>) -> Setting {
    Setting {
        key: key.to_string(),
        value: value.into(),
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn header_section(run: &RunConfiguration) -> Result<CsvSection, SerializationError> {
    let platform = non_empty(Some(run.instrument.platform_name))
        .ok_or(SerializationError::MissingHeaderField("InstrumentPlatform"))?;

    let mut entries = vec![setting("FileFormatVersion", FILE_FORMAT_VERSION)];
    if let Some(name) = non_empty(run.run_name.as_deref()) {
        entries.push(setting("RunName", name));
    }
    if let Some(description) = non_empty(run.run_description.as_deref()) {
        entries.push(setting("RunDescription", description));
    }
    entries.push(setting("InstrumentPlatform", platform));
    // index sequences are written as stored
    entries.push(setting("IndexOrientation", "Forward"));
    entries.push(setting("Custom_UUID", run.id.to_string()));

    Ok(CsvSection::key_value("Header", entries))
}

fn reads_section(run: &RunConfiguration) -> CsvSection {
    let cycles = run.run_cycles;
    CsvSection::key_value(
        "Reads",
        vec![
            setting("Read1Cycles", cycles.read1.to_string()),
            setting("Read2Cycles", cycles.read2.to_string()),
            setting("Index1Cycles", cycles.index1.to_string()),
            setting("Index2Cycles", cycles.index2.to_string()),
        ],
    )
}

fn settings_section(run: &RunConfiguration, application: &ApplicationProfile, mode: &OverrideCyclesMode) -> CsvSection {
    let mut entries = Vec::new();
    if let Some(version) = non_empty(application.software_version.as_deref()) {
        entries.push(setting("SoftwareVersion", version));
    }
    entries.extend(application.settings.iter().cloned());

    if application.kind == ApplicationKind::Demultiplexing {
        entries.push(setting(
            "BarcodeMismatchesIndex1",
            run.barcode_mismatches_index1.to_string(),
        ));
        entries.push(setting(
            "BarcodeMismatchesIndex2",
            run.barcode_mismatches_index2.to_string(),
        ));
        if let OverrideCyclesMode::Uniform(global) = mode {
            entries.push(setting(
                "OverrideCycles",
                oriented_for_export(global, run.i5_orientation()).to_string(),
            ));
        }
    }

    CsvSection::key_value(format!("{}_Settings", application.name), entries)
}

/// (lane, sample) rows for a set of samples.
///
/// Samples without lanes are expanded over every explicitly used lane, or
/// get a single lane-less row when the run uses no explicit lanes.
pub(crate) fn lane_rows<'a>(run: &RunConfiguration, samples: &[&'a Sample]) -> Vec<(Option<u32>, &'a Sample)> {
    let used_lanes: BTreeSet<u32> = run.samples.iter().flat_map(|s| s.lanes.iter().copied()).collect();

    let mut rows = Vec::new();
    for &sample in samples {
        if !sample.lanes.is_empty() {
            rows.extend(sample.lanes.iter().map(|&lane| (Some(lane), sample)));
        } else if !used_lanes.is_empty() {
            rows.extend(used_lanes.iter().map(|&lane| (Some(lane), sample)));
        } else {
            rows.push((None, sample));
        }
    }
    rows
}

fn data_section(run: &RunConfiguration, application: &ApplicationProfile, mode: &OverrideCyclesMode) -> CsvSection {
    let samples: Vec<&Sample> = run.samples.iter().filter(|s| application.applies_to(s)).collect();
    let has_lanes = run.has_explicit_lanes();
    let demultiplexing = application.kind == ApplicationKind::Demultiplexing;
    let per_sample_override = demultiplexing && mode.is_per_sample();
    let custom_mismatches = demultiplexing
        && run.samples.iter().any(|s| {
            IndexType::ALL
                .iter()
                .any(|&t| s.mismatch_threshold(t) != run.default_mismatches(t))
        });

    let mut columns = Vec::new();
    if has_lanes {
        columns.push("Lane".to_string());
    }
    columns.push("Sample_ID".to_string());
    if demultiplexing {
        columns.push("Index".to_string());
        columns.push("Index2".to_string());
    }
    if per_sample_override {
        columns.push("OverrideCycles".to_string());
    }
    if custom_mismatches {
        columns.push("BarcodeMismatchesIndex1".to_string());
        columns.push("BarcodeMismatchesIndex2".to_string());
    }
    columns.extend(application.data_columns.iter().map(|c| c.name.clone()));

    let orientation = run.i5_orientation();
    let rows = lane_rows(run, &samples)
        .into_iter()
        .map(|(lane, sample)| {
            let mut row = Vec::with_capacity(columns.len());
            if has_lanes {
                row.push(lane.map(|l| l.to_string()).unwrap_or_default());
            }
            row.push(sample.sample_id.clone());
            if demultiplexing {
                for index_type in IndexType::ALL {
                    row.push(sample.sequence(index_type).map(|s| s.to_string()).unwrap_or_default());
                }
            }
            if per_sample_override {
                row.push(
                    sample
                        .override_cycles
                        .as_ref()
                        .map(|oc| oriented_for_export(oc, orientation).to_string())
                        .unwrap_or_default(),
                );
            }
            if custom_mismatches {
                row.push(sample.barcode_mismatches_index1.to_string());
                row.push(sample.barcode_mismatches_index2.to_string());
            }
            row.extend(application.data_columns.iter().map(|c| c.value.clone()));
            row
        })
        .collect();

    CsvSection::table(format!("{}_Data", application.name), columns, rows)
}

fn cloud_sections(run: &RunConfiguration) -> [CsvSection; 2] {
    let run_project = non_empty(run.run_name.as_deref()).unwrap_or(DEFAULT_PROJECT_NAME);

    let rows = run
        .samples
        .iter()
        .map(|sample| {
            let project = non_empty(sample.project.as_deref()).unwrap_or(run_project);
            let library = match (sample.sequence(IndexType::I7), sample.sequence(IndexType::I5)) {
                (Some(i7), Some(i5)) => format!("{}_{}_{}", sample.sample_id, i7, i5),
                _ => sample.sample_id.clone(),
            };
            vec![sample.sample_id.clone(), project.to_string(), library]
        })
        .collect();

    [
        CsvSection::key_value(
            "Cloud_Settings",
            vec![setting("GeneratedVersion", CLOUD_GENERATED_VERSION)],
        ),
        CsvSection::table(
            "Cloud_Data",
            vec![
                "Sample_ID".to_string(),
                "ProjectName".to_string(),
                "LibraryName".to_string(),
            ],
            rows,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry;
    use crate::cycle_engine::annotate_run;
    use crate::models::{DataColumn, Flowcell, IndexSequence, RunCycles};

    fn run_on(instrument: &str, samples: Vec<Sample>) -> RunConfiguration {
        let mut run = RunConfiguration::new(
            chemistry::lookup(instrument).unwrap(),
            Flowcell {
                name: "test".to_string(),
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
        run.samples = samples;
        annotate_run(&mut run).unwrap();
        run
    }

    fn sample(id: &str, i7: &str, i5: &str, lanes: &[u32]) -> Sample {
        let mut sample = Sample::new(id);
        sample.index.i7 = Some(IndexSequence::new(i7).unwrap());
        sample.index.i5 = Some(IndexSequence::new(i5).unwrap());
        sample.lanes = lanes.iter().copied().collect();
        sample
    }

    fn serialize(run: &RunConfiguration) -> CsvDocument {
        SampleSheetSerializer::default().serialize(run).unwrap()
    }

    #[test]
    fn test_header_and_reads() {
        let mut run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        run.run_name = Some("Run_001".to_string());
        let doc = serialize(&run);

        let header = doc.section("Header").unwrap();
        assert_eq!(header.value("FileFormatVersion"), Some("2"));
        assert_eq!(header.value("RunName"), Some("Run_001"));
        assert_eq!(header.value("RunDescription"), None);
        assert_eq!(header.value("InstrumentPlatform"), Some("NovaSeqXSeries"));
        assert_eq!(header.value("IndexOrientation"), Some("Forward"));
        assert_eq!(header.value("Custom_UUID"), Some(run.id.to_string().as_str()));

        let reads = doc.section("Reads").unwrap();
        assert_eq!(reads.value("Read1Cycles"), Some("151"));
        assert_eq!(reads.value("Index2Cycles"), Some("10"));

        let names: Vec<&str> = doc.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Header", "Reads", "BCLConvert_Settings", "BCLConvert_Data", "Cloud_Settings", "Cloud_Data"]
        );
    }

    #[test]
    fn test_global_override_forward_instrument() {
        let run = run_on("MiSeq i100 Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        let doc = serialize(&run);

        let settings = doc.section("BCLConvert_Settings").unwrap();
        assert_eq!(settings.value("OverrideCycles"), Some("Y151;I8N2;I8N2;Y151"));
        assert_eq!(settings.value("BarcodeMismatchesIndex1"), Some("1"));

        let data = doc.section("BCLConvert_Data").unwrap();
        assert_eq!(data.columns(), &["Sample_ID", "Index", "Index2"]);
    }

    #[test]
    fn test_reverse_complement_instrument_reverses_index2_segment() {
        let run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        let doc = serialize(&run);

        let settings = doc.section("BCLConvert_Settings").unwrap();
        assert_eq!(settings.value("OverrideCycles"), Some("Y151;I8N2;N2I8;Y151"));
        // stored value and sequences stay forward
        assert_eq!(
            run.samples[0].override_cycles.as_ref().unwrap().to_string(),
            "Y151;I8N2;I8N2;Y151"
        );
        let data = doc.section("BCLConvert_Data").unwrap();
        assert_eq!(data.column("Index2").unwrap(), vec!["TATAGCCT"]);
    }

    #[test]
    fn test_per_sample_override_cycles() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ATTACTCG", "TATAGCCT", &[]),
                sample("S2", "ATTACTCGAC", "TATAGCCTAC", &[]),
            ],
        );
        let doc = serialize(&run);

        let settings = doc.section("BCLConvert_Settings").unwrap();
        assert_eq!(settings.value("OverrideCycles"), None);

        let data = doc.section("BCLConvert_Data").unwrap();
        assert_eq!(
            data.column("OverrideCycles").unwrap(),
            vec!["Y151;I8N2;N2I8;Y151", "Y151;I10;I10;Y151"]
        );
    }

    #[test]
    fn test_missing_override_cycles_fails() {
        let mut run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ATTACTCG", "TATAGCCT", &[]),
                sample("S2", "ATTACTCGAC", "TATAGCCTAC", &[]),
            ],
        );
        run.samples[1].override_cycles = None;
        let err = SampleSheetSerializer::default().serialize(&run).unwrap_err();
        assert!(matches!(err, SerializationError::MissingOverrideCycles { ref sample_id } if sample_id == "S2"));
    }

    #[test]
    fn test_structural_preconditions() {
        let mut run = run_on("NovaSeq X Series", vec![]);
        assert!(matches!(
            SampleSheetSerializer::default().serialize(&run),
            Err(SerializationError::NoSamples)
        ));

        run.samples.push(sample("S1", "ATTACTCG", "TATAGCCT", &[]));
        run.run_cycles.read1 = 0;
        assert!(matches!(
            SampleSheetSerializer::default().serialize(&run),
            Err(SerializationError::ZeroReadCycles)
        ));
    }

    #[test]
    fn test_lane_expansion() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ATTACTCG", "TATAGCCT", &[1, 2]),
                sample("S2", "GGCTACAG", "CCTATCCT", &[3]),
                sample("S3", "TCCGCGAA", "GGCTCTGA", &[]),
            ],
        );
        let doc = serialize(&run);
        let data = doc.section("BCLConvert_Data").unwrap();

        assert_eq!(data.columns()[0], "Lane");
        assert_eq!(data.column("Lane").unwrap(), vec!["1", "2", "3", "1", "2", "3"]);
        assert_eq!(data.column("Sample_ID").unwrap(), vec!["S1", "S1", "S2", "S3", "S3", "S3"]);
    }

    #[test]
    fn test_no_lanes_gives_single_row_per_sample() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ATTACTCG", "TATAGCCT", &[]),
                sample("S2", "GGCTACAG", "CCTATCCT", &[]),
            ],
        );
        let doc = serialize(&run);
        let data = doc.section("BCLConvert_Data").unwrap();
        assert!(data.column("Lane").is_none());
        assert_eq!(data.rows().len(), 2);
    }

    #[test]
    fn test_mismatch_columns_only_when_customised() {
        let mut s2 = sample("S2", "GGCTACAG", "CCTATCCT", &[]);
        s2.barcode_mismatches_index2 = 0;
        let run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[]), s2]);
        let doc = serialize(&run);
        let data = doc.section("BCLConvert_Data").unwrap();

        assert_eq!(data.column("BarcodeMismatchesIndex1").unwrap(), vec!["1", "1"]);
        assert_eq!(data.column("BarcodeMismatchesIndex2").unwrap(), vec!["1", "0"]);
    }

    #[test]
    fn test_analysis_application_sections() {
        let mut run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ATTACTCG", "TATAGCCT", &[1]),
                sample("S2", "GGCTACAG", "CCTATCCT", &[1]),
            ],
        );
        run.applications = vec![
            ApplicationProfile::bclconvert(Some("4.3.6")),
            ApplicationProfile {
                name: "DragenGermline".to_string(),
                kind: ApplicationKind::Analysis,
                software_version: Some("4.3.6".to_string()),
                settings: vec![setting("MapAlignOutFormat", "cram")],
                data_columns: vec![DataColumn {
                    name: "ReferenceGenomeDir".to_string(),
                    value: "hg38-alt_masked.cnv.graph.hla.rna-10-r4.0-1".to_string(),
                }],
                sample_ids: vec!["S2".to_string()],
            },
        ];
        let doc = serialize(&run);

        let settings = doc.section("DragenGermline_Settings").unwrap();
        assert_eq!(settings.value("MapAlignOutFormat"), Some("cram"));
        assert_eq!(settings.value("OverrideCycles"), None);

        let data = doc.section("DragenGermline_Data").unwrap();
        assert_eq!(data.columns(), &["Lane", "Sample_ID", "ReferenceGenomeDir"]);
        assert_eq!(data.rows().len(), 1);
        assert_eq!(data.rows()[0][1], "S2");
    }

    #[test]
    fn test_cloud_sections() {
        let mut single = Sample::new("S2");
        single.index.i7 = Some(IndexSequence::new("GGCTACAG").unwrap());
        single.project = Some("ProjA".to_string());
        let mut run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[]), single]);
        run.run_name = Some("Run_001".to_string());

        let doc = SampleSheetSerializer::new(SerializerOptions { cloud_sections: true })
            .serialize(&run)
            .unwrap();
        assert_eq!(doc.section("Cloud_Settings").unwrap().value("GeneratedVersion"), Some("2.7.0"));

        let cloud = doc.section("Cloud_Data").unwrap();
        assert_eq!(cloud.column("ProjectName").unwrap(), vec!["Run_001", "ProjA"]);
        assert_eq!(cloud.column("LibraryName").unwrap(), vec!["S1_ATTACTCG_TATAGCCT", "S2"]);
    }

    #[test]
    fn test_cloud_sections_can_be_disabled() {
        let run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        let doc = SampleSheetSerializer::new(SerializerOptions { cloud_sections: false })
            .serialize(&run)
            .unwrap();
        assert!(doc.section("Cloud_Settings").is_none());
        assert!(doc.section("Cloud_Data").is_none());
        assert!(SerializerOptions::default().cloud_sections);
    }

    #[test]
    fn test_render() {
        let mut run = run_on("MiSeq i100 Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        run.run_name = Some("Run_001".to_string());
        let text = serialize(&run).render(LineEnding::Lf).unwrap();

        let expected = format!(
            "[Header]\nFileFormatVersion,2\nRunName,Run_001\nInstrumentPlatform,MiSeqi100Series\n\
             IndexOrientation,Forward\nCustom_UUID,{}\n\n\
             [Reads]\nRead1Cycles,151\nRead2Cycles,151\nIndex1Cycles,10\nIndex2Cycles,10\n\n\
             [BCLConvert_Settings]\nSoftwareVersion,4.3.13\nFastqCompressionFormat,gzip\n\
             BarcodeMismatchesIndex1,1\nBarcodeMismatchesIndex2,1\nOverrideCycles,Y151;I8N2;I8N2;Y151\n\n\
             [BCLConvert_Data]\nSample_ID,Index,Index2\nS1,ATTACTCG,TATAGCCT\n\n\
             [Cloud_Settings]\nGeneratedVersion,2.7.0\n\n\
             [Cloud_Data]\nSample_ID,ProjectName,LibraryName\nS1,Run_001,S1_ATTACTCG_TATAGCCT\n\n",
            run.id
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_crlf_is_consistent() {
        let run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        let text = serialize(&run).render(LineEnding::CrLf).unwrap();
        assert!(text.contains("[Header]\r\n"));
        assert_eq!(text.matches('\n').count(), text.matches("\r\n").count());
    }

    #[test]
    fn test_render_escapes_fields() {
        let mut run = run_on("NovaSeq X Series", vec![sample("S1", "ATTACTCG", "TATAGCCT", &[])]);
        run.run_name = Some("Run, \"special\"".to_string());
        run.run_description = Some("line one\nline two".to_string());
        let text = serialize(&run).render(LineEnding::Lf).unwrap();

        assert!(text.contains("RunName,\"Run, \"\"special\"\"\"\n"));
        assert!(text.contains("RunDescription,\"line one\nline two\"\n"));
        assert!(text.contains("FileFormatVersion,2\n"));
    }

    #[test]
    fn test_line_ending_from_str() {
        assert_eq!("crlf".parse::<LineEnding>(), Ok(LineEnding::CrLf));
        assert_eq!("LF".parse::<LineEnding>(), Ok(LineEnding::Lf));
        assert!("cr".parse::<LineEnding>().is_err());
    }
}
