// ==============================================================================
// models.rs - Sequencing Run Data Models
// ==============================================================================
// Description: Run, sample and index data structures shared by the cycle
//              engine, index analyzer and sample sheet serializer
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use crate::chemistry::{self, Chemistry, I5Orientation, Instrument};
use crate::override_cycles::{OverrideCycles, ReadSegment, Segment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Default barcode mismatch tolerance for both index reads
pub const DEFAULT_BARCODE_MISMATCHES: u8 = 1;

fn default_barcode_mismatches() -> u8 {
    DEFAULT_BARCODE_MISMATCHES
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("index sequence is empty")]
    EmptyIndex,

    #[error("invalid base '{base}' in index sequence '{sequence}' (expected A, C, G, T or N)")]
    InvalidIndexBase { sequence: String, base: char },
}

/// Configured cycles per read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCycles {
    pub read1: u32,
    pub read2: u32,
    pub index1: u32,
    pub index2: u32,
}

impl RunCycles {
    pub fn total_cycles(&self) -> u32 {
        self.read1
            .saturating_add(self.read2)
            .saturating_add(self.index1)
            .saturating_add(self.index2)
    }

    pub fn cycles(&self, read: ReadSegment) -> u32 {
        match read {
            ReadSegment::Read1 => self.read1,
            ReadSegment::Index1 => self.index1,
            ReadSegment::Index2 => self.index2,
            ReadSegment::Read2 => self.read2,
        }
    }
}

/// Index read type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Index 1 (i7)
    I7,
    /// Index 2 (i5)
    I5,
}

impl IndexType {
    pub const ALL: [IndexType; 2] = [IndexType::I7, IndexType::I5];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::I7 => "i7",
            IndexType::I5 => "i5",
        }
    }

    /// The index read this index is sequenced in
    pub fn read(&self) -> ReadSegment {
        match self {
            IndexType::I7 => ReadSegment::Index1,
            IndexType::I5 => ReadSegment::Index2,
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated index sequence: uppercase, non-empty, over {A,C,G,T,N}
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexSequence(String);

impl IndexSequence {
    pub fn new(sequence: &str) -> Result<Self, ModelError> {
        let normalized = sequence.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ModelError::EmptyIndex);
        }
        if let Some(base) = normalized.chars().find(|c| !matches!(c, 'A' | 'C' | 'G' | 'T' | 'N')) {
            return Err(ModelError::InvalidIndexBase {
                sequence: sequence.to_string(),
                base,
            });
        }
        Ok(IndexSequence(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bases(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept alongside `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reverse complement; `N` stays `N`
    pub fn reverse_complement(&self) -> IndexSequence {
        let complement = self
            .0
            .chars()
            .rev()
            .map(|base| match base {
                'A' => 'T',
                'C' => 'G',
                'G' => 'C',
                'T' => 'A',
                other => other,
            })
            .collect();
        IndexSequence(complement)
    }
}

impl TryFrom<String> for IndexSequence {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        IndexSequence::new(&value)
    }
}

impl From<IndexSequence> for String {
    fn from(value: IndexSequence) -> Self {
        value.0
    }
}

impl fmt::Display for IndexSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Indexes assigned to a sample, plus kit-provided cycle hints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAssignment {
    /// Index 1 sequence
    #[serde(default)]
    pub i7: Option<IndexSequence>,

    /// Index 2 sequence (None in single-index mode)
    #[serde(default)]
    pub i5: Option<IndexSequence>,

    /// Kit-provided effective i7 length, used instead of the sequence length
    #[serde(default)]
    pub index1_cycles: Option<u32>,

    /// Kit-provided effective i5 length
    #[serde(default)]
    pub index2_cycles: Option<u32>,

    /// Kit override pattern for the Index1 segment (e.g. `I8N2`)
    #[serde(default)]
    pub index1_pattern: Option<Segment>,

    /// Kit override pattern for the Index2 segment
    #[serde(default)]
    pub index2_pattern: Option<Segment>,

    /// Kit read pattern for Read1 (e.g. `U8Y*`)
    #[serde(default)]
    pub read1_pattern: Option<Segment>,

    /// Kit read pattern for Read2
    #[serde(default)]
    pub read2_pattern: Option<Segment>,
}

impl IndexAssignment {
    pub fn sequence(&self, index_type: IndexType) -> Option<&IndexSequence> {
        match index_type {
            IndexType::I7 => self.i7.as_ref(),
            IndexType::I5 => self.i5.as_ref(),
        }
    }

    /// Effective index length: kit-provided cycles, else physical length, else 0
    pub fn effective_length(&self, index_type: IndexType) -> u32 {
        let kit_cycles = match index_type {
            IndexType::I7 => self.index1_cycles,
            IndexType::I5 => self.index2_cycles,
        };
        kit_cycles
            .or_else(|| self.sequence(index_type).map(|seq| seq.len() as u32))
            .unwrap_or(0)
    }

    /// Kit-provided pattern for a read, if any
    pub fn pattern(&self, read: ReadSegment) -> Option<&Segment> {
        match read {
            ReadSegment::Read1 => self.read1_pattern.as_ref(),
            ReadSegment::Index1 => self.index1_pattern.as_ref(),
            ReadSegment::Index2 => self.index2_pattern.as_ref(),
            ReadSegment::Read2 => self.read2_pattern.as_ref(),
        }
    }

    pub fn is_dual(&self) -> bool {
        self.i7.is_some() && self.i5.is_some()
    }

    pub fn has_any(&self) -> bool {
        self.i7.is_some() || self.i5.is_some()
    }
}

/// A sample on the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample identifier, unique within the run
    pub sample_id: String,

    /// Assigned lanes (empty = all lanes)
    #[serde(default)]
    pub lanes: BTreeSet<u32>,

    #[serde(default = "default_barcode_mismatches")]
    pub barcode_mismatches_index1: u8,

    #[serde(default = "default_barcode_mismatches")]
    pub barcode_mismatches_index2: u8,

    #[serde(default)]
    pub index: IndexAssignment,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Caller-entered override cycles; bypasses computation when set
    #[serde(default)]
    pub manual_override_cycles: Option<String>,

    /// Override cycles in forward orientation (computed or manual)
    #[serde(default, skip_deserializing)]
    pub override_cycles: Option<OverrideCycles>,

    /// Resolved Index1 segment, for display
    #[serde(default, skip_deserializing)]
    pub index1_override_pattern: Option<String>,

    /// Resolved Index2 segment (forward orientation), for display
    #[serde(default, skip_deserializing)]
    pub index2_override_pattern: Option<String>,
}

impl Sample {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Sample {
            sample_id: sample_id.into(),
            lanes: BTreeSet::new(),
            barcode_mismatches_index1: DEFAULT_BARCODE_MISMATCHES,
            barcode_mismatches_index2: DEFAULT_BARCODE_MISMATCHES,
            index: IndexAssignment::default(),
            project: None,
            description: None,
            manual_override_cycles: None,
            override_cycles: None,
            index1_override_pattern: None,
            index2_override_pattern: None,
        }
    }

    pub fn sequence(&self, index_type: IndexType) -> Option<&IndexSequence> {
        self.index.sequence(index_type)
    }

    /// Index sequence in the base order the instrument reads it
    pub fn read_sequence(
        &self,
        index_type: IndexType,
        orientation: I5Orientation,
    ) -> Option<Cow<'_, IndexSequence>> {
        let sequence = self.sequence(index_type)?;
        match (index_type, orientation) {
            (IndexType::I5, I5Orientation::ReverseComplement) => Some(Cow::Owned(sequence.reverse_complement())),
            _ => Some(Cow::Borrowed(sequence)),
        }
    }

    /// Per-sample mismatch tolerance for an index type
    pub fn mismatch_threshold(&self, index_type: IndexType) -> u8 {
        match index_type {
            IndexType::I7 => self.barcode_mismatches_index1,
            IndexType::I5 => self.barcode_mismatches_index2,
        }
    }
}

/// Flowcell loaded on the instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flowcell {
    pub name: String,
    pub lanes: u32,
}

/// What a configured application does with the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    /// BCL Convert style demultiplexing (barcode mismatches, override cycles)
    Demultiplexing,
    /// Secondary analysis pipeline (e.g. DRAGEN)
    #[default]
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Extra Data column with a fixed value for every row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Application that gets a `[<name>_Settings]`/`[<name>_Data]` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationProfile {
    /// Section prefix, e.g. "BCLConvert" or "DragenGermline"
    pub name: String,

    #[serde(default)]
    pub kind: ApplicationKind,

    /// Written as `SoftwareVersion` when set
    #[serde(default)]
    pub software_version: Option<String>,

    /// Static settings, written in order
    #[serde(default)]
    pub settings: Vec<Setting>,

    #[serde(default)]
    pub data_columns: Vec<DataColumn>,

    /// Samples this application runs on (empty = all)
    #[serde(default)]
    pub sample_ids: Vec<String>,
}

impl ApplicationProfile {
    /// Default demultiplexing application
    pub fn bclconvert(software_version: Option<&str>) -> Self {
        ApplicationProfile {
            name: "BCLConvert".to_string(),
            kind: ApplicationKind::Demultiplexing,
            software_version: software_version.map(str::to_string),
            settings: vec![Setting {
                key: "FastqCompressionFormat".to_string(),
                value: "gzip".to_string(),
            }],
            data_columns: Vec::new(),
            sample_ids: Vec::new(),
        }
    }

    pub fn applies_to(&self, sample: &Sample) -> bool {
        self.sample_ids.is_empty() || self.sample_ids.iter().any(|id| id == &sample.sample_id)
    }
}

/// A fully materialized sequencing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Run UUID, written to the sample sheet and its JSON twin
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default)]
    pub run_name: Option<String>,

    #[serde(default)]
    pub run_description: Option<String>,

    /// Operator who set up the run (v1 `Investigator Name`)
    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chemistry::by_name")]
    pub instrument: &'static Instrument,

    pub flowcell: Flowcell,

    /// Reagent kit cycle capacity
    pub reagent_cycles: u32,

    pub run_cycles: RunCycles,

    /// Run-level default for `BarcodeMismatchesIndex1`
    #[serde(default = "default_barcode_mismatches")]
    pub barcode_mismatches_index1: u8,

    /// Run-level default for `BarcodeMismatchesIndex2`
    #[serde(default = "default_barcode_mismatches")]
    pub barcode_mismatches_index2: u8,

    /// Configured applications (empty = BCLConvert only)
    #[serde(default)]
    pub applications: Vec<ApplicationProfile>,

    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl RunConfiguration {
    pub fn new(
        instrument: &'static Instrument,
        flowcell: Flowcell,
        reagent_cycles: u32,
        run_cycles: RunCycles,
    ) -> Self {
        RunConfiguration {
            id: Uuid::new_v4(),
            run_name: None,
            run_description: None,
            created_by: None,
            created_at: Utc::now(),
            instrument,
            flowcell,
            reagent_cycles,
            run_cycles,
            barcode_mismatches_index1: DEFAULT_BARCODE_MISMATCHES,
            barcode_mismatches_index2: DEFAULT_BARCODE_MISMATCHES,
            applications: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn chemistry(&self) -> Chemistry {
        self.instrument.chemistry
    }

    pub fn i5_orientation(&self) -> I5Orientation {
        self.instrument.i5_orientation
    }

    pub fn lane_count(&self) -> u32 {
        self.flowcell.lanes
    }

    /// True when any sample declares explicit lanes
    pub fn has_explicit_lanes(&self) -> bool {
        self.samples.iter().any(|sample| !sample.lanes.is_empty())
    }

    /// Run-level mismatch default for an index type
    pub fn default_mismatches(&self, index_type: IndexType) -> u8 {
        match index_type {
            IndexType::I7 => self.barcode_mismatches_index1,
            IndexType::I5 => self.barcode_mismatches_index2,
        }
    }

    /// Configured applications, falling back to BCLConvert
    pub fn effective_applications(&self) -> Vec<ApplicationProfile> {
        if self.applications.is_empty() {
            vec![ApplicationProfile::bclconvert(self.instrument.bclconvert_version)]
        } else {
            self.applications.clone()
        }
    }

    /// Name used for exported files: run name, else run UUID
    pub fn display_name(&self) -> String {
        match self.run_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }
}
