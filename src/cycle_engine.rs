// ==============================================================================
// cycle_engine.rs - Run Cycle and Override Cycles Computation
// ==============================================================================
// Description: Resolves run cycles against the reagent kit, derives each
//              sample's OverrideCycles and decides global vs per-sample emission
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Algorithm (per index read, L = effective index length, C = read cycles):
//   kit pattern present -> pattern, wildcard resolved
//   L == 0              -> N<C>
//   L >= C              -> I<C>
//   L <  C              -> I<L>N<C-L>
// Override cycles are stored in forward orientation. The Index2 segment is
// reversed only when writing for a reverse-complement i5 instrument.
// ==============================================================================

use crate::chemistry::I5Orientation;
use crate::models::{IndexType, RunConfiguration, RunCycles, Sample};
use crate::override_cycles::{OverrideCycles, OverrideCyclesError, ReadSegment, Segment, Token, TokenKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Default cycles for each index read when the caller does not ask for any
pub const DEFAULT_INDEX_CYCLES: u32 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("total cycles ({total}) exceed reagent kit capacity ({capacity})")]
    CapacityExceeded { total: u32, capacity: u32 },

    #[error("Read 1 cycles must be positive")]
    NoReadCycles,

    #[error("invalid override cycles for sample '{sample_id}': {source}")]
    InvalidOverrideCycles {
        sample_id: String,
        source: OverrideCyclesError,
    },
}

/// Requested cycles; unset reads take the reagent kit default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRequest {
    #[serde(default)]
    pub read1: Option<u32>,
    #[serde(default)]
    pub read2: Option<u32>,
    #[serde(default)]
    pub index1: Option<u32>,
    #[serde(default)]
    pub index2: Option<u32>,
}

/// Whether override cycles go into Settings once or into every Data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideCyclesMode {
    /// Every sample shares this value (forward orientation)
    Uniform(OverrideCycles),
    PerSample,
}

impl OverrideCyclesMode {
    pub fn for_samples(samples: &[Sample]) -> Self {
        match infer_global_override_cycles(samples) {
            Some(global) => OverrideCyclesMode::Uniform(global),
            None => OverrideCyclesMode::PerSample,
        }
    }

    pub fn is_per_sample(&self) -> bool {
        matches!(self, OverrideCyclesMode::PerSample)
    }
}

/// Resolve run cycles from a reagent kit capacity and optional requests.
///
/// Index reads default to 10 cycles each; unset reads split the remaining
/// capacity, Read1 taking the odd cycle.
///
/// # Arguments
/// * `capacity` - Reagent kit cycle capacity
/// * `requested` - Explicitly requested cycles
///
/// # Returns
/// Validated RunCycles, or CapacityExceeded
pub fn resolve_run_cycles(capacity: u32, requested: &CycleRequest) -> Result<RunCycles, CycleError> {
    let index1 = requested.index1.unwrap_or(DEFAULT_INDEX_CYCLES);
    let index2 = requested.index2.unwrap_or(DEFAULT_INDEX_CYCLES);
    let remaining = capacity.saturating_sub(index1.saturating_add(index2));

    let (read1, read2) = match (requested.read1, requested.read2) {
        (Some(read1), Some(read2)) => (read1, read2),
        (Some(read1), None) => (read1, remaining.saturating_sub(read1)),
        (None, Some(read2)) => (remaining.saturating_sub(read2), read2),
        (None, None) => (remaining - remaining / 2, remaining / 2),
    };

    let cycles = RunCycles {
        read1,
        read2,
        index1,
        index2,
    };
    validate_cycles(&cycles, capacity)?;

    debug!(
        "Resolved run cycles for {}-cycle kit: {}/{}/{}/{}",
        capacity, read1, index1, index2, read2
    );
    Ok(cycles)
}

/// Check run cycles against the reagent kit. Required before any export.
pub fn validate_cycles(run_cycles: &RunCycles, capacity: u32) -> Result<(), CycleError> {
    let total = run_cycles.total_cycles();
    if total > capacity {
        return Err(CycleError::CapacityExceeded { total, capacity });
    }
    if run_cycles.read1 == 0 {
        return Err(CycleError::NoReadCycles);
    }
    Ok(())
}

/// Segment for an index read derived from index geometry
fn index_segment(index_length: u32, cycles: u32) -> Result<Segment, OverrideCyclesError> {
    let tokens = if index_length == 0 {
        vec![Token::fixed(TokenKind::Mask, cycles)]
    } else if index_length >= cycles {
        vec![Token::fixed(TokenKind::Index, cycles)]
    } else {
        vec![
            Token::fixed(TokenKind::Index, index_length),
            Token::fixed(TokenKind::Mask, cycles - index_length),
        ]
    };
    Segment::new(tokens)
}

fn derive_segment(sample: &Sample, read: ReadSegment, cycles: u32) -> Result<Segment, OverrideCyclesError> {
    if let Some(pattern) = sample.index.pattern(read) {
        return pattern.resolve(read, cycles);
    }
    match read {
        ReadSegment::Read1 | ReadSegment::Read2 => Segment::single(TokenKind::Read, cycles),
        ReadSegment::Index1 => index_segment(sample.index.effective_length(IndexType::I7), cycles),
        ReadSegment::Index2 => index_segment(sample.index.effective_length(IndexType::I5), cycles),
    }
}

/// Compute a sample's override cycles in forward orientation.
///
/// Reads with zero configured cycles get no segment. Kit patterns take
/// precedence over geometry.
pub fn compute_sample_override_cycles(
    sample: &Sample,
    run_cycles: &RunCycles,
) -> Result<OverrideCycles, CycleError> {
    let mut computed = OverrideCycles::new(None, None, None, None);

    for read in ReadSegment::ALL {
        let cycles = run_cycles.cycles(read);
        if cycles == 0 {
            continue;
        }
        let segment = derive_segment(sample, read, cycles).map_err(|source| CycleError::InvalidOverrideCycles {
            sample_id: sample.sample_id.clone(),
            source,
        })?;
        computed = computed.with_segment(read, Some(segment));
    }

    debug!("Sample {}: OverrideCycles {}", sample.sample_id, computed);
    Ok(computed)
}

fn store_override_cycles(sample: &mut Sample, override_cycles: OverrideCycles) {
    sample.index1_override_pattern = override_cycles
        .segment(ReadSegment::Index1)
        .map(|segment| segment.to_string());
    sample.index2_override_pattern = override_cycles
        .segment(ReadSegment::Index2)
        .map(|segment| segment.to_string());
    sample.override_cycles = Some(override_cycles);
}

/// Compute and store override cycles (and display patterns) on a sample
pub fn annotate_sample(sample: &mut Sample, run_cycles: &RunCycles) -> Result<(), CycleError> {
    let override_cycles = compute_sample_override_cycles(sample, run_cycles)?;
    store_override_cycles(sample, override_cycles);
    Ok(())
}

/// Replace a sample's override cycles with a caller-entered string.
///
/// The string must match the run's read structure. On failure the sample
/// keeps its previous value.
pub fn apply_manual_override(sample: &mut Sample, text: &str, run_cycles: &RunCycles) -> Result<(), CycleError> {
    let parsed = OverrideCycles::parse(text, run_cycles).map_err(|source| CycleError::InvalidOverrideCycles {
        sample_id: sample.sample_id.clone(),
        source,
    })?;

    sample.manual_override_cycles = Some(text.trim().to_string());
    store_override_cycles(sample, parsed);
    Ok(())
}

/// Annotate every sample of a run.
///
/// Samples with a manual override keep it (re-checked against the current
/// run cycles); all others are computed. Nothing is stored unless every
/// sample succeeds.
pub fn annotate_run(run: &mut RunConfiguration) -> Result<(), CycleError> {
    let run_cycles = run.run_cycles;

    let mut computed = Vec::with_capacity(run.samples.len());
    for sample in &run.samples {
        let override_cycles = match &sample.manual_override_cycles {
            Some(text) => OverrideCycles::parse(text, &run_cycles).map_err(|source| {
                CycleError::InvalidOverrideCycles {
                    sample_id: sample.sample_id.clone(),
                    source,
                }
            })?,
            None => compute_sample_override_cycles(sample, &run_cycles)?,
        };
        computed.push(override_cycles);
    }

    for (sample, override_cycles) in run.samples.iter_mut().zip(computed) {
        store_override_cycles(sample, override_cycles);
    }

    match infer_global_override_cycles(&run.samples) {
        Some(global) => info!("Override cycles uniform across {} samples: {}", run.samples.len(), global),
        None => info!("Override cycles differ between samples, emitting per sample"),
    }
    Ok(())
}

/// Common override cycles of all samples.
///
/// Returns `None` when there are no samples, any two samples differ, or any
/// sample has no override cycles.
pub fn infer_global_override_cycles(samples: &[Sample]) -> Option<OverrideCycles> {
    let mut values = samples.iter().map(|sample| sample.override_cycles.as_ref());
    let first = values.next()??;
    if values.all(|value| value == Some(first)) {
        Some(first.clone())
    } else {
        None
    }
}

/// Reverse the token order of a single segment string (`I8N2` -> `N2I8`).
///
/// Only resolved segments can be reversed; a wildcard would end up in a
/// position the grammar does not allow.
pub fn segment_for_reverse_complement(segment: &str) -> Result<String, OverrideCyclesError> {
    let parsed: Segment = segment.parse()?;
    if parsed.has_wildcard() {
        return Err(OverrideCyclesError::WildcardNotReversible {
            segment: segment.trim().to_string(),
        });
    }
    Ok(parsed.reversed().to_string())
}

/// Override cycles as the instrument expects them in the sample sheet
pub fn oriented_for_export(override_cycles: &OverrideCycles, orientation: I5Orientation) -> OverrideCycles {
    match (orientation, override_cycles.segment(ReadSegment::Index2)) {
        (I5Orientation::ReverseComplement, Some(index2)) => {
            override_cycles.with_segment(ReadSegment::Index2, Some(index2.reversed()))
        }
        _ => override_cycles.clone(),
    }
}
