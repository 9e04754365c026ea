// ==============================================================================
// collisions.rs - Lane Grouping, Index Collisions and Distance Matrices
// ==============================================================================
// Description: Pairwise Hamming distances between indexes sharing a lane
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Collision rule (per lane, per index type, per unordered sample pair):
//   distance  = Hamming distance over the shorter of the two sequences
//   threshold = max(mismatches_a, mismatches_b)
//   collision when distance <= threshold
// ==============================================================================

use crate::models::{IndexType, RunConfiguration, Sample};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("sample '{sample_id}' is assigned to lane {lane} but the flowcell has {lane_count} lanes")]
    LaneOutOfRange {
        sample_id: String,
        lane: u32,
        lane_count: u32,
    },
}

/// Samples sharing each analysed lane, in run order
pub type LaneGroups<'a> = BTreeMap<u32, Vec<&'a Sample>>;

/// Group samples by effective lane.
///
/// The lanes analysed are those any sample is explicitly assigned to; a
/// sample without lanes joins every one of them. When no sample names a lane,
/// every lane of the flowcell is analysed.
pub fn group_samples_by_lane(run: &RunConfiguration) -> Result<LaneGroups<'_>, AnalysisError> {
    let lane_count = run.lane_count();

    let mut explicit = BTreeSet::new();
    for sample in &run.samples {
        for &lane in &sample.lanes {
            if lane == 0 || lane > lane_count {
                return Err(AnalysisError::LaneOutOfRange {
                    sample_id: sample.sample_id.clone(),
                    lane,
                    lane_count,
                });
            }
            explicit.insert(lane);
        }
    }

    let lanes: Vec<u32> = if explicit.is_empty() {
        (1..=lane_count).collect()
    } else {
        explicit.into_iter().collect()
    };

    Ok(lanes
        .into_iter()
        .map(|lane| {
            let members = run
                .samples
                .iter()
                .filter(|sample| sample.lanes.is_empty() || sample.lanes.contains(&lane))
                .collect();
            (lane, members)
        })
        .collect())
}

/// Hamming distance over the length of the shorter sequence
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).filter(|(x, y)| x != y).count() as u32
}

/// Two samples whose indexes are within mismatch tolerance of each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexCollision {
    pub sample_a: String,
    pub sample_b: String,
    pub lane: u32,
    pub index_type: IndexType,
    pub sequence_a: String,
    pub sequence_b: String,
    pub hamming_distance: u32,
    pub threshold: u8,
}

impl IndexCollision {
    /// True for this pair in either order
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sample_a == a && self.sample_b == b) || (self.sample_a == b && self.sample_b == a)
    }
}

/// Find the collision for a pair in a lane, regardless of argument order
pub fn find_collision<'a>(
    collisions: &'a [IndexCollision],
    lane: u32,
    index_type: IndexType,
    a: &str,
    b: &str,
) -> Option<&'a IndexCollision> {
    collisions
        .iter()
        .find(|c| c.lane == lane && c.index_type == index_type && c.is_between(a, b))
}

/// All collisions, ordered by lane, then index type, then sample order
pub fn find_collisions(lanes: &LaneGroups<'_>) -> Vec<IndexCollision> {
    let mut collisions = Vec::new();

    for (&lane, samples) in lanes {
        for index_type in IndexType::ALL {
            let indexed: Vec<_> = samples
                .iter()
                .filter_map(|sample| sample.sequence(index_type).map(|seq| (*sample, seq)))
                .collect();

            for (i, (sample_a, seq_a)) in indexed.iter().enumerate() {
                for (sample_b, seq_b) in &indexed[i + 1..] {
                    let distance = hamming_distance(seq_a.bases(), seq_b.bases());
                    let threshold = sample_a
                        .mismatch_threshold(index_type)
                        .max(sample_b.mismatch_threshold(index_type));

                    if distance <= u32::from(threshold) {
                        collisions.push(IndexCollision {
                            sample_a: sample_a.sample_id.clone(),
                            sample_b: sample_b.sample_id.clone(),
                            lane,
                            index_type,
                            sequence_a: seq_a.to_string(),
                            sequence_b: seq_b.to_string(),
                            hamming_distance: distance,
                            threshold,
                        });
                    }
                }
            }
        }
    }

    collisions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceKind {
    I7,
    I5,
    /// i7 + i5 when both samples carry both, else the single shared type
    Combined,
}

/// Symmetric pairwise distances for one lane. Diagonal entries are `None`,
/// as are pairs that share no index of the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistanceMatrix {
    pub lane: u32,
    pub sample_ids: Vec<String>,
    pub i7: Vec<Vec<Option<u32>>>,
    pub i5: Vec<Vec<Option<u32>>>,
    pub combined: Vec<Vec<Option<u32>>>,
}

impl DistanceMatrix {
    fn build(lane: u32, samples: &[&Sample]) -> Self {
        let n = samples.len();
        let mut i7 = vec![vec![None; n]; n];
        let mut i5 = vec![vec![None; n]; n];
        let mut combined = vec![vec![None; n]; n];

        let distance = |a: &Sample, b: &Sample, index_type: IndexType| {
            match (a.sequence(index_type), b.sequence(index_type)) {
                (Some(x), Some(y)) => Some(hamming_distance(x.bases(), y.bases())),
                _ => None,
            }
        };

        for i in 0..n {
            for j in (i + 1)..n {
                let d7 = distance(samples[i], samples[j], IndexType::I7);
                let d5 = distance(samples[i], samples[j], IndexType::I5);
                let dc = match (d7, d5) {
                    (Some(a), Some(b)) => Some(a + b),
                    (single @ Some(_), None) | (None, single @ Some(_)) => single,
                    (None, None) => None,
                };

                i7[i][j] = d7;
                i7[j][i] = d7;
                i5[i][j] = d5;
                i5[j][i] = d5;
                combined[i][j] = dc;
                combined[j][i] = dc;
            }
        }

        DistanceMatrix {
            lane,
            sample_ids: samples.iter().map(|s| s.sample_id.clone()).collect(),
            i7,
            i5,
            combined,
        }
    }

    fn values(&self, kind: DistanceKind) -> &[Vec<Option<u32>>] {
        match kind {
            DistanceKind::I7 => &self.i7,
            DistanceKind::I5 => &self.i5,
            DistanceKind::Combined => &self.combined,
        }
    }

    pub fn distance(&self, kind: DistanceKind, a: &str, b: &str) -> Option<u32> {
        let i = self.sample_ids.iter().position(|id| id == a)?;
        let j = self.sample_ids.iter().position(|id| id == b)?;
        self.values(kind)[i][j]
    }

    /// Smallest off-diagonal distance of a kind
    pub fn min_distance(&self, kind: DistanceKind) -> Option<u32> {
        self.values(kind).iter().flatten().flatten().copied().min()
    }
}

/// Distance matrices for every lane with at least two indexed samples
pub fn distance_matrices(lanes: &LaneGroups<'_>) -> BTreeMap<u32, DistanceMatrix> {
    lanes
        .iter()
        .filter_map(|(&lane, samples)| {
            let indexed: Vec<&Sample> = samples
                .iter()
                .copied()
                .filter(|sample| sample.index.has_any())
                .collect();
            (indexed.len() >= 2).then(|| (lane, DistanceMatrix::build(lane, &indexed)))
        })
        .collect()
}
