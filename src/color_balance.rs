// ==============================================================================
// color_balance.rs - Dark Cycle and Color Balance Analysis
// ==============================================================================
// Description: Optical-signal risk checks for index reads on two-color
//              SBS instruments
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Dark cycles: an index whose first two bases are both dark cannot be
//   registered at the start of the index read.
// Color balance: per lane, index type and 0-based position, the share of
//   samples lighting each channel. A base lit in both channels counts for
//   both. Samples too short for a position, and N bases, are left out of
//   that position's denominator.
//   either channel == 0%     -> error
//   either channel <  25%    -> warning
// Both checks see i5 in read order: reverse-complemented on instruments that
// read Index 2 on the opposite strand.
// ==============================================================================

use crate::chemistry::{Chemistry, I5Orientation};
use crate::collisions::LaneGroups;
use crate::models::{IndexType, Sample};
use serde::Serialize;
use std::collections::BTreeMap;

/// Channel share below which a position is flagged
pub const DEFAULT_WARNING_PERCENT: f64 = 25.0;

/// Leading dark bases that trigger a dark-cycle warning
pub const DARK_CYCLE_LEADING_BASES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DarkCycleWarning {
    pub sample_id: String,
    pub index_type: IndexType,
    /// Sequence as stored on the sample
    pub sequence: String,
    /// Sequence in instrument read order
    pub read_sequence: String,
    /// Dark bases at the start of the read
    pub leading_dark: usize,
}

/// Indexes whose read starts with two dark bases. Empty for four-color chemistry.
pub fn find_dark_cycles(
    samples: &[Sample],
    chemistry: Chemistry,
    i5_orientation: I5Orientation,
) -> Vec<DarkCycleWarning> {
    if !chemistry.is_two_color() {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    for sample in samples {
        for index_type in IndexType::ALL {
            let (Some(sequence), Some(read)) = (
                sample.sequence(index_type),
                sample.read_sequence(index_type, i5_orientation),
            ) else {
                continue;
            };
            let leading_dark = read
                .bases()
                .iter()
                .take_while(|&&base| chemistry.is_dark(base))
                .count();

            if leading_dark >= DARK_CYCLE_LEADING_BASES {
                warnings.push(DarkCycleWarning {
                    sample_id: sample.sample_id.clone(),
                    index_type,
                    sequence: sequence.to_string(),
                    read_sequence: read.to_string(),
                    leading_dark,
                });
            }
        }
    }
    warnings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BaseCounts {
    pub a: usize,
    pub c: usize,
    pub g: usize,
    pub t: usize,
}

/// Channel balance at one cycle of an index read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionBalance {
    /// 0-based cycle within the index read
    pub position: usize,
    /// Samples with a called base at this position
    pub eligible: usize,
    pub counts: BaseCounts,
    pub channel1_percent: f64,
    pub channel2_percent: f64,
    pub status: BalanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBalance {
    pub index_type: IndexType,
    pub positions: Vec<PositionBalance>,
}

impl IndexBalance {
    pub fn position(&self, position: usize) -> Option<&PositionBalance> {
        self.positions.iter().find(|p| p.position == position)
    }

    pub fn count(&self, status: BalanceStatus) -> usize {
        self.positions.iter().filter(|p| p.status == status).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneBalance {
    pub lane: u32,
    /// Indexed samples in the lane
    pub sample_count: usize,
    pub i7: Option<IndexBalance>,
    pub i5: Option<IndexBalance>,
}

impl LaneBalance {
    pub fn index(&self, index_type: IndexType) -> Option<&IndexBalance> {
        match index_type {
            IndexType::I7 => self.i7.as_ref(),
            IndexType::I5 => self.i5.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorBalanceReport {
    pub chemistry: Chemistry,
    /// Orientation i5 was analysed in
    pub i5_orientation: I5Orientation,
    pub channel1_name: &'static str,
    pub channel2_name: &'static str,
    pub warning_percent: f64,
    pub lanes: BTreeMap<u32, LaneBalance>,
}

impl ColorBalanceReport {
    /// Flagged positions of a status across all lanes and index types
    pub fn count(&self, status: BalanceStatus) -> usize {
        self.lanes
            .values()
            .flat_map(|lane| lane.i7.iter().chain(lane.i5.iter()))
            .map(|balance| balance.count(status))
            .sum()
    }
}

fn classify(channel1: f64, channel2: f64, warning_percent: f64) -> BalanceStatus {
    if channel1 == 0.0 || channel2 == 0.0 {
        BalanceStatus::Error
    } else if channel1 < warning_percent || channel2 < warning_percent {
        BalanceStatus::Warning
    } else {
        BalanceStatus::Ok
    }
}

fn index_balance(
    index_type: IndexType,
    samples: &[&Sample],
    chemistry: Chemistry,
    i5_orientation: I5Orientation,
    warning_percent: f64,
) -> Option<IndexBalance> {
    let sequences: Vec<_> = samples
        .iter()
        .filter_map(|sample| sample.read_sequence(index_type, i5_orientation))
        .collect();
    let max_length = sequences.iter().map(|seq| seq.len()).max()?;

    let mut positions = Vec::new();
    for position in 0..max_length {
        let mut counts = BaseCounts::default();
        let (mut eligible, mut channel1, mut channel2) = (0usize, 0usize, 0usize);

        for base in sequences.iter().filter_map(|seq| seq.bases().get(position).copied()) {
            let Some(channels) = chemistry.channels(base) else {
                continue;
            };
            match base {
                b'A' => counts.a += 1,
                b'C' => counts.c += 1,
                b'G' => counts.g += 1,
                _ => counts.t += 1,
            }
            eligible += 1;
            channel1 += usize::from(channels.channel1);
            channel2 += usize::from(channels.channel2);
        }

        if eligible == 0 {
            continue;
        }
        let channel1_percent = channel1 as f64 * 100.0 / eligible as f64;
        let channel2_percent = channel2 as f64 * 100.0 / eligible as f64;

        positions.push(PositionBalance {
            position,
            eligible,
            counts,
            channel1_percent,
            channel2_percent,
            status: classify(channel1_percent, channel2_percent, warning_percent),
        });
    }

    Some(IndexBalance { index_type, positions })
}

/// Per-lane color balance. `None` for chemistries without a channel model.
pub fn analyze_color_balance(
    lanes: &LaneGroups<'_>,
    chemistry: Chemistry,
    i5_orientation: I5Orientation,
    warning_percent: f64,
) -> Option<ColorBalanceReport> {
    let (channel1_name, channel2_name) = chemistry.channel_names()?;

    let lanes = lanes
        .iter()
        .filter_map(|(&lane, samples)| {
            let indexed: Vec<&Sample> = samples
                .iter()
                .copied()
                .filter(|sample| sample.index.has_any())
                .collect();
            if indexed.is_empty() {
                return None;
            }
            let balance = LaneBalance {
                lane,
                sample_count: indexed.len(),
                i7: index_balance(IndexType::I7, &indexed, chemistry, i5_orientation, warning_percent),
                i5: index_balance(IndexType::I5, &indexed, chemistry, i5_orientation, warning_percent),
            };
            Some((lane, balance))
        })
        .collect();

    Some(ColorBalanceReport {
        chemistry,
        i5_orientation,
        channel1_name,
        channel2_name,
        warning_percent,
        lanes,
    })
}
