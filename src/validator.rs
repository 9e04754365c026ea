// ==============================================================================
// validator.rs - Run Index Validation
// ==============================================================================
// Description: Read-only analysis of an annotated run: duplicate sample IDs,
//              index collisions, distance matrices, dark cycles, color balance
//              and configuration findings
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use crate::chemistry::Chemistry;
use crate::collisions::{
    distance_matrices, find_collisions, group_samples_by_lane, AnalysisError, DistanceKind, DistanceMatrix,
    IndexCollision, LaneGroups,
};
use crate::color_balance::{
    analyze_color_balance, find_dark_cycles, BalanceStatus, ColorBalanceReport, DarkCycleWarning,
    DEFAULT_WARNING_PERCENT,
};
use crate::models::{IndexType, RunConfiguration};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

/// BCL Convert limit on Sample_ID length
const MAX_SAMPLE_ID_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    InvalidSampleId,
    NoLaneAssignment,
    IndexLengthMismatch,
    MixedIndexing,
    IndexExceedsCycles,
    DuplicateIndexPair,
    MismatchThresholdRisk,
}

/// Non-fatal problem with the run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationFinding {
    pub severity: Severity,
    pub category: FindingCategory,
    pub message: String,
    pub sample_ids: Vec<String>,
    pub lane: Option<u32>,
}

impl ConfigurationFinding {
    fn new(severity: Severity, category: FindingCategory, message: String) -> Self {
        Self {
            severity,
            category,
            message,
            sample_ids: Vec::new(),
            lane: None,
        }
    }

    fn in_lane(mut self, lane: u32) -> Self {
        self.lane = Some(lane);
        self
    }

    fn for_samples<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sample_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Result of analysing a run. Built fresh on each call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub chemistry: Chemistry,
    pub duplicate_sample_ids: Vec<String>,
    pub collisions: Vec<IndexCollision>,
    pub distance_matrices: BTreeMap<u32, DistanceMatrix>,
    pub dark_cycle_warnings: Vec<DarkCycleWarning>,
    /// None for four-color chemistry
    pub color_balance: Option<ColorBalanceReport>,
    pub configuration_findings: Vec<ConfigurationFinding>,
}

impl ValidationReport {
    fn findings(&self, severity: Severity) -> usize {
        self.configuration_findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }

    /// Duplicate IDs, collisions and configuration errors
    pub fn error_count(&self) -> usize {
        self.duplicate_sample_ids.len() + self.collisions.len() + self.findings(Severity::Error)
    }

    /// Dark cycles, flagged color-balance positions and configuration warnings
    pub fn warning_count(&self) -> usize {
        let balance = self
            .color_balance
            .as_ref()
            .map(|report| report.count(BalanceStatus::Warning) + report.count(BalanceStatus::Error))
            .unwrap_or(0);
        self.dark_cycle_warnings.len() + balance + self.findings(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Analyses runs with configurable thresholds
pub struct RunValidator {
    balance_warning_percent: f64,
    max_sample_id_length: usize,
}

impl RunValidator {
    pub fn new() -> Self {
        Self {
            balance_warning_percent: DEFAULT_WARNING_PERCENT,
            max_sample_id_length: MAX_SAMPLE_ID_LENGTH,
        }
    }

    pub fn with_balance_warning_percent(mut self, percent: f64) -> Self {
        self.balance_warning_percent = percent;
        self
    }

    /// Analyse a run without modifying it.
    ///
    /// Fails only when the run's shape is invalid (a lane outside the
    /// flowcell). Data problems are reported, never returned as errors.
    pub fn validate(&self, run: &RunConfiguration) -> Result<ValidationReport, AnalysisError> {
        info!("Validating run {} ({} samples)", run.id, run.samples.len());

        // 1. Group samples by lane
        let lanes = group_samples_by_lane(run)?;
        debug!("Analysing {} lanes", lanes.len());

        // 2. Duplicate sample IDs
        let duplicate_sample_ids = duplicate_ids(run);

        // 3. Collisions and distance matrices
        let collisions = find_collisions(&lanes);
        let distance_matrices = distance_matrices(&lanes);
        debug!("Found {} index collisions", collisions.len());

        // 4. Optical checks
        let chemistry = run.chemistry();
        let orientation = run.i5_orientation();
        let dark_cycle_warnings = find_dark_cycles(&run.samples, chemistry, orientation);
        let color_balance = analyze_color_balance(&lanes, chemistry, orientation, self.balance_warning_percent);

        // 5. Configuration findings
        let configuration_findings = self.configuration_findings(run, &lanes, &distance_matrices);

        let report = ValidationReport {
            run_id: run.id,
            chemistry,
            duplicate_sample_ids,
            collisions,
            distance_matrices,
            dark_cycle_warnings,
            color_balance,
            configuration_findings,
        };

        info!(
            "Validation complete: {} errors, {} warnings",
            report.error_count(),
            report.warning_count()
        );
        Ok(report)
    }

    fn configuration_findings(
        &self,
        run: &RunConfiguration,
        lanes: &LaneGroups<'_>,
        matrices: &BTreeMap<u32, DistanceMatrix>,
    ) -> Vec<ConfigurationFinding> {
        let mut findings = Vec::new();

        for sample in &run.samples {
            if !self.is_valid_sample_id(&sample.sample_id) {
                findings.push(
                    ConfigurationFinding::new(
                        Severity::Error,
                        FindingCategory::InvalidSampleId,
                        format!(
                            "Sample ID '{}' must be 1-{} characters of letters, digits, '_' or '-'",
                            sample.sample_id, self.max_sample_id_length
                        ),
                    )
                    .for_samples([sample.sample_id.as_str()]),
                );
            }

            for index_type in IndexType::ALL {
                let Some(sequence) = sample.sequence(index_type) else {
                    continue;
                };
                let cycles = run.run_cycles.cycles(index_type.read());
                if sequence.len() as u32 > cycles {
                    findings.push(
                        ConfigurationFinding::new(
                            Severity::Warning,
                            FindingCategory::IndexExceedsCycles,
                            format!(
                                "{} index of sample '{}' has {} bases but the run reads {} cycles",
                                index_type,
                                sample.sample_id,
                                sequence.len(),
                                cycles
                            ),
                        )
                        .for_samples([sample.sample_id.as_str()]),
                    );
                }
            }
        }

        if run.has_explicit_lanes() {
            let unassigned: Vec<&str> = run
                .samples
                .iter()
                .filter(|sample| sample.lanes.is_empty())
                .map(|sample| sample.sample_id.as_str())
                .collect();
            if !unassigned.is_empty() {
                findings.push(
                    ConfigurationFinding::new(
                        Severity::Warning,
                        FindingCategory::NoLaneAssignment,
                        format!(
                            "{} samples have no lane assignment and will be placed in every lane",
                            unassigned.len()
                        ),
                    )
                    .for_samples(unassigned),
                );
            }
        }

        for (&lane, samples) in lanes {
            for index_type in IndexType::ALL {
                let lengths: BTreeSet<usize> = samples
                    .iter()
                    .filter_map(|sample| sample.sequence(index_type).map(|seq| seq.len()))
                    .collect();
                if lengths.len() > 1 {
                    findings.push(
                        ConfigurationFinding::new(
                            Severity::Error,
                            FindingCategory::IndexLengthMismatch,
                            format!("Lane {} mixes {} index lengths {:?}", lane, index_type, lengths),
                        )
                        .in_lane(lane),
                    );
                }
            }

            let dual = samples.iter().filter(|sample| sample.index.is_dual()).count();
            let single = samples
                .iter()
                .filter(|sample| sample.index.has_any() && !sample.index.is_dual())
                .count();
            if dual > 0 && single > 0 {
                findings.push(
                    ConfigurationFinding::new(
                        Severity::Error,
                        FindingCategory::MixedIndexing,
                        format!(
                            "Lane {} mixes {} dual-indexed and {} single-indexed samples",
                            lane, dual, single
                        ),
                    )
                    .in_lane(lane),
                );
            }

            let mut pairs: HashMap<(Option<&str>, Option<&str>), Vec<&str>> = HashMap::new();
            for sample in samples.iter().filter(|sample| sample.index.has_any()) {
                let key = (
                    sample.sequence(IndexType::I7).map(|seq| seq.as_str()),
                    sample.sequence(IndexType::I5).map(|seq| seq.as_str()),
                );
                pairs.entry(key).or_default().push(sample.sample_id.as_str());
            }
            let mut duplicates: Vec<Vec<&str>> = pairs.into_values().filter(|ids| ids.len() > 1).collect();
            duplicates.sort();
            for ids in duplicates {
                findings.push(
                    ConfigurationFinding::new(
                        Severity::Error,
                        FindingCategory::DuplicateIndexPair,
                        format!("Lane {}: samples {} share the same index pair", lane, ids.join(", ")),
                    )
                    .in_lane(lane)
                    .for_samples(ids),
                );
            }

            if let Some(matrix) = matrices.get(&lane) {
                for (index_type, kind) in [(IndexType::I7, DistanceKind::I7), (IndexType::I5, DistanceKind::I5)] {
                    let Some(min_distance) = matrix.min_distance(kind) else {
                        continue;
                    };
                    let max_threshold = samples
                        .iter()
                        .filter(|sample| sample.sequence(index_type).is_some())
                        .map(|sample| u32::from(sample.mismatch_threshold(index_type)))
                        .max()
                        .unwrap_or(0);
                    if min_distance > max_threshold && min_distance <= 2 * max_threshold {
                        findings.push(
                            ConfigurationFinding::new(
                                Severity::Warning,
                                FindingCategory::MismatchThresholdRisk,
                                format!(
                                    "Lane {}: minimum {} distance {} is below {} required for {} mismatches",
                                    lane,
                                    index_type,
                                    min_distance,
                                    2 * max_threshold + 1,
                                    max_threshold
                                ),
                            )
                            .in_lane(lane),
                        );
                    }
                }
            }
        }

        findings
    }

    fn is_valid_sample_id(&self, sample_id: &str) -> bool {
        !sample_id.is_empty()
            && sample_id.len() <= self.max_sample_id_length
            && sample_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl Default for RunValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyse a run with default thresholds
pub fn analyze_run(run: &RunConfiguration) -> Result<ValidationReport, AnalysisError> {
    RunValidator::new().validate(run)
}

/// IDs appearing more than once, in order of first repeat
fn duplicate_ids(run: &RunConfiguration) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for sample in &run.samples {
        if !seen.insert(sample.sample_id.as_str()) && !duplicates.contains(&sample.sample_id) {
            duplicates.push(sample.sample_id.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry;
    use crate::models::{Flowcell, IndexSequence, RunCycles, Sample};

    fn run_on(instrument: &str, samples: Vec<Sample>) -> RunConfiguration {
        let mut run = RunConfiguration::new(
            chemistry::lookup(instrument).unwrap(),
            Flowcell {
                name: "test".to_string(),
                lanes: 2,
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
        run
    }

    fn sample(id: &str, i7: &str, i5: Option<&str>, lanes: &[u32]) -> Sample {
        let mut sample = Sample::new(id);
        sample.index.i7 = Some(IndexSequence::new(i7).unwrap());
        sample.index.i5 = i5.map(|seq| IndexSequence::new(seq).unwrap());
        sample.lanes = lanes.iter().copied().collect();
        sample
    }

    fn categories(report: &ValidationReport) -> Vec<FindingCategory> {
        report.configuration_findings.iter().map(|f| f.category).collect()
    }

    #[test]
    fn test_clean_run_has_no_errors() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ACGTACGT", Some("TGCATGCA"), &[]),
                sample("S2", "TGCATGCA", Some("ACGTACGT"), &[]),
                sample("S3", "CATGCATG", Some("GTACGTAC"), &[]),
                sample("S4", "GTACGTAC", Some("CATGCATG"), &[]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        assert!(!report.has_errors(), "{:?}", report);
        assert!(report.collisions.is_empty());
        assert!(report.duplicate_sample_ids.is_empty());
        assert_eq!(report.distance_matrices.len(), 2);
        assert!(report.color_balance.is_some());
    }

    #[test]
    fn test_collision_is_error() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("A", "ATTACTCG", None, &[1]),
                sample("B", "ATTACTCA", None, &[1]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].hamming_distance, 1);
        assert_eq!(report.collisions[0].threshold, 1);
        assert!(report.has_errors());
    }

    #[test]
    fn test_dark_cycle_depends_on_chemistry() {
        let samples = vec![sample("S1", "GGCATGCA", None, &[])];

        let two_color = analyze_run(&run_on("NovaSeq X Series", samples.clone())).unwrap();
        assert_eq!(two_color.dark_cycle_warnings.len(), 1);
        assert_eq!(two_color.dark_cycle_warnings[0].index_type, IndexType::I7);

        let four_color = analyze_run(&run_on("MiSeq", samples)).unwrap();
        assert!(four_color.dark_cycle_warnings.is_empty());
        assert!(four_color.color_balance.is_none());
    }

    #[test]
    fn test_i5_optical_checks_follow_read_orientation() {
        let samples = vec![sample("S1", "ATTACTCG", Some("ATATAGCC"), &[1])];

        let novaseq_x = analyze_run(&run_on("NovaSeq X Series", samples.clone())).unwrap();
        assert_eq!(novaseq_x.dark_cycle_warnings.len(), 1);
        assert_eq!(novaseq_x.dark_cycle_warnings[0].index_type, IndexType::I5);
        assert_eq!(novaseq_x.dark_cycle_warnings[0].sequence, "ATATAGCC");
        let first = novaseq_x.color_balance.as_ref().unwrap().lanes[&1]
            .i5
            .as_ref()
            .unwrap()
            .position(0)
            .unwrap()
            .clone();
        assert_eq!(first.counts.g, 1);
        assert_eq!(first.status, BalanceStatus::Error);

        let miseq_i100 = analyze_run(&run_on("MiSeq i100 Series", samples)).unwrap();
        assert!(miseq_i100.dark_cycle_warnings.is_empty());
    }

    #[test]
    fn test_color_balance_error_at_first_position() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("A", "ACGTACGT", None, &[1]),
                sample("B", "AGTCAGTC", None, &[1]),
                sample("C", "AATTCCGG", None, &[1]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        let balance = report.color_balance.as_ref().unwrap();
        let first = balance.lanes[&1].i7.as_ref().unwrap().position(0).unwrap();
        assert_eq!(first.channel2_percent, 0.0);
        assert_eq!(first.status, BalanceStatus::Error);
        assert!(report.warning_count() >= 1);
    }

    #[test]
    fn test_duplicate_sample_ids() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("S1", "ACGTACGT", None, &[]),
                sample("S1", "TGCATGCA", None, &[]),
                sample("S1", "CATGCATG", None, &[]),
                sample("S2", "GTACGTAC", None, &[]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        assert_eq!(report.duplicate_sample_ids, vec!["S1"]);
        assert!(report.has_errors());
    }

    #[test]
    fn test_analysis_is_read_only_and_deterministic() {
        let run = run_on(
            "NovaSeq 6000",
            vec![
                sample("A", "ATTACTCG", Some("TATAGCCT"), &[1]),
                sample("B", "ATTACTCA", Some("TATAGCCT"), &[1, 2]),
                sample("C", "GGCATGCA", None, &[]),
            ],
        );
        let before = run.samples.clone();
        let first = analyze_run(&run).unwrap();
        let second = analyze_run(&run).unwrap();
        assert_eq!(first, second);
        assert_eq!(run.samples, before);
    }

    #[test]
    fn test_lane_out_of_range_is_error() {
        let run = run_on("NovaSeq X Series", vec![sample("A", "ACGTACGT", None, &[5])]);
        assert!(matches!(
            analyze_run(&run),
            Err(AnalysisError::LaneOutOfRange { lane: 5, .. })
        ));
    }

    #[test]
    fn test_configuration_findings() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("Bad ID", "ACGTACGT", Some("TTTTAAAA"), &[1]),
                sample("S2", "ACGTACGTAC", None, &[1]),
                sample("S3", "ACGTACGTACGT", Some("CCCCGGGG"), &[]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        let found = categories(&report);

        assert!(found.contains(&FindingCategory::InvalidSampleId));
        assert!(found.contains(&FindingCategory::NoLaneAssignment));
        assert!(found.contains(&FindingCategory::IndexLengthMismatch));
        assert!(found.contains(&FindingCategory::MixedIndexing));
        assert!(found.contains(&FindingCategory::IndexExceedsCycles));

        let unassigned = report
            .configuration_findings
            .iter()
            .find(|f| f.category == FindingCategory::NoLaneAssignment)
            .unwrap();
        assert_eq!(unassigned.severity, Severity::Warning);
        assert_eq!(unassigned.sample_ids, vec!["S3"]);
    }

    #[test]
    fn test_duplicate_index_pair() {
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("A", "ACGTACGT", Some("TTTTAAAA"), &[1]),
                sample("B", "ACGTACGT", Some("TTTTAAAA"), &[1]),
                sample("C", "ACGTACGT", Some("TTTTAAAA"), &[2]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        let duplicates: Vec<_> = report
            .configuration_findings
            .iter()
            .filter(|f| f.category == FindingCategory::DuplicateIndexPair)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].lane, Some(1));
        assert_eq!(duplicates[0].sample_ids, vec!["A", "B"]);
    }

    #[test]
    fn test_mismatch_threshold_risk() {
        // distance 2 with 1 allowed mismatch: no collision, but ambiguous
        let run = run_on(
            "NovaSeq X Series",
            vec![
                sample("A", "ACGTACGT", None, &[1]),
                sample("B", "ACGTACAA", None, &[1]),
            ],
        );
        let report = analyze_run(&run).unwrap();
        assert!(report.collisions.is_empty());
        assert_eq!(categories(&report), vec![FindingCategory::MismatchThresholdRisk]);
        assert!(!report.has_errors());
    }
}
