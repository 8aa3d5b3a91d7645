//! Delta engine: per-artifact size comparison with alert thresholds.

use serde::Serialize;

use crate::report::Artifact;

/// Relative growth (in percent, after rounding) at or above which an alert
/// tag fires.
pub const PERCENT_THRESHOLD: f64 = 2.0;

/// Absolute growth (in bytes) at or above which an alert tag fires.
pub const BYTES_THRESHOLD: i64 = 25_000;

/// Tag recorded when the percent threshold fires.
pub const PERCENT_TAG: &str = "percent>2";

/// Tag recorded when the byte threshold fires.
pub const BYTES_TAG: &str = "bytes>25000";

/// Size comparison for one artifact between a baseline and the current
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactDelta {
    /// Artifact file name.
    pub file_name: String,
    /// Size in the current (target) snapshot.
    pub head_size: u64,
    /// Size in the baseline snapshot; zero when the artifact is new.
    pub master_size: u64,
    /// Signed size change in bytes.
    pub delta_bytes: i64,
    /// Relative change rounded to two decimals; `None` when both sizes are
    /// zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_percent: Option<f64>,
    /// `true` when at least one threshold tag fired.
    pub alert: bool,
    /// Threshold tags that fired, in reporting order.
    pub thresholds: Vec<String>,
}

/// Compares `target` against `baseline`, one delta per target artifact.
///
/// Baseline-only artifacts are not reported: the engine exists to flag
/// growth of current outputs, not removals. An artifact absent from the
/// baseline counts as growth from zero (100%). Output follows `target`
/// order.
#[must_use]
pub fn compute_deltas(baseline: &[Artifact], target: &[Artifact]) -> Vec<ArtifactDelta> {
    let mut deltas = Vec::with_capacity(target.len());
    for artifact in target {
        let head_size = artifact.size_bytes;
        let master_size = baseline
            .iter()
            .find(|b| b.file_name == artifact.file_name)
            .map_or(0, |b| b.size_bytes);
        let delta_bytes = head_size as i64 - master_size as i64;

        let delta_percent = if master_size > 0 {
            let raw = delta_bytes as f64 / master_size as f64 * 100.0;
            Some((raw * 100.0).round() / 100.0)
        } else if head_size > 0 {
            Some(100.0)
        } else {
            None
        };

        let mut thresholds = Vec::new();
        if delta_percent.is_some_and(|pct| pct.abs() >= PERCENT_THRESHOLD) {
            thresholds.push(PERCENT_TAG.to_string());
        }
        if delta_bytes.abs() >= BYTES_THRESHOLD {
            thresholds.push(BYTES_TAG.to_string());
        }

        deltas.push(ArtifactDelta {
            file_name: artifact.file_name.clone(),
            head_size,
            master_size,
            delta_bytes,
            delta_percent,
            alert: !thresholds.is_empty(),
            thresholds,
        });
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, size: u64) -> Artifact {
        Artifact { file_name: name.to_string(), size_bytes: size }
    }

    #[test]
    fn percent_threshold_fires_without_byte_threshold() {
        let baseline = vec![artifact("sandbox.wasm", 1_000_000)];
        let target = vec![artifact("sandbox.wasm", 1_020_001)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(deltas.len(), 1);
        let delta = &deltas[0];
        assert_eq!(delta.delta_bytes, 20_001);
        assert_eq!(delta.delta_percent, Some(2.0));
        assert_eq!(delta.thresholds, vec![PERCENT_TAG.to_string()]);
        assert!(delta.alert);
    }

    #[test]
    fn new_artifact_counts_as_growth_from_zero() {
        let baseline = Vec::new();
        let target = vec![artifact("new.wasm", 500)];

        let deltas = compute_deltas(&baseline, &target);
        let delta = &deltas[0];
        assert_eq!(delta.master_size, 0);
        assert_eq!(delta.delta_bytes, 500);
        assert_eq!(delta.delta_percent, Some(100.0));
        assert_eq!(delta.thresholds, vec![PERCENT_TAG.to_string()]);
        assert!(delta.alert);
    }

    #[test]
    fn both_thresholds_can_fire_together() {
        let baseline = vec![artifact("sandbox.wasm", 1_000_000)];
        let target = vec![artifact("sandbox.wasm", 1_030_000)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(
            deltas[0].thresholds,
            vec![PERCENT_TAG.to_string(), BYTES_TAG.to_string()]
        );
    }

    #[test]
    fn shrinkage_triggers_on_magnitude() {
        let baseline = vec![artifact("sandbox.wasm", 1_000_000)];
        let target = vec![artifact("sandbox.wasm", 900_000)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(deltas[0].delta_bytes, -100_000);
        assert_eq!(deltas[0].delta_percent, Some(-10.0));
        assert!(deltas[0].alert);
    }

    #[test]
    fn unchanged_small_artifact_raises_no_alert() {
        let baseline = vec![artifact("index.html", 1_000)];
        let target = vec![artifact("index.html", 1_010)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(deltas[0].delta_percent, Some(1.0));
        assert!(deltas[0].thresholds.is_empty());
        assert!(!deltas[0].alert);
    }

    #[test]
    fn zero_sized_artifact_on_both_sides_has_no_percent() {
        let baseline = vec![artifact("empty.bin", 0)];
        let target = vec![artifact("empty.bin", 0)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(deltas[0].delta_percent, None);
        assert!(!deltas[0].alert);
    }

    #[test]
    fn baseline_only_artifacts_are_not_reported() {
        let baseline = vec![artifact("removed.wasm", 10_000)];
        let target = vec![artifact("kept.wasm", 10_000)];

        let deltas = compute_deltas(&baseline, &target);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].file_name, "kept.wasm");
    }

    #[test]
    fn output_follows_target_order() {
        let baseline = Vec::new();
        let target = vec![artifact("b.wasm", 1), artifact("a.js", 1)];

        let names: Vec<String> =
            compute_deltas(&baseline, &target).into_iter().map(|d| d.file_name).collect();
        assert_eq!(names, vec!["b.wasm".to_string(), "a.js".to_string()]);
    }
}
