//! Comparison Harness
//!
//! Samples a static baseline and one dynamic variant with the same parameters and sampler, and reports
//! their logical error rates side by side.
//!

use super::dynamic_codes::*;
use super::sampler::{logical_error_rate, DetectorSampler};
use super::util::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// key of the baseline entry
pub const STATIC_POLICY: &str = "static";
/// key of the dynamic variant entry
pub const DYNAMIC_POLICY: &str = "dynamic";

/// the parameters and the sampled logical error rate of one program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    /// the builder function that produced the program
    pub builder: String,
    pub distance: usize,
    pub rounds: usize,
    pub p: f64,
    pub shots: usize,
    pub seed: Option<u64>,
    pub logical_error_rate: f64,
}

/// build and sample one program, timing both phases when a profiler is given
pub fn sample_code(
    label: &str,
    builder: &str,
    code: &DynamicSurfaceCode,
    shots: usize,
    seed: Option<u64>,
    sampler: &dyn DetectorSampler,
    mut profiler: Option<&mut BenchmarkProfiler>,
) -> Result<ComparisonEntry, StemError> {
    if let Some(profiler) = profiler.as_mut() {
        profiler.begin(label, &code.parameters, shots);
    }
    let program = code.build();
    if let Some(profiler) = profiler.as_mut() {
        profiler.built(program.matches("DETECTOR").count());
    }
    let rate = match logical_error_rate(sampler, &program, shots, seed) {
        Ok(rate) => rate,
        Err(err) => {
            if let Some(profiler) = profiler.as_mut() {
                profiler.abandon();
            }
            return Err(err);
        }
    };
    if let Some(profiler) = profiler.as_mut() {
        profiler.end(rate)?;
    }
    let CircuitParameters { distance, rounds, p } = code.parameters;
    Ok(ComparisonEntry {
        builder: builder.to_string(),
        distance,
        rounds,
        p,
        shots,
        seed,
        logical_error_rate: rate,
    })
}

/// sample the baseline and the dynamic variant, keyed by [`STATIC_POLICY`] and [`DYNAMIC_POLICY`];
/// both programs see the same seed
pub fn compare_nested_policies(
    parameters: &CircuitParameters,
    shots: usize,
    seed: Option<u64>,
    static_variant: CodeVariant,
    dynamic_variant: CodeVariant,
    sampler: &dyn DetectorSampler,
    profiler: Option<&mut BenchmarkProfiler>,
) -> Result<BTreeMap<String, ComparisonEntry>, StemError> {
    compare_codes(
        [
            (STATIC_POLICY, static_variant.builder_name(), static_variant.policy()),
            (DYNAMIC_POLICY, dynamic_variant.builder_name(), dynamic_variant.policy()),
        ],
        parameters,
        shots,
        seed,
        sampler,
        profiler,
    )
}

/// like [`compare_nested_policies`] but with arbitrary policies, e.g. a variant adjusted by a JSON config
pub fn compare_codes<'a>(
    policies: impl IntoIterator<Item = (&'a str, &'a str, VariantPolicy)>,
    parameters: &CircuitParameters,
    shots: usize,
    seed: Option<u64>,
    sampler: &dyn DetectorSampler,
    mut profiler: Option<&mut BenchmarkProfiler>,
) -> Result<BTreeMap<String, ComparisonEntry>, StemError> {
    if shots == 0 {
        return Err(StemError::InvalidParameter("shots must be a positive integer".to_string()));
    }
    let CircuitParameters { distance, rounds, p } = *parameters;
    let mut comparison = BTreeMap::new();
    for (label, builder, policy) in policies.into_iter() {
        let code = DynamicSurfaceCode::new_policy(policy, distance, rounds, p)?;
        let entry = sample_code(label, builder, &code, shots, seed, sampler, profiler.as_deref_mut())?;
        comparison.insert(label.to_string(), entry);
    }
    Ok(comparison)
}

/// flatten a comparison into rows, each carrying its key as `policy`
pub fn tabulate_comparison(comparison: &BTreeMap<String, ComparisonEntry>) -> Vec<serde_json::Value> {
    comparison
        .iter()
        .map(|(policy, entry)| {
            let mut row = json!({ "policy": policy });
            if let (Some(row), serde_json::Value::Object(fields)) = (
                row.as_object_mut(),
                serde_json::to_value(entry).expect("entry serializes to an object"),
            ) {
                row.extend(fields);
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_sampler::FrameSampler;
    use crate::sampler::tests::PatternSampler;
    use crate::sampler::StimCliSampler;

    #[test]
    fn comparison_static_and_dynamic() {
        // cargo test comparison_static_and_dynamic -- --nocapture
        let parameters = CircuitParameters::new(3, 3, 0.001).unwrap();
        let sampler = FrameSampler::default();
        let comparison = compare_nested_policies(
            &parameters,
            8,
            Some(7),
            CodeVariant::Static,
            CodeVariant::Hexagonal,
            &sampler,
            None,
        )
        .unwrap();
        assert_eq!(comparison.keys().collect::<Vec<_>>(), vec!["dynamic", "static"]);
        for entry in comparison.values() {
            assert_eq!(entry.distance, 3);
            assert_eq!(entry.rounds, 3);
            assert_eq!(entry.shots, 8);
            assert_eq!(entry.seed, Some(7));
            assert!(entry.logical_error_rate.is_finite());
            assert!((0. ..=1.).contains(&entry.logical_error_rate));
        }
        assert_eq!(comparison["static"].builder, "static_surface_code");
        assert_eq!(comparison["dynamic"].builder, "hexagonal_surface_code");
        // the same seed gives the same statistics
        let again = compare_nested_policies(
            &parameters,
            8,
            Some(7),
            CodeVariant::Static,
            CodeVariant::Hexagonal,
            &sampler,
            None,
        )
        .unwrap();
        assert_eq!(comparison, again);
    }

    #[test]
    fn comparison_tabulate() {
        // cargo test comparison_tabulate -- --nocapture
        let parameters = CircuitParameters::new(3, 2, 0.01).unwrap();
        let sampler = PatternSampler {
            pattern: vec![vec![false, true], vec![false, false]],
        };
        let comparison = compare_nested_policies(
            &parameters,
            4,
            None,
            CodeVariant::Static,
            CodeVariant::Walking,
            &sampler,
            None,
        )
        .unwrap();
        let rows = tabulate_comparison(&comparison);
        println!("{}", serde_json::to_string(&rows).unwrap());
        assert_eq!(rows.len(), 2);
        let policies: Vec<&str> = rows.iter().map(|row| row["policy"].as_str().unwrap()).collect();
        assert_eq!(policies, vec!["dynamic", "static"]);
        for row in rows.iter() {
            assert_eq!(row["logical_error_rate"], 0.5);
            assert!(row["builder"].is_string());
            assert_eq!(row["seed"], serde_json::Value::Null);
        }
        assert_eq!(rows[0]["builder"], "walking_surface_code");
    }

    #[test]
    fn comparison_rejects_invalid_input() {
        // cargo test comparison_rejects_invalid_input -- --nocapture
        let parameters = CircuitParameters::new(3, 2, 0.01).unwrap();
        let sampler = PatternSampler { pattern: vec![vec![true]] };
        let result = compare_nested_policies(
            &parameters,
            0,
            None,
            CodeVariant::Static,
            CodeVariant::Iswap,
            &sampler,
            None,
        );
        assert!(matches!(result, Err(StemError::InvalidParameter(_))));
        let mut policy = CodeVariant::Iswap.policy();
        policy.orientations = vec![5];
        let result = compare_codes([("custom", "custom", policy)], &parameters, 10, None, &sampler, None);
        assert!(matches!(result, Err(StemError::InvalidParameter(_))));
    }

    #[test]
    fn comparison_profiler_records_every_program() {
        // cargo test comparison_profiler_records_every_program -- --nocapture
        let parameters = CircuitParameters::new(3, 3, 0.001).unwrap();
        let sampler = PatternSampler { pattern: vec![vec![false]] };
        let mut profiler = BenchmarkProfiler::new(None).unwrap();
        compare_nested_policies(
            &parameters,
            16,
            Some(1),
            CodeVariant::Static,
            CodeVariant::Iswap,
            &sampler,
            Some(&mut profiler),
        )
        .unwrap();
        assert_eq!(profiler.records.len(), 2);
        assert_eq!(profiler.sum_shots, 32);
        assert_eq!(profiler.records[0].label, "static");
        assert_eq!(profiler.records[1].label, "dynamic");
        assert_eq!(profiler.records[1].detector_num, Some(24));
        assert!(profiler.records.iter().all(|entry| entry.is_complete()));
        println!("{}", profiler.brief());
    }

    #[test]
    fn comparison_profiler_reusable_after_failure() {
        // cargo test comparison_profiler_reusable_after_failure -- --nocapture
        let parameters = CircuitParameters::new(3, 2, 0.001).unwrap();
        let mut profiler = BenchmarkProfiler::new(None).unwrap();
        let missing = StimCliSampler {
            binary: "surface_stem_nonexistent_stim_binary".to_string(),
        };
        let result = compare_nested_policies(
            &parameters,
            10,
            None,
            CodeVariant::Static,
            CodeVariant::Hexagonal,
            &missing,
            Some(&mut profiler),
        );
        assert!(matches!(result, Err(StemError::MissingOptionalDependency(_))));
        assert!(profiler.records.is_empty());
        let sampler = PatternSampler { pattern: vec![vec![false]] };
        compare_nested_policies(
            &parameters,
            10,
            None,
            CodeVariant::Static,
            CodeVariant::Hexagonal,
            &sampler,
            Some(&mut profiler),
        )
        .unwrap();
        assert_eq!(profiler.records.len(), 2);
        assert!(profiler.records.iter().all(|entry| entry.is_complete()));
    }
}
