//! Stabilizer Cycle
//!
//! One full measurement round: reset, basis rotation, the entangling layers selected by the orientation schedule,
//! un-rotation, measurement and detector emission.
//! The per-coordinate record of the previous round is passed in by value and the new one is returned,
//! so consecutive rounds chain without hidden state and a single round can be exercised in isolation.
//!

use super::circuit::{EntanglingGate, Instruction};
use super::emitter::InstructionEmitter;
use super::layout::Layout;
use super::util::*;
use std::collections::BTreeMap;

/// X-check adjacency is rotated 90 degrees relative to Z-check adjacency on this lattice
pub const X_CHECK_REORDER: [usize; 4] = [0, 2, 1, 3];

/// most recent record index of each measured coordinate
pub type MeasurementRecord = BTreeMap<Coordinate, RecordIndex>;

/// what a single round does, fixed by the variant driver
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePolicy {
    /// direction indices in time order, each in `0..4`
    pub orientations: Vec<usize>,
    pub gate: EntanglingGate,
    /// also reset the data qubits at the start of the round
    pub reset_data: bool,
    /// also measure the data qubits at the end of the round
    pub measure_data: bool,
    /// write Z-check pairs as `(data, check)` instead of `(check, data)`
    pub z_data_first: bool,
}

/// gate targets pairing each check with its neighbor in direction `orientation`; checks whose neighbor
/// falls outside the lattice are skipped
pub fn orientation_pairs(
    layout: &Layout,
    measures: &[Coordinate],
    orientation: usize,
    reorder: Option<&[usize; 4]>,
    data_first: bool,
) -> Vec<QubitIndex> {
    let mut pairs = Vec::with_capacity(measures.len() * 2);
    for measure in measures.iter() {
        if let Some(data) = layout.neighbor(measure, orientation, reorder) {
            let check = layout.index_of(measure).expect("check qubit must belong to the layout");
            if data_first {
                pairs.extend([data, check]);
            } else {
                pairs.extend([check, data]);
            }
        }
    }
    pairs
}

/// gate, two-qubit noise and a barrier; nothing at all when the layer is empty
pub fn noisy_layer(emitter: &mut InstructionEmitter, gate: EntanglingGate, pairs: Vec<QubitIndex>, p: f64) {
    if pairs.is_empty() {
        return;
    }
    emitter.emit(Instruction::TwoQubit { gate, targets: pairs.clone() });
    emitter.emit(Instruction::Depolarize2 { p, targets: pairs });
    emitter.emit(Instruction::Tick);
}

fn rotate_x_checks(emitter: &mut InstructionEmitter, x_checks: &[QubitIndex], all_qubits: &[QubitIndex], p: f64) {
    emitter.emit(Instruction::Hadamard(x_checks.to_vec()));
    emitter.emit(Instruction::Depolarize1 { p, targets: all_qubits.to_vec() });
    emitter.emit(Instruction::Tick);
}

/// run one round and return the record of this round, to be passed as `previous` to the next one
pub fn stabilizer_cycle(
    emitter: &mut InstructionEmitter,
    layout: &Layout,
    p: f64,
    policy: &CyclePolicy,
    previous: MeasurementRecord,
) -> MeasurementRecord {
    let measures = layout.measures();
    let x_checks = layout.indices_of(&layout.x_measures);
    let all_qubits = {
        let mut all = layout.indices_of(&layout.datas);
        all.extend(layout.indices_of(&measures));
        all
    };

    // reset
    let mut reset_coords = measures.clone();
    if policy.reset_data {
        reset_coords.extend(layout.datas.iter().copied());
    }
    let reset_targets = layout.indices_of(&reset_coords);
    if !reset_targets.is_empty() {
        emitter.emit(Instruction::Reset(reset_targets.clone()));
        emitter.emit(Instruction::XError { p, targets: reset_targets });
        emitter.emit(Instruction::Tick);
    }

    rotate_x_checks(emitter, &x_checks, &all_qubits, p);

    for &orientation in policy.orientations.iter() {
        let z_pairs = orientation_pairs(layout, &layout.z_measures, orientation, None, policy.z_data_first);
        let x_pairs = orientation_pairs(layout, &layout.x_measures, orientation, Some(&X_CHECK_REORDER), false);
        noisy_layer(emitter, policy.gate, z_pairs, p);
        noisy_layer(emitter, policy.gate, x_pairs, p);
    }

    rotate_x_checks(emitter, &x_checks, &all_qubits, p);

    let mut measured_coords = measures.clone();
    if policy.measure_data {
        measured_coords.extend(layout.datas.iter().copied());
    }
    let record_indices = emitter.measure(&layout.indices_of(&measured_coords));
    let current: MeasurementRecord = measured_coords.into_iter().zip(record_indices.into_iter()).collect();

    for measure in measures.iter() {
        let now = current[measure];
        match previous.get(measure) {
            Some(&before) => emitter.detector(*measure, &[before, now]),
            None => emitter.detector(*measure, &[now]),
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    fn new_emitter(layout: &Layout) -> InstructionEmitter {
        InstructionEmitter::new(layout.index_to_coord())
    }

    fn standard_policy() -> CyclePolicy {
        CyclePolicy {
            orientations: vec![0, 1, 2, 3],
            gate: EntanglingGate::Cx,
            reset_data: false,
            measure_data: false,
            z_data_first: false,
        }
    }

    #[test]
    fn stabilizer_cycle_orientation_pairs_skip_boundary() {
        // cargo test stabilizer_cycle_orientation_pairs_skip_boundary -- --nocapture
        let layout = Layout::new(3).unwrap();
        let index_to_coord = layout.index_to_coord();
        for orientation in 0..4 {
            let z_pairs = orientation_pairs(&layout, &layout.z_measures, orientation, None, false);
            let x_pairs = orientation_pairs(&layout, &layout.x_measures, orientation, Some(&X_CHECK_REORDER), false);
            // two interior checks always pair, the two boundary checks pair in half of the directions
            assert!(z_pairs.len() == 6 || z_pairs.len() == 8, "{:?}", z_pairs);
            assert!(x_pairs.len() == 6 || x_pairs.len() == 8, "{:?}", x_pairs);
            // the check always comes first
            for pair in z_pairs.chunks(2) {
                assert!(layout.z_measures.contains(&index_to_coord[&pair[0]]));
                assert!(layout.datas.contains(&index_to_coord[&pair[1]]));
            }
            for pair in x_pairs.chunks(2) {
                assert!(layout.x_measures.contains(&index_to_coord[&pair[0]]));
                assert!(layout.datas.contains(&index_to_coord[&pair[1]]));
            }
            // `data_first` only swaps each pair
            let swapped = orientation_pairs(&layout, &layout.z_measures, orientation, None, true);
            let expected: Vec<QubitIndex> = z_pairs.chunks(2).flat_map(|pair| [pair[1], pair[0]]).collect();
            assert_eq!(swapped, expected);
        }
        // across the four directions every check touches each of its neighbors exactly once
        let mut total = 0;
        for orientation in 0..4 {
            total += orientation_pairs(&layout, &layout.z_measures, orientation, None, false).len() / 2;
        }
        assert_eq!(total, 2 * 4 + 2 * 2);
        // out of range orientations never pair
        assert!(orientation_pairs(&layout, &layout.z_measures, 4, None, false).is_empty());
    }

    #[test]
    fn stabilizer_cycle_first_layer_is_check_first() {
        // cargo test stabilizer_cycle_first_layer_is_check_first -- --nocapture
        let layout = Layout::new(3).unwrap();
        let mut emitter = new_emitter(&layout);
        stabilizer_cycle(&mut emitter, &layout, 0.001, &standard_policy(), MeasurementRecord::new());
        let text = emitter.serialize();
        let first_layer = text.lines().find(|line| line.starts_with("CX ")).unwrap();
        assert_eq!(first_layer, "CX 4 7 6 9 10 14");
        let mut emitter = new_emitter(&layout);
        let mut policy = standard_policy();
        policy.z_data_first = true;
        stabilizer_cycle(&mut emitter, &layout, 0.001, &policy, MeasurementRecord::new());
        let text = emitter.serialize();
        let first_layer = text.lines().find(|line| line.starts_with("CX ")).unwrap();
        assert_eq!(first_layer, "CX 7 4 9 6 14 10");
    }

    #[test]
    fn stabilizer_cycle_x_check_permutation() {
        // cargo test stabilizer_cycle_x_check_permutation -- --nocapture
        let layout = Layout::new(3).unwrap();
        let center = Coordinate::new(2., 2.);
        let x_pairs = orientation_pairs(&layout, &[center], 1, Some(&X_CHECK_REORDER), false);
        let z_pairs = orientation_pairs(&layout, &[center], 1, None, false);
        let index_to_coord = layout.index_to_coord();
        // direction 1 for an X check is the canonical direction 2
        assert_eq!(index_to_coord[&x_pairs[1]], Coordinate::new(3., 1.));
        assert_eq!(index_to_coord[&z_pairs[1]], Coordinate::new(1., 3.));
    }

    #[test]
    fn stabilizer_cycle_first_round() {
        // cargo test stabilizer_cycle_first_round -- --nocapture
        let layout = Layout::new(3).unwrap();
        let mut emitter = new_emitter(&layout);
        let record = stabilizer_cycle(&mut emitter, &layout, 0.001, &standard_policy(), MeasurementRecord::new());
        assert_eq!(record.len(), 8);
        assert_eq!(emitter.measurement_count(), 8);
        let text = emitter.serialize();
        println!("{text}");
        let lines: Vec<&str> = text.lines().collect();
        // X checks first, then Z checks
        assert_eq!(lines[0], "R 0 5 11 16 4 6 10 12");
        assert_eq!(lines[1], "X_ERROR(0.001) 0 5 11 16 4 6 10 12");
        assert_eq!(lines[2], "TICK");
        assert_eq!(lines[3], "H 0 5 11 16");
        assert!(lines[4].starts_with("DEPOLARIZE1(0.001) "));
        assert_eq!(lines[4].split_whitespace().count(), 1 + 17);
        // 4 orientations x 2 check types x (gate, noise, tick)
        assert_eq!(text.matches("CX ").count(), 8);
        assert_eq!(text.matches("DEPOLARIZE2(0.001) ").count(), 8);
        let detectors: Vec<&&str> = lines.iter().filter(|line| line.starts_with("DETECTOR")).collect();
        assert_eq!(detectors.len(), 8);
        for detector in detectors.iter() {
            assert_eq!(detector.matches("rec[").count(), 1);
        }
        // X checks are measured first, then Z checks
        assert_eq!(*detectors[0], "DETECTOR(4,0) rec[-8]");
        assert_eq!(*detectors[7], "DETECTOR(6,4) rec[-1]");
        text.parse::<Circuit>().unwrap();
    }

    #[test]
    fn stabilizer_cycle_chains_previous_record() {
        // cargo test stabilizer_cycle_chains_previous_record -- --nocapture
        let layout = Layout::new(3).unwrap();
        let mut emitter = new_emitter(&layout);
        let policy = standard_policy();
        let first = stabilizer_cycle(&mut emitter, &layout, 0.001, &policy, MeasurementRecord::new());
        let second = stabilizer_cycle(&mut emitter, &layout, 0.001, &policy, first.clone());
        for (coordinate, index) in second.iter() {
            assert_eq!(*index, first[coordinate] + 8);
        }
        let text = emitter.serialize();
        let last_detectors: Vec<&str> = text.lines().filter(|line| line.starts_with("DETECTOR")).skip(8).collect();
        assert_eq!(last_detectors.len(), 8);
        // the same check one round apart is always 8 measurements back
        assert_eq!(last_detectors[0], "DETECTOR(4,0) rec[-16] rec[-8]");
        assert_eq!(last_detectors[7], "DETECTOR(6,4) rec[-9] rec[-1]");
    }

    #[test]
    fn stabilizer_cycle_data_reset_and_measure() {
        // cargo test stabilizer_cycle_data_reset_and_measure -- --nocapture
        let layout = Layout::new(3).unwrap();
        let mut emitter = new_emitter(&layout);
        let mut policy = standard_policy();
        policy.reset_data = true;
        policy.measure_data = true;
        let record = stabilizer_cycle(&mut emitter, &layout, 0.01, &policy, MeasurementRecord::new());
        assert_eq!(record.len(), 17);
        assert_eq!(emitter.measurement_count(), 17);
        let text = emitter.serialize();
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line.split_whitespace().count(), 1 + 17);
        // only checks get detectors
        assert_eq!(text.matches("DETECTOR").count(), 8);
        // data records come after the check records
        assert_eq!(record[&layout.datas[0]], 8);
    }

    #[test]
    fn stabilizer_cycle_without_checks() {
        // cargo test stabilizer_cycle_without_checks -- --nocapture
        let layout = Layout::new(1).unwrap();
        let mut emitter = new_emitter(&layout);
        let record = stabilizer_cycle(&mut emitter, &layout, 0.1, &standard_policy(), MeasurementRecord::new());
        assert!(record.is_empty());
        // no reset, no H, no gate, no measurement: only noise on the single data qubit and barriers
        assert_eq!(emitter.serialize(), "DEPOLARIZE1(0.1) 0\nTICK\nDEPOLARIZE1(0.1) 0\nTICK\n");
    }
}
