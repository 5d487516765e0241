//! Instruction Emitter
//!
//! Append-only program buffer of one circuit build.
//! It owns the global measurement counter, and it is the only place that turns absolute measurement record
//! indices into the `rec[-k]` offsets expected by detectors and observables.
//!

use super::circuit::Instruction;
use super::util::*;
use crate::derivative::Derivative;
use std::collections::BTreeMap;

#[derive(Derivative)]
#[derivative(Debug)]
pub struct InstructionEmitter {
    /// emitted lines, one instruction each
    #[derivative(Debug = "ignore")]
    lines: Vec<String>,
    /// number of measurement outcomes in the record so far
    measurement_count: RecordIndex,
    /// positions declared by [`Self::qubit_coordinates`]
    #[derivative(Debug = "ignore")]
    coord_lookup: BTreeMap<QubitIndex, Coordinate>,
}

impl InstructionEmitter {
    pub fn new(coord_lookup: BTreeMap<QubitIndex, Coordinate>) -> Self {
        Self {
            lines: vec![],
            measurement_count: 0,
            coord_lookup,
        }
    }

    /// append a raw line; blank lines are dropped
    pub fn append(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.lines.push(line.trim_end().to_string());
        }
    }

    /// append a typed instruction; operations without targets would be malformed and are dropped
    pub fn emit(&mut self, instruction: Instruction) {
        if instruction.requires_targets() && instruction.targets().is_empty() {
            return;
        }
        debug_assert!(
            !matches!(instruction, Instruction::Measure(_)),
            "use `measure` so that the record counter advances"
        );
        self.append(&instruction.to_string());
    }

    /// measure the qubits in one instruction, returning their record indices in input order
    pub fn measure(&mut self, qubits: &[QubitIndex]) -> Vec<RecordIndex> {
        if qubits.is_empty() {
            return vec![];
        }
        self.append(&Instruction::Measure(qubits.to_vec()).to_string());
        let start = self.measurement_count;
        self.measurement_count += qubits.len() as RecordIndex;
        (start..self.measurement_count).collect()
    }

    /// offsets backward from the current end of the record
    #[allow(clippy::unnecessary_cast)]
    fn offsets(&self, record_indices: &[RecordIndex]) -> Vec<usize> {
        record_indices
            .iter()
            .map(|&index| {
                assert!(
                    index < self.measurement_count,
                    "record index {} not yet measured ({} measurements so far)",
                    index,
                    self.measurement_count
                );
                (self.measurement_count - index) as usize
            })
            .collect()
    }

    /// declare a detector at `coordinate` over the given absolute record indices
    pub fn detector(&mut self, coordinate: Coordinate, record_indices: &[RecordIndex]) {
        let offsets = self.offsets(record_indices);
        self.append(&Instruction::Detector { coordinate, offsets }.to_string());
    }

    /// declare logical observable 0 over the given absolute record indices
    pub fn observable(&mut self, record_indices: &[RecordIndex]) {
        let offsets = self.offsets(record_indices);
        self.append(&Instruction::ObservableInclude { index: 0, offsets }.to_string());
    }

    /// declare the position of every known qubit
    pub fn qubit_coordinates(&mut self) {
        let declarations: Vec<Instruction> = self
            .coord_lookup
            .iter()
            .map(|(&qubit, &coordinate)| Instruction::QubitCoords { coordinate, qubit })
            .collect();
        for declaration in declarations.into_iter() {
            self.emit(declaration);
        }
    }

    pub fn measurement_count(&self) -> RecordIndex {
        self.measurement_count
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// the program text, one instruction per line with a trailing newline
    pub fn serialize(&self) -> String {
        self.lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter_of(qubit_num: usize) -> InstructionEmitter {
        let coord_lookup = (0..qubit_num)
            .map(|index| (index as QubitIndex, Coordinate::new(index as f64, 0.)))
            .collect();
        InstructionEmitter::new(coord_lookup)
    }

    #[test]
    fn emitter_append_drops_blank_lines() {
        // cargo test emitter_append_drops_blank_lines -- --nocapture
        let mut emitter = emitter_of(0);
        emitter.append("");
        emitter.append("   \t");
        emitter.append("TICK  ");
        emitter.emit(Instruction::Hadamard(vec![]));
        emitter.emit(Instruction::Depolarize2 { p: 0.1, targets: vec![] });
        emitter.emit(Instruction::Tick);
        assert_eq!(emitter.lines(), &["TICK".to_string(), "TICK".to_string()]);
        assert_eq!(emitter.serialize(), "TICK\nTICK\n");
    }

    #[test]
    fn emitter_measurement_counter() {
        // cargo test emitter_measurement_counter -- --nocapture
        let mut emitter = emitter_of(4);
        assert_eq!(emitter.measure(&[]), Vec::<RecordIndex>::new());
        assert_eq!(emitter.measurement_count(), 0);
        assert!(emitter.lines().is_empty());
        assert_eq!(emitter.measure(&[3, 1, 2]), vec![0, 1, 2]);
        assert_eq!(emitter.measure(&[0, 3]), vec![3, 4]);
        assert_eq!(emitter.measurement_count(), 5);
        assert_eq!(emitter.lines(), &["M 3 1 2".to_string(), "M 0 3".to_string()]);
    }

    #[test]
    fn emitter_detector_offsets() {
        // cargo test emitter_detector_offsets -- --nocapture
        let mut emitter = emitter_of(4);
        let first = emitter.measure(&[0, 1, 2, 3]);
        emitter.detector(Coordinate::new(2., 0.), &[first[1]]);
        let second = emitter.measure(&[0, 1, 2, 3]);
        // previous round and current round of the same qubit
        emitter.detector(Coordinate::new(2., 0.), &[first[1], second[1]]);
        emitter.observable(&second[2..]);
        assert_eq!(
            emitter.serialize(),
            "M 0 1 2 3\nDETECTOR(2,0) rec[-3]\nM 0 1 2 3\nDETECTOR(2,0) rec[-7] rec[-3]\nOBSERVABLE_INCLUDE(0) rec[-2] rec[-1]\n"
        );
    }

    #[test]
    #[should_panic]
    fn emitter_detector_rejects_future_record() {
        // cargo test emitter_detector_rejects_future_record -- --nocapture
        let mut emitter = emitter_of(2);
        emitter.measure(&[0, 1]);
        emitter.detector(Coordinate::new(0., 0.), &[2]);
    }

    #[test]
    fn emitter_qubit_coordinates() {
        // cargo test emitter_qubit_coordinates -- --nocapture
        let mut emitter = emitter_of(3);
        emitter.qubit_coordinates();
        assert_eq!(
            emitter.serialize(),
            "QUBIT_COORDS(0,0) 0\nQUBIT_COORDS(1,0) 1\nQUBIT_COORDS(2,0) 2\n"
        );
        assert_eq!(emitter.measurement_count(), 0);
    }
}
