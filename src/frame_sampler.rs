//! Pauli Frame Sampler
//!
//! Built-in detector sampler that needs no external simulator.
//! For each shot it tracks how the noisy execution deviates from a noiseless reference, as one X bit and one Z bit
//! per qubit. Frames of 64 shots are packed in a word, so every gate is a handful of word operations per qubit.
//! A detector fires when the XOR of the recorded flips it references is 1.
//!
//! Reset and measurement leave a qubit in a Z eigenstate, so a Z flip on it is unobservable; the Z bit is
//! randomized there instead, which is what makes non-deterministic measurements come out random.
//!

use super::circuit::{Circuit, EntanglingGate, Instruction};
use super::sampler::{DetectorSampler, DetectorSamples};
use super::util::*;
use crate::rand_xoshiro::rand_core::{RngCore, SeedableRng};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameSampler {
    /// shots simulated together by one task; results only depend on the seed and this value
    #[serde(default = "frame_sampler_default_configs::batch_size")]
    pub batch_size: usize,
    /// number of worker threads
    #[serde(default = "frame_sampler_default_configs::thread_pool_size")]
    pub thread_pool_size: usize,
}

pub mod frame_sampler_default_configs {
    pub fn batch_size() -> usize {
        1024
    }
    pub fn thread_pool_size() -> usize {
        0 // by default to the number of CPU cores
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            batch_size: frame_sampler_default_configs::batch_size(),
            thread_pool_size: frame_sampler_default_configs::thread_pool_size(),
        }
    }
}

impl FrameSampler {
    pub fn new_config(config: serde_json::Value) -> Result<Self, StemError> {
        let sampler: Self = serde_json::from_value(config)
            .map_err(|err| StemError::InvalidParameter(format!("frame sampler config: {err}")))?;
        sampler.sanity_check()?;
        Ok(sampler)
    }

    pub fn sanity_check(&self) -> Result<(), StemError> {
        if self.batch_size == 0 {
            return Err(StemError::InvalidParameter("batch_size must be positive".to_string()));
        }
        Ok(())
    }

    /// seed of batch `batch_index`, spaced so that neighboring batches never share a stream
    pub fn batch_seed(seed: u64, batch_index: usize) -> u64 {
        seed.wrapping_add((batch_index as u64).wrapping_mul(1_000_000_000))
    }

    /// sample an already parsed program
    pub fn sample_circuit(&self, circuit: &Circuit, shots: usize, seed: Option<u64>) -> Result<DetectorSamples, StemError> {
        self.sanity_check()?;
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        let batch_num = (shots + self.batch_size - 1) / self.batch_size;
        let run = || -> Vec<Vec<Vec<bool>>> {
            (0..batch_num)
                .into_par_iter()
                .map(|batch_index| {
                    let shot_num = std::cmp::min(self.batch_size, shots - batch_index * self.batch_size);
                    let mut batch = FrameBatch::new(circuit, shot_num, Self::batch_seed(seed, batch_index));
                    batch.run(circuit);
                    batch.detector_shots()
                })
                .collect()
        };
        let batches = if self.thread_pool_size == 0 {
            run()
        } else {
            let thread_pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.thread_pool_size)
                .build()
                .map_err(|err| StemError::Simulator(format!("creating thread pool failed: {err}")))?;
            thread_pool.install(run)
        };
        let mut samples = DetectorSamples::new(circuit.num_detectors);
        for batch in batches.into_iter() {
            samples.shots.extend(batch);
        }
        Ok(samples)
    }
}

impl DetectorSampler for FrameSampler {
    fn sample_detectors(&self, circuit: &str, shots: usize, seed: Option<u64>) -> Result<DetectorSamples, StemError> {
        let circuit: Circuit = circuit.parse()?;
        self.sample_circuit(&circuit, shots, seed)
    }
}

/// frames of up to `64 * words` shots, bit `s % 64` of word `s / 64` belongs to shot `s`
pub(crate) struct FrameBatch {
    shot_num: usize,
    words: usize,
    /// `x[q * words + w]`
    x: Vec<u64>,
    z: Vec<u64>,
    /// flips of every measurement so far, `words` per measurement
    records: Vec<u64>,
    /// flips of every detector so far, `words` per detector
    detectors: Vec<u64>,
    rng: DeterministicRng,
}

impl FrameBatch {
    pub fn new(circuit: &Circuit, shot_num: usize, seed: u64) -> Self {
        let words = (shot_num + 63) / 64;
        let mut batch = Self {
            shot_num,
            words,
            x: vec![0; circuit.num_qubits * words],
            z: vec![0; circuit.num_qubits * words],
            records: Vec::with_capacity(circuit.num_measurements * words),
            detectors: Vec::with_capacity(circuit.num_detectors * words),
            rng: DeterministicRng::seed_from_u64(seed),
        };
        // every qubit starts in |0>
        for qubit in 0..circuit.num_qubits {
            batch.randomize_z(qubit);
        }
        batch
    }

    /// bits of the word that belong to real shots
    fn valid_mask(&self, word: usize) -> u64 {
        let remaining = self.shot_num - word * 64;
        if remaining >= 64 {
            u64::MAX
        } else {
            (1u64 << remaining) - 1
        }
    }

    fn randomize_z(&mut self, qubit: usize) {
        for w in 0..self.words {
            self.z[qubit * self.words + w] = self.rng.next_u64() & self.valid_mask(w);
        }
    }

    /// independent Bernoulli(p) bit for every shot of the word
    fn bernoulli_word(&mut self, p: f64, word: usize) -> u64 {
        let valid = self.valid_mask(word);
        let mut result = 0;
        for bit in 0..64 {
            if valid >> bit & 1 == 1 && self.rng.next_f64() < p {
                result |= 1 << bit;
            }
        }
        result
    }

    pub fn reset(&mut self, qubit: usize) {
        for w in 0..self.words {
            self.x[qubit * self.words + w] = 0;
        }
        self.randomize_z(qubit);
    }

    pub fn measure(&mut self, qubit: usize) {
        for w in 0..self.words {
            self.records.push(self.x[qubit * self.words + w]);
        }
        self.randomize_z(qubit);
    }

    pub fn hadamard(&mut self, qubit: usize) {
        for w in 0..self.words {
            let index = qubit * self.words + w;
            std::mem::swap(&mut self.x[index], &mut self.z[index]);
        }
    }

    pub fn cx(&mut self, control: usize, target: usize) {
        for w in 0..self.words {
            let (c, t) = (control * self.words + w, target * self.words + w);
            self.x[t] ^= self.x[c];
            self.z[c] ^= self.z[t];
        }
    }

    /// XI -> ZY, IX -> YZ, ZI -> IZ, IZ -> ZI
    pub fn iswap(&mut self, a: usize, b: usize) {
        for w in 0..self.words {
            let (i, j) = (a * self.words + w, b * self.words + w);
            let (xa, za, xb, zb) = (self.x[i], self.z[i], self.x[j], self.z[j]);
            let mixed = xa ^ xb;
            self.x[i] = xb;
            self.x[j] = xa;
            self.z[i] = mixed ^ zb;
            self.z[j] = mixed ^ za;
        }
    }

    pub fn x_error(&mut self, p: f64, qubit: usize) {
        for w in 0..self.words {
            let flips = self.bernoulli_word(p, w);
            self.x[qubit * self.words + w] ^= flips;
        }
    }

    /// each non-identity Pauli with probability `p / 3`
    pub fn depolarize1(&mut self, p: f64, qubit: usize) {
        for w in 0..self.words {
            let hits = self.bernoulli_word(p, w);
            for bit in (0..64).filter(|bit| hits >> bit & 1 == 1) {
                let pauli: u64 = self.rng.gen_range(1..4); // 1 = X, 2 = Z, 3 = Y
                self.x[qubit * self.words + w] ^= (pauli & 1) << bit;
                self.z[qubit * self.words + w] ^= (pauli >> 1 & 1) << bit;
            }
        }
    }

    /// each of the 15 non-identity two-qubit Paulis with probability `p / 15`
    pub fn depolarize2(&mut self, p: f64, a: usize, b: usize) {
        for w in 0..self.words {
            let hits = self.bernoulli_word(p, w);
            for bit in (0..64).filter(|bit| hits >> bit & 1 == 1) {
                let pauli: u64 = self.rng.gen_range(1..16);
                self.x[a * self.words + w] ^= (pauli & 1) << bit;
                self.z[a * self.words + w] ^= (pauli >> 1 & 1) << bit;
                self.x[b * self.words + w] ^= (pauli >> 2 & 1) << bit;
                self.z[b * self.words + w] ^= (pauli >> 3 & 1) << bit;
            }
        }
    }

    pub fn detector(&mut self, offsets: &[usize]) {
        let measurement_num = self.records.len() / self.words.max(1);
        for w in 0..self.words {
            let mut parity = 0;
            for &offset in offsets.iter() {
                assert!(offset <= measurement_num, "rec[-{}] out of range", offset);
                parity ^= self.records[(measurement_num - offset) * self.words + w];
            }
            self.detectors.push(parity);
        }
    }

    #[allow(clippy::unnecessary_cast)]
    pub fn apply(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::QubitCoords { .. } | Instruction::Tick | Instruction::ObservableInclude { .. } => {}
            Instruction::Reset(targets) => targets.iter().for_each(|&q| self.reset(q as usize)),
            Instruction::Measure(targets) => targets.iter().for_each(|&q| self.measure(q as usize)),
            Instruction::Hadamard(targets) => targets.iter().for_each(|&q| self.hadamard(q as usize)),
            Instruction::TwoQubit { gate, targets } => {
                for pair in targets.chunks(2) {
                    let (a, b) = (pair[0] as usize, pair[1] as usize);
                    match gate {
                        EntanglingGate::Cx => self.cx(a, b),
                        EntanglingGate::Iswap => self.iswap(a, b),
                    }
                }
            }
            Instruction::XError { p, targets } => {
                if *p > 0. {
                    targets.iter().for_each(|&q| self.x_error(*p, q as usize));
                }
            }
            Instruction::Depolarize1 { p, targets } => {
                if *p > 0. {
                    targets.iter().for_each(|&q| self.depolarize1(*p, q as usize));
                }
            }
            Instruction::Depolarize2 { p, targets } => {
                if *p > 0. {
                    for pair in targets.chunks(2) {
                        self.depolarize2(*p, pair[0] as usize, pair[1] as usize);
                    }
                }
            }
            Instruction::Detector { offsets, .. } => self.detector(offsets),
        }
    }

    pub fn run(&mut self, circuit: &Circuit) {
        for instruction in circuit.instructions.iter() {
            self.apply(instruction);
        }
    }

    /// transpose the detector words into one row per shot
    pub fn detector_shots(&self) -> Vec<Vec<bool>> {
        let detector_num = if self.words == 0 { 0 } else { self.detectors.len() / self.words };
        (0..self.shot_num)
            .map(|shot| {
                let (w, bit) = (shot / 64, shot % 64);
                (0..detector_num)
                    .map(|detector| self.detectors[detector * self.words + w] >> bit & 1 == 1)
                    .collect()
            })
            .collect()
    }

    #[cfg(test)]
    fn frame_of(&self, qubit: usize) -> (u64, u64) {
        (self.x[qubit * self.words], self.z[qubit * self.words])
    }

    #[cfg(test)]
    fn set_frame(&mut self, qubit: usize, x: u64, z: u64) {
        self.x[qubit * self.words] = x;
        self.z[qubit * self.words] = z;
    }
}
