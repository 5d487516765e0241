use super::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::prelude::*;
use std::time::Instant;

cfg_if::cfg_if! {
    if #[cfg(feature="u32_index")] {
        // use u32 to store index, for less memory usage
        pub type QubitIndex = u32;
        pub type RecordIndex = u32;  // the position in the global measurement record
    } else {
        pub type QubitIndex = usize;
        pub type RecordIndex = usize;
    }
}

/// the location of a qubit on the lattice; coordinates are generated from integers so comparing
/// them by bit pattern is exact
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
    /// shift by a lattice step
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coordinate {}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// row-major: compare `y` first, then `x`
impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.total_cmp(&other.y).then(self.x.total_cmp(&other.x))
    }
}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// errors surfaced to the caller; circuit generation itself never fails after the parameters are validated
#[derive(Debug, Clone, PartialEq)]
pub enum StemError {
    /// distance, probability, orientation or shot count out of range
    InvalidParameter(String),
    /// an operation needs the external simulator but it cannot be located
    MissingOptionalDependency(String),
    /// the external simulator ran but failed or returned unreadable output
    Simulator(String),
    /// a program line does not follow the instruction grammar
    CircuitSyntax { line: usize, message: String },
    /// writing a result or profiler file failed
    Io(String),
}

impl std::fmt::Display for StemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StemError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            StemError::MissingOptionalDependency(msg) => write!(f, "missing optional dependency: {}", msg),
            StemError::Simulator(msg) => write!(f, "simulator failure: {}", msg),
            StemError::CircuitSyntax { line, message } => write!(f, "syntax error at line {}: {}", line, message),
            StemError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for StemError {}

impl From<std::io::Error> for StemError {
    fn from(err: std::io::Error) -> Self {
        StemError::Io(err.to_string())
    }
}

/// the parameters shared by every circuit builder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitParameters {
    /// code distance
    pub distance: usize,
    /// number of stabilizer measurement rounds
    pub rounds: usize,
    /// physical error probability used by every noise channel
    pub p: f64,
}

impl CircuitParameters {
    /// validate before anything is emitted
    pub fn new(distance: usize, rounds: usize, p: f64) -> Result<Self, StemError> {
        if distance == 0 {
            return Err(StemError::InvalidParameter("distance must be a positive integer".to_string()));
        }
        if !(0. ..=1.).contains(&p) {
            // also rejects NaN
            return Err(StemError::InvalidParameter(format!("probability {} must be within [0, 1]", p)));
        }
        Ok(Self { distance, rounds, p })
    }
}

#[allow(dead_code)]
/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// record the build and sampling time of multiple circuits
pub struct BenchmarkProfiler {
    /// each record corresponds to a sampled circuit
    pub records: Vec<BenchmarkProfilerEntry>,
    /// summation of all build time
    pub sum_build_time: f64,
    /// summation of all sampling time
    pub sum_sample_time: f64,
    /// summation of all sampled shots
    pub sum_shots: usize,
    /// the file to output the profiler results
    pub benchmark_profiler_output: Option<File>,
}

impl BenchmarkProfiler {
    pub fn new(detail_log_file: Option<String>) -> std::io::Result<Self> {
        let benchmark_profiler_output = match detail_log_file {
            Some(filename) => Some(File::create(filename)?),
            None => None,
        };
        Ok(Self {
            records: vec![],
            sum_build_time: 0.,
            sum_sample_time: 0.,
            sum_shots: 0,
            benchmark_profiler_output,
        })
    }
    /// record the beginning of a circuit build
    pub fn begin(&mut self, label: &str, parameters: &CircuitParameters, shots: usize) {
        // sanity check last entry, if exists, is complete
        if let Some(last_entry) = self.records.last() {
            assert!(
                last_entry.is_complete(),
                "the last benchmark profiler entry is not complete, make sure to call `begin` and `end` in pairs"
            );
        }
        let mut entry = BenchmarkProfilerEntry::new(label, parameters, shots);
        entry.record_begin();
        self.records.push(entry);
    }
    /// the circuit text is ready, sampling starts now
    pub fn built(&mut self, detector_num: usize) {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `built`");
        last_entry.record_built(detector_num);
    }
    /// record the ending of a sampling procedure
    pub fn end(&mut self, logical_error_rate: f64) -> std::io::Result<()> {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `end`");
        last_entry.record_end(logical_error_rate);
        self.sum_build_time += last_entry.build_time.unwrap_or(0.);
        self.sum_sample_time += last_entry.sample_time.unwrap_or(0.);
        self.sum_shots += last_entry.shots;
        if let Some(file) = self.benchmark_profiler_output.as_mut() {
            let value = json!({
                "label": last_entry.label,
                "parameters": last_entry.parameters,
                "shots": last_entry.shots,
                "detector_num": last_entry.detector_num,
                "build_time": last_entry.build_time,
                "sample_time": last_entry.sample_time,
                "logical_error_rate": last_entry.logical_error_rate,
            });
            file.write_all(value.to_string().as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
    /// drop the last entry if it never reached [`Self::end`], so the profiler can be reused after a failed sample
    pub fn abandon(&mut self) {
        if self.records.last().map_or(false, |entry| !entry.is_complete()) {
            self.records.pop();
        }
    }
    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let build = if self.records.is_empty() {
            0.
        } else {
            self.sum_build_time / self.records.len() as f64
        };
        let per_shot = if self.sum_shots == 0 {
            0.
        } else {
            self.sum_sample_time / self.sum_shots as f64
        };
        format!("circuits: {}, build: {build:.3e}, shot: {per_shot:.3e},", self.records.len())
    }
}

pub struct BenchmarkProfilerEntry {
    /// which builder produced the circuit
    pub label: String,
    /// the parameters of this circuit
    pub parameters: CircuitParameters,
    /// number of sampled shots
    pub shots: usize,
    /// number of detectors in the built circuit
    pub detector_num: Option<usize>,
    /// the time of beginning a build
    begin_time: Option<Instant>,
    /// the time the circuit text became available
    built_time: Option<Instant>,
    /// interval between [`Self::record_begin`] and [`Self::record_built`]
    pub build_time: Option<f64>,
    /// interval between [`Self::record_built`] and [`Self::record_end`]
    pub sample_time: Option<f64>,
    pub logical_error_rate: Option<f64>,
}

impl BenchmarkProfilerEntry {
    pub fn new(label: &str, parameters: &CircuitParameters, shots: usize) -> Self {
        Self {
            label: label.to_string(),
            parameters: *parameters,
            shots,
            detector_num: None,
            begin_time: None,
            built_time: None,
            build_time: None,
            sample_time: None,
            logical_error_rate: None,
        }
    }
    pub fn record_begin(&mut self) {
        assert_eq!(self.begin_time, None, "do not call `record_begin` twice on the same entry");
        self.begin_time = Some(Instant::now());
    }
    pub fn record_built(&mut self, detector_num: usize) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_built`");
        self.build_time = Some(begin_time.elapsed().as_secs_f64());
        self.detector_num = Some(detector_num);
        self.built_time = Some(Instant::now());
    }
    pub fn record_end(&mut self, logical_error_rate: f64) {
        let built_time = self
            .built_time
            .as_ref()
            .expect("make sure to call `record_built` before calling `record_end`");
        self.sample_time = Some(built_time.elapsed().as_secs_f64());
        self.logical_error_rate = Some(logical_error_rate);
    }
    pub fn is_complete(&self) -> bool {
        self.logical_error_rate.is_some()
    }
}
