//! Dynamic Surface Codes
//!
//! Memory experiments that differ only in their policy: which orientations the entangling layers follow,
//! whether that schedule is played backwards on every other round, which two-qubit gate is used,
//! and whether the data qubits are refreshed during the experiment.
//! All of them drive the same [`stabilizer_cycle`] and finish with a logical measurement of the first
//! `distance` data qubits.
//!
//! | variant     | orientations | reversed on odd rounds | gate  | data refresh |
//! |-------------|--------------|------------------------|-------|--------------|
//! | `static`    | 0, 1, 2, 3   | no                     | CX    | never        |
//! | `hexagonal` | 0, 1, 2      | yes                    | CX    | never        |
//! | `iswap`     | 0, 3, 1, 2   | yes                    | ISWAP | never        |
//! | `walking`   | 0, 1, 2, 3   | no                     | CX    | odd rounds   |
//!

use super::circuit::EntanglingGate;
use super::emitter::InstructionEmitter;
use super::layout::{Layout, ADJACENT_STEPS};
use super::stabilizer_cycle::*;
use super::util::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CodeVariant {
    /// fixed schedule, the baseline every dynamic variant is compared against
    Static,
    /// three-edge footprint alternating forward and backward in time, modeling degree-3 connectivity
    Hexagonal,
    /// exchange-coupler native schedule using `ISWAP`
    Iswap,
    /// refreshes the data qubits every other round
    Walking,
}

impl CodeVariant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Hexagonal => "hexagonal",
            Self::Iswap => "iswap",
            Self::Walking => "walking",
        }
    }

    /// name of the builder function producing this variant
    pub fn builder_name(&self) -> &'static str {
        match self {
            Self::Static => "static_surface_code",
            Self::Hexagonal => "hexagonal_surface_code",
            Self::Iswap => "iswap_surface_code",
            Self::Walking => "walking_surface_code",
        }
    }

    pub fn policy(&self) -> VariantPolicy {
        match self {
            Self::Static => VariantPolicy {
                orientations: vec![0, 1, 2, 3],
                alternate_reverse: false,
                gate: EntanglingGate::Cx,
                data_refresh: DataRefresh::Never,
                z_data_first: false,
            },
            Self::Hexagonal => VariantPolicy {
                orientations: vec![0, 1, 2],
                alternate_reverse: true,
                gate: EntanglingGate::Cx,
                data_refresh: DataRefresh::Never,
                z_data_first: false,
            },
            Self::Iswap => VariantPolicy {
                orientations: vec![0, 3, 1, 2],
                alternate_reverse: true,
                gate: EntanglingGate::Iswap,
                data_refresh: DataRefresh::Never,
                z_data_first: false,
            },
            Self::Walking => VariantPolicy {
                orientations: vec![0, 1, 2, 3],
                alternate_reverse: false,
                gate: EntanglingGate::Cx,
                data_refresh: DataRefresh::OddRounds,
                z_data_first: false,
            },
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Static, Self::Hexagonal, Self::Iswap, Self::Walking]
    }
}

impl std::fmt::Display for CodeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// when the data qubits join the reset and measurement of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRefresh {
    Never,
    /// rounds 1, 3, 5, ... reset the data qubits first and measure them last
    OddRounds,
}

/// everything that distinguishes one variant from another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantPolicy {
    /// orientation schedule of even rounds
    pub orientations: Vec<usize>,
    /// odd rounds play the schedule backwards
    pub alternate_reverse: bool,
    pub gate: EntanglingGate,
    pub data_refresh: DataRefresh,
    /// Z-check gates take the data qubit as the first target, so a `CX` copies the data parity onto the ancilla
    #[serde(default)]
    pub z_data_first: bool,
}

impl VariantPolicy {
    pub fn sanity_check(&self) -> Result<(), StemError> {
        if self.orientations.is_empty() {
            return Err(StemError::InvalidParameter("orientation schedule must not be empty".to_string()));
        }
        if let Some(orientation) = self.orientations.iter().find(|&&orientation| orientation >= ADJACENT_STEPS.len()) {
            return Err(StemError::InvalidParameter(format!(
                "orientation {} out of range, expecting 0..{}",
                orientation,
                ADJACENT_STEPS.len()
            )));
        }
        Ok(())
    }

    /// the cycle policy of round `round` (starting from 0)
    pub fn cycle(&self, round: usize) -> CyclePolicy {
        let odd = round % 2 == 1;
        let mut orientations = self.orientations.clone();
        if self.alternate_reverse && odd {
            orientations.reverse();
        }
        let refresh = match self.data_refresh {
            DataRefresh::Never => false,
            DataRefresh::OddRounds => odd,
        };
        CyclePolicy {
            orientations,
            gate: self.gate,
            reset_data: refresh,
            measure_data: refresh,
            z_data_first: self.z_data_first,
        }
    }

    /// override fields from a JSON object, e.g. `{"gate":"ISWAP"}`; unknown keys are rejected
    pub fn merge_config(&self, config: serde_json::Value) -> Result<Self, StemError> {
        let mut value = serde_json::to_value(self).map_err(|err| StemError::InvalidParameter(format!("{err}")))?;
        let object = value.as_object_mut().expect("policy serializes to an object");
        let config = match config {
            serde_json::Value::Object(config) => config,
            _ => return Err(StemError::InvalidParameter("policy config must be a JSON object".to_string())),
        };
        for (key, field) in config.into_iter() {
            object.insert(key, field);
        }
        let policy: Self =
            serde_json::from_value(value).map_err(|err| StemError::InvalidParameter(format!("policy config: {err}")))?;
        policy.sanity_check()?;
        Ok(policy)
    }
}

/// a surface code memory experiment ready to be turned into a program
#[derive(Debug, Clone)]
pub struct DynamicSurfaceCode {
    pub parameters: CircuitParameters,
    pub policy: VariantPolicy,
}

impl DynamicSurfaceCode {
    pub fn new(variant: CodeVariant, distance: usize, rounds: usize, p: f64) -> Result<Self, StemError> {
        Self::new_policy(variant.policy(), distance, rounds, p)
    }

    pub fn new_policy(policy: VariantPolicy, distance: usize, rounds: usize, p: f64) -> Result<Self, StemError> {
        let parameters = CircuitParameters::new(distance, rounds, p)?;
        policy.sanity_check()?;
        Ok(Self { parameters, policy })
    }

    /// emit the whole program: coordinates, `rounds` stabilizer cycles, then the logical measurement
    pub fn build(&self) -> String {
        let CircuitParameters { distance, rounds, p } = self.parameters;
        let layout = Layout::new(distance).expect("distance checked at construction");
        let mut emitter = InstructionEmitter::new(layout.index_to_coord());
        emitter.qubit_coordinates();
        let mut previous = MeasurementRecord::new();
        for round in 0..rounds {
            previous = stabilizer_cycle(&mut emitter, &layout, p, &self.policy.cycle(round), previous);
        }
        let logical_targets = layout.indices_of(&layout.datas[..distance]);
        let logical_records = emitter.measure(&logical_targets);
        emitter.observable(&logical_records);
        emitter.serialize()
    }
}

/// build the program of a named variant
pub fn surface_code_circuit(variant: CodeVariant, distance: usize, rounds: usize, p: f64) -> Result<String, StemError> {
    Ok(DynamicSurfaceCode::new(variant, distance, rounds, p)?.build())
}

/// fixed-schedule baseline
pub fn static_surface_code(distance: usize, rounds: usize, p: f64) -> Result<String, StemError> {
    surface_code_circuit(CodeVariant::Static, distance, rounds, p)
}

/// three orientations played forward on even rounds and backward on odd rounds, to model the
/// degree-3 connectivity of a hexagonal coupler graph while detectors still stitch consecutive
/// measurements of each check
pub fn hexagonal_surface_code(distance: usize, rounds: usize, p: f64) -> Result<String, StemError> {
    surface_code_circuit(CodeVariant::Hexagonal, distance, rounds, p)
}

/// `ISWAP`-native schedule, time-reversed on odd rounds
pub fn iswap_surface_code(distance: usize, rounds: usize, p: f64) -> Result<String, StemError> {
    surface_code_circuit(CodeVariant::Iswap, distance, rounds, p)
}

/// data qubits are reset and measured on every odd round so that each physical qubit is refreshed every other round
pub fn walking_surface_code(distance: usize, rounds: usize, p: f64) -> Result<String, StemError> {
    surface_code_circuit(CodeVariant::Walking, distance, rounds, p)
}
