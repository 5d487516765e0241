//! Instruction Grammar
//!
//! The typed vocabulary of the line-oriented Stim programs emitted by this crate.
//! Every instruction renders to exactly one line through [`std::fmt::Display`], and [`Circuit`] reads
//! a program back, checking that every `rec[-k]` reference points into the measurements already made.
//!
//! ```text
//! QUBIT_COORDS(x,y) q
//! R q q ...          M q q ...          H q q ...
//! CX a b a b ...     ISWAP a b a b ...
//! X_ERROR(p) q ...   DEPOLARIZE1(p) q ...   DEPOLARIZE2(p) a b ...
//! TICK
//! DETECTOR(x,y) rec[-k] ...
//! OBSERVABLE_INCLUDE(i) rec[-k] ...
//! ```
//!

use super::util::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// two-qubit entangling gates a cycle may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntanglingGate {
    #[serde(rename = "CX")]
    Cx,
    #[serde(rename = "ISWAP")]
    Iswap,
}

impl EntanglingGate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cx => "CX",
            Self::Iswap => "ISWAP",
        }
    }
}

impl std::fmt::Display for EntanglingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    QubitCoords { coordinate: Coordinate, qubit: QubitIndex },
    /// reset to |0>
    Reset(Vec<QubitIndex>),
    /// measure in the Z basis
    Measure(Vec<QubitIndex>),
    Hadamard(Vec<QubitIndex>),
    /// targets are consumed pairwise
    TwoQubit { gate: EntanglingGate, targets: Vec<QubitIndex> },
    XError { p: f64, targets: Vec<QubitIndex> },
    Depolarize1 { p: f64, targets: Vec<QubitIndex> },
    /// targets are consumed pairwise
    Depolarize2 { p: f64, targets: Vec<QubitIndex> },
    Tick,
    /// `offsets` are the `k` of `rec[-k]`
    Detector { coordinate: Coordinate, offsets: Vec<usize> },
    ObservableInclude { index: usize, offsets: Vec<usize> },
}

impl Instruction {
    /// qubit targets of this instruction, empty for annotations
    pub fn targets(&self) -> &[QubitIndex] {
        match self {
            Self::Reset(targets) | Self::Measure(targets) | Self::Hadamard(targets) => targets,
            Self::TwoQubit { targets, .. }
            | Self::XError { targets, .. }
            | Self::Depolarize1 { targets, .. }
            | Self::Depolarize2 { targets, .. } => targets,
            Self::QubitCoords { .. } | Self::Tick | Self::Detector { .. } | Self::ObservableInclude { .. } => &[],
        }
    }
    /// an operation that would be malformed without targets
    pub fn requires_targets(&self) -> bool {
        !matches!(
            self,
            Self::QubitCoords { .. } | Self::Tick | Self::Detector { .. } | Self::ObservableInclude { .. }
        )
    }
}

fn write_targets<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, targets: &[T]) -> std::fmt::Result {
    for target in targets.iter() {
        write!(f, " {}", target)?;
    }
    Ok(())
}

fn write_records(f: &mut std::fmt::Formatter<'_>, offsets: &[usize]) -> std::fmt::Result {
    for offset in offsets.iter() {
        write!(f, " rec[-{}]", offset)?;
    }
    Ok(())
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QubitCoords { coordinate, qubit } => write!(f, "QUBIT_COORDS{} {}", coordinate, qubit),
            Self::Reset(targets) => {
                f.write_str("R")?;
                write_targets(f, targets)
            }
            Self::Measure(targets) => {
                f.write_str("M")?;
                write_targets(f, targets)
            }
            Self::Hadamard(targets) => {
                f.write_str("H")?;
                write_targets(f, targets)
            }
            Self::TwoQubit { gate, targets } => {
                write!(f, "{}", gate)?;
                write_targets(f, targets)
            }
            Self::XError { p, targets } => {
                write!(f, "X_ERROR({})", p)?;
                write_targets(f, targets)
            }
            Self::Depolarize1 { p, targets } => {
                write!(f, "DEPOLARIZE1({})", p)?;
                write_targets(f, targets)
            }
            Self::Depolarize2 { p, targets } => {
                write!(f, "DEPOLARIZE2({})", p)?;
                write_targets(f, targets)
            }
            Self::Tick => f.write_str("TICK"),
            Self::Detector { coordinate, offsets } => {
                write!(f, "DETECTOR{}", coordinate)?;
                write_records(f, offsets)
            }
            Self::ObservableInclude { index, offsets } => {
                write!(f, "OBSERVABLE_INCLUDE({})", index)?;
                write_records(f, offsets)
            }
        }
    }
}

/// split `NAME(args) rest` into name, optional argument string and the remaining tokens
fn split_head(line: &str) -> Result<(&str, Option<&str>, &str), String> {
    let whitespace = line.find(char::is_whitespace).unwrap_or(line.len());
    match line.find('(') {
        Some(open) if open < whitespace => {
            let close = line[open..]
                .find(')')
                .map(|close| open + close)
                .ok_or_else(|| format!("missing closing parenthesis in `{}`", line))?;
            let rest = &line[close + 1..];
            if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
                return Err(format!("malformed arguments in `{}`", line));
            }
            Ok((&line[..open], Some(&line[open + 1..close]), rest.trim()))
        }
        _ => Ok((&line[..whitespace], None, line[whitespace..].trim())),
    }
}

fn parse_probability(args: Option<&str>) -> Result<f64, String> {
    let args = args.ok_or_else(|| "missing probability argument".to_string())?;
    let p: f64 = args.trim().parse().map_err(|_| format!("invalid probability `{}`", args))?;
    if !(0. ..=1.).contains(&p) {
        return Err(format!("probability {} out of range", p));
    }
    Ok(p)
}

fn parse_coordinate(args: Option<&str>) -> Result<Coordinate, String> {
    let args = args.ok_or_else(|| "missing coordinate arguments".to_string())?;
    let values = args
        .split(',')
        .map(|value| value.trim().parse::<f64>().map_err(|_| format!("invalid coordinate `{}`", args)))
        .collect::<Result<Vec<f64>, String>>()?;
    match values.as_slice() {
        [x, y] => Ok(Coordinate::new(*x, *y)),
        _ => Err(format!("expected two coordinates, found `{}`", args)),
    }
}

fn parse_qubits(rest: &str) -> Result<Vec<QubitIndex>, String> {
    rest.split_whitespace()
        .map(|token| token.parse::<QubitIndex>().map_err(|_| format!("invalid qubit target `{}`", token)))
        .collect()
}

fn parse_pairs(rest: &str) -> Result<Vec<QubitIndex>, String> {
    let targets = parse_qubits(rest)?;
    if targets.len() % 2 != 0 {
        return Err("two-qubit operation needs an even number of targets".to_string());
    }
    for pair in targets.chunks(2) {
        if pair[0] == pair[1] {
            return Err(format!("two-qubit operation on the same qubit {}", pair[0]));
        }
    }
    Ok(targets)
}

fn parse_records(rest: &str) -> Result<Vec<usize>, String> {
    rest.split_whitespace()
        .map(|token| {
            token
                .strip_prefix("rec[-")
                .and_then(|token| token.strip_suffix(']'))
                .and_then(|offset| offset.parse::<usize>().ok())
                .filter(|&offset| offset > 0)
                .ok_or_else(|| format!("invalid measurement record target `{}`", token))
        })
        .collect()
}

impl FromStr for Instruction {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (name, args, rest) = split_head(line.trim())?;
        let no_args = |instruction: Instruction| {
            if args.is_some() {
                Err(format!("`{}` takes no arguments", name))
            } else {
                Ok(instruction)
            }
        };
        match name {
            "QUBIT_COORDS" => {
                let coordinate = parse_coordinate(args)?;
                match parse_qubits(rest)?.as_slice() {
                    [qubit] => Ok(Self::QubitCoords { coordinate, qubit: *qubit }),
                    _ => Err("QUBIT_COORDS takes exactly one qubit".to_string()),
                }
            }
            "R" => no_args(Self::Reset(parse_qubits(rest)?)),
            "M" => no_args(Self::Measure(parse_qubits(rest)?)),
            "H" => no_args(Self::Hadamard(parse_qubits(rest)?)),
            "CX" => no_args(Self::TwoQubit { gate: EntanglingGate::Cx, targets: parse_pairs(rest)? }),
            "ISWAP" => no_args(Self::TwoQubit { gate: EntanglingGate::Iswap, targets: parse_pairs(rest)? }),
            "X_ERROR" => Ok(Self::XError { p: parse_probability(args)?, targets: parse_qubits(rest)? }),
            "DEPOLARIZE1" => Ok(Self::Depolarize1 { p: parse_probability(args)?, targets: parse_qubits(rest)? }),
            "DEPOLARIZE2" => Ok(Self::Depolarize2 { p: parse_probability(args)?, targets: parse_pairs(rest)? }),
            "TICK" => {
                if !rest.is_empty() {
                    return Err("TICK takes no targets".to_string());
                }
                no_args(Self::Tick)
            }
            "DETECTOR" => Ok(Self::Detector { coordinate: parse_coordinate(args)?, offsets: parse_records(rest)? }),
            "OBSERVABLE_INCLUDE" => {
                let args = args.ok_or_else(|| "missing observable index".to_string())?;
                let index = args.trim().parse().map_err(|_| format!("invalid observable index `{}`", args))?;
                Ok(Self::ObservableInclude { index, offsets: parse_records(rest)? })
            }
            _ => Err(format!("unknown instruction `{}`", name)),
        }
    }
}

/// a parsed program together with the counts a sampler needs
#[derive(Debug, Clone)]
pub struct Circuit {
    pub instructions: Vec<Instruction>,
    /// one more than the largest qubit index in use
    pub num_qubits: usize,
    pub num_measurements: usize,
    pub num_detectors: usize,
    pub num_observables: usize,
}

impl FromStr for Circuit {
    type Err = StemError;

    #[allow(clippy::unnecessary_cast)]
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut circuit = Circuit {
            instructions: vec![],
            num_qubits: 0,
            num_measurements: 0,
            num_detectors: 0,
            num_observables: 0,
        };
        for (line_index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let syntax_error = |message: String| StemError::CircuitSyntax {
                line: line_index + 1,
                message,
            };
            let instruction: Instruction = trimmed.parse().map_err(syntax_error)?;
            if let Instruction::QubitCoords { qubit, .. } = &instruction {
                circuit.num_qubits = circuit.num_qubits.max(*qubit as usize + 1);
            }
            for &qubit in instruction.targets() {
                circuit.num_qubits = circuit.num_qubits.max(qubit as usize + 1);
            }
            match &instruction {
                Instruction::Measure(targets) => circuit.num_measurements += targets.len(),
                Instruction::Detector { offsets, .. } | Instruction::ObservableInclude { offsets, .. } => {
                    // no forward reference: `rec[-k]` must already exist
                    if let Some(&offset) = offsets.iter().find(|&&offset| offset > circuit.num_measurements) {
                        return Err(syntax_error(format!(
                            "rec[-{}] refers before the start of the record ({} measurements so far)",
                            offset, circuit.num_measurements
                        )));
                    }
                    match &instruction {
                        Instruction::Detector { .. } => circuit.num_detectors += 1,
                        Instruction::ObservableInclude { index, .. } => {
                            circuit.num_observables = circuit.num_observables.max(index + 1)
                        }
                        _ => unreachable!(),
                    }
                }
                _ => {}
            }
            circuit.instructions.push(instruction);
        }
        Ok(circuit)
    }
}
