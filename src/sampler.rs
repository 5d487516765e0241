//! Detector Samplers
//!
//! The seam between circuit generation and simulation. A sampler takes a program text and returns, for every shot,
//! which detectors fired. Two implementations exist: [`StimCliSampler`] hands the program to an installed `stim`
//! executable, and [`crate::frame_sampler::FrameSampler`] runs a built-in Pauli-frame simulation.
//!

use super::util::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

/// detection events of a batch of shots, `shots[s][k]` is whether detector `k` fired in shot `s`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectorSamples {
    pub detector_num: usize,
    pub shots: Vec<Vec<bool>>,
}

impl DetectorSamples {
    pub fn new(detector_num: usize) -> Self {
        Self {
            detector_num,
            shots: vec![],
        }
    }

    pub fn shot_num(&self) -> usize {
        self.shots.len()
    }

    /// number of shots in which at least one detector fired
    pub fn fired_shot_num(&self) -> usize {
        self.shots.iter().filter(|shot| shot.iter().any(|&fired| fired)).count()
    }

    /// read the `01` text format: one line per shot, one character per detector; a program without
    /// detectors yields empty lines
    pub fn from_01(content: &str) -> Result<Self, StemError> {
        let mut samples = Self::new(0);
        for (line_index, line) in content.lines().enumerate() {
            let line = line.trim_end();
            let shot = line
                .chars()
                .map(|c| match c {
                    '0' => Ok(false),
                    '1' => Ok(true),
                    _ => Err(StemError::Simulator(format!(
                        "unexpected character `{}` in sample line {}",
                        c,
                        line_index + 1
                    ))),
                })
                .collect::<Result<Vec<bool>, StemError>>()?;
            if samples.shots.is_empty() {
                samples.detector_num = shot.len();
            } else if shot.len() != samples.detector_num {
                return Err(StemError::Simulator(format!(
                    "sample line {} has {} detectors, expecting {}",
                    line_index + 1,
                    shot.len(),
                    samples.detector_num
                )));
            }
            samples.shots.push(shot);
        }
        Ok(samples)
    }

    pub fn to_01(&self) -> String {
        let mut content = String::with_capacity(self.shots.len() * (self.detector_num + 1));
        for shot in self.shots.iter() {
            content.extend(shot.iter().map(|&fired| if fired { '1' } else { '0' }));
            content.push('\n');
        }
        content
    }
}

pub trait DetectorSampler {
    /// sample `shots` shots of the program; a given seed makes the result reproducible
    fn sample_detectors(&self, circuit: &str, shots: usize, seed: Option<u64>) -> Result<DetectorSamples, StemError>;
}

/// fraction of shots in which any detector fired
pub fn logical_error_rate(
    sampler: &dyn DetectorSampler,
    circuit: &str,
    shots: usize,
    seed: Option<u64>,
) -> Result<f64, StemError> {
    if shots == 0 {
        return Err(StemError::InvalidParameter("shots must be a positive integer".to_string()));
    }
    let samples = sampler.sample_detectors(circuit, shots, seed)?;
    if samples.shot_num() != shots {
        return Err(StemError::Simulator(format!(
            "requested {} shots but the sampler returned {}",
            shots,
            samples.shot_num()
        )));
    }
    Ok(samples.fired_shot_num() as f64 / shots as f64)
}

/// delegates to `stim sample_dets`, feeding the program through stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StimCliSampler {
    /// executable name or path
    #[serde(default = "stim_cli_sampler_default_configs::binary")]
    pub binary: String,
}

pub mod stim_cli_sampler_default_configs {
    pub fn binary() -> String {
        "stim".to_string()
    }
}

impl Default for StimCliSampler {
    fn default() -> Self {
        Self {
            binary: stim_cli_sampler_default_configs::binary(),
        }
    }
}

impl StimCliSampler {
    pub fn new_config(config: serde_json::Value) -> Result<Self, StemError> {
        serde_json::from_value(config).map_err(|err| StemError::InvalidParameter(format!("stim sampler config: {err}")))
    }

    fn command_args(shots: usize, seed: Option<u64>) -> Vec<String> {
        let mut args = vec![
            "sample_dets".to_string(),
            "--shots".to_string(),
            shots.to_string(),
            "--out_format".to_string(),
            "01".to_string(),
        ];
        if let Some(seed) = seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        args
    }
}

impl DetectorSampler for StimCliSampler {
    fn sample_detectors(&self, circuit: &str, shots: usize, seed: Option<u64>) -> Result<DetectorSamples, StemError> {
        let spawned = Command::new(&self.binary)
            .args(Self::command_args(shots, seed))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StemError::MissingOptionalDependency(format!(
                    "cannot find simulator executable `{}`, install it with `pip install stim` or use the built-in frame sampler",
                    self.binary
                )))
            }
            Err(err) => return Err(StemError::Simulator(format!("cannot start `{}`: {}", self.binary, err))),
        };
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| StemError::Simulator("simulator stdin unavailable".to_string()))?;
            stdin
                .write_all(circuit.as_bytes())
                .map_err(|err| StemError::Simulator(format!("writing program to simulator: {}", err)))?;
        } // close stdin so that the simulator starts
        let output = child
            .wait_with_output()
            .map_err(|err| StemError::Simulator(format!("waiting for simulator: {}", err)))?;
        if !output.status.success() {
            return Err(StemError::Simulator(format!(
                "`{}` exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8(output.stdout).map_err(|err| StemError::Simulator(format!("{err}")))?;
        DetectorSamples::from_01(&stdout)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// replays a fixed pattern so that rates are exact
    pub struct PatternSampler {
        pub pattern: Vec<Vec<bool>>,
    }

    impl DetectorSampler for PatternSampler {
        fn sample_detectors(&self, _circuit: &str, shots: usize, _seed: Option<u64>) -> Result<DetectorSamples, StemError> {
            let detector_num = self.pattern.first().map(|shot| shot.len()).unwrap_or(0);
            let mut samples = DetectorSamples::new(detector_num);
            for index in 0..shots {
                samples.shots.push(self.pattern[index % self.pattern.len()].clone());
            }
            Ok(samples)
        }
    }

    #[test]
    fn sampler_logical_error_rate_counts_any_detector() {
        // cargo test sampler_logical_error_rate_counts_any_detector -- --nocapture
        let sampler = PatternSampler {
            pattern: vec![
                vec![false, false, false],
                vec![true, false, false],
                vec![false, true, true],
                vec![false, false, false],
            ],
        };
        assert_eq!(logical_error_rate(&sampler, "", 4, None).unwrap(), 0.5);
        assert_eq!(logical_error_rate(&sampler, "", 1, Some(3)).unwrap(), 0.);
        assert_eq!(logical_error_rate(&sampler, "", 2, None).unwrap(), 0.5);
    }

    #[test]
    fn sampler_rejects_zero_shots() {
        // cargo test sampler_rejects_zero_shots -- --nocapture
        let sampler = PatternSampler { pattern: vec![vec![true]] };
        assert!(matches!(
            logical_error_rate(&sampler, "", 0, None),
            Err(StemError::InvalidParameter(_))
        ));
    }

    #[test]
    fn sampler_detector_samples_01_format() {
        // cargo test sampler_detector_samples_01_format -- --nocapture
        let samples = DetectorSamples::from_01("0100\n0000\n1111\n").unwrap();
        assert_eq!(samples.detector_num, 4);
        assert_eq!(samples.shot_num(), 3);
        assert_eq!(samples.fired_shot_num(), 2);
        assert_eq!(samples.to_01(), "0100\n0000\n1111\n");
        assert!(matches!(DetectorSamples::from_01("01\n012\n"), Err(StemError::Simulator(_))));
        assert!(matches!(DetectorSamples::from_01("01\n0\n"), Err(StemError::Simulator(_))));
        assert!(matches!(DetectorSamples::from_01("0100\n\n1111\n"), Err(StemError::Simulator(_))));
        // a program without detectors still reports one empty line per shot
        let empty = DetectorSamples::from_01("\n\n\n").unwrap();
        assert_eq!(empty.shot_num(), 3);
        assert_eq!(empty.detector_num, 0);
        assert_eq!(empty.fired_shot_num(), 0);
    }

    #[test]
    fn sampler_stim_cli_missing_binary() {
        // cargo test sampler_stim_cli_missing_binary -- --nocapture
        let sampler = StimCliSampler::new_config(json!({"binary": "surface-stem-no-such-simulator"})).unwrap();
        match sampler.sample_detectors("M 0\n", 10, Some(1)) {
            Err(StemError::MissingOptionalDependency(message)) => {
                println!("{message}");
                assert!(message.contains("pip install stim"));
            }
            other => panic!("expected missing dependency, got {:?}", other),
        }
        assert_eq!(StimCliSampler::new_config(json!({})).unwrap().binary, "stim");
        assert!(StimCliSampler::new_config(json!({"path": "stim"})).is_err());
    }

    #[test]
    fn sampler_stim_cli_arguments() {
        // cargo test sampler_stim_cli_arguments -- --nocapture
        assert_eq!(
            StimCliSampler::command_args(100, Some(7)).join(" "),
            "sample_dets --shots 100 --out_format 01 --seed 7"
        );
        assert_eq!(StimCliSampler::command_args(5, None).join(" "), "sample_dets --shots 5 --out_format 01");
    }
}
