extern crate clap;
extern crate pbr;
#[macro_use]
extern crate serde_json;

use clap::{Args, Parser, Subcommand};
use pbr::ProgressBar;
use surface_stem::comparison::*;
use surface_stem::dynamic_codes::*;
use surface_stem::frame_sampler::FrameSampler;
use surface_stem::layout::Layout;
use surface_stem::sampler::{DetectorSampler, StimCliSampler};
use surface_stem::util::*;
use std::collections::BTreeMap;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Static and dynamic surface code memory experiments as Stim programs")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// print the program of one variant
    Generate {
        /// which schedule to emit
        #[clap(value_parser)]
        variant: CodeVariant,
        /// code distance
        #[clap(value_parser)]
        d: usize,
        /// number of stabilizer measurement rounds
        #[clap(value_parser)]
        rounds: usize,
        /// physical error rate of every noise channel
        #[clap(value_parser)]
        p: f64,
        /// override policy fields, e.g. `{"gate":"ISWAP","alternate_reverse":false}`
        #[clap(long, value_parser, default_value = "{}")]
        policy_config: String,
        /// write the program to this file instead of stdout
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,
    },
    /// print the qubit layout of a distance as JSON
    Layout {
        /// code distance
        #[clap(value_parser)]
        d: usize,
    },
    /// sample a static baseline and a dynamic variant and print their logical error rates
    Compare {
        /// code distance
        #[clap(value_parser)]
        d: usize,
        /// number of stabilizer measurement rounds
        #[clap(value_parser)]
        rounds: usize,
        /// physical error rate of every noise channel
        #[clap(value_parser)]
        p: f64,
        #[clap(flatten)]
        sampling: SamplingOptions,
        /// print one row per policy instead of a map
        #[clap(long, action)]
        tabulate: bool,
    },
    /// run `compare` over every combination of distances and error rates, one JSON line each
    Sweep {
        /// code distances: [a,b,c,...]
        #[clap(value_parser)]
        d_vec: String,
        /// number of stabilizer measurement rounds
        #[clap(value_parser)]
        rounds: usize,
        /// physical error rates: [a,b,c,...]
        #[clap(value_parser)]
        p_vec: String,
        #[clap(flatten)]
        sampling: SamplingOptions,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SamplerKind {
    /// built-in Pauli frame sampler
    Frame,
    /// external `stim` executable
    Stim,
}

#[derive(Args, Clone)]
struct SamplingOptions {
    /// number of sampled shots per program
    #[clap(short = 's', long, value_parser, default_value_t = 1000)]
    shots: usize,
    /// fix the random seed for reproducible statistics
    #[clap(long, value_parser)]
    seed: Option<u64>,
    #[clap(long, value_parser, default_value_t = CodeVariant::Static)]
    static_variant: CodeVariant,
    #[clap(long, value_parser, default_value_t = CodeVariant::Hexagonal)]
    dynamic_variant: CodeVariant,
    /// override fields of the dynamic variant's policy
    #[clap(long, value_parser, default_value = "{}")]
    dynamic_policy_config: String,
    #[clap(long, value_parser, default_value = "frame")]
    sampler: SamplerKind,
    /// e.g. `{"batch_size":256}` for the frame sampler or `{"binary":"/opt/stim"}` for stim
    #[clap(long, value_parser, default_value = "{}")]
    sampler_config: String,
    /// append one JSON line per sampled program with build and sampling time
    #[clap(long, value_parser)]
    profiler_output: Option<String>,
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &str, what: &str) -> Result<T, StemError> {
    serde_json::from_str(value).map_err(|err| StemError::InvalidParameter(format!("{what} `{value}`: {err}")))
}

impl SamplingOptions {
    fn sampler(&self) -> Result<Box<dyn DetectorSampler>, StemError> {
        let config: serde_json::Value = parse_json(&self.sampler_config, "sampler config")?;
        Ok(match self.sampler {
            SamplerKind::Frame => Box::new(FrameSampler::new_config(config)?),
            SamplerKind::Stim => Box::new(StimCliSampler::new_config(config)?),
        })
    }

    fn compare(
        &self,
        parameters: &CircuitParameters,
        sampler: &dyn DetectorSampler,
        profiler: &mut BenchmarkProfiler,
    ) -> Result<BTreeMap<String, ComparisonEntry>, StemError> {
        let dynamic_policy = self
            .dynamic_variant
            .policy()
            .merge_config(parse_json(&self.dynamic_policy_config, "dynamic policy config")?)?;
        compare_codes(
            [
                (STATIC_POLICY, self.static_variant.builder_name(), self.static_variant.policy()),
                (DYNAMIC_POLICY, self.dynamic_variant.builder_name(), dynamic_policy),
            ],
            parameters,
            self.shots,
            self.seed,
            sampler,
            Some(profiler),
        )
    }
}

impl Cli {
    pub fn run(self) -> Result<(), StemError> {
        match self.command {
            Commands::Generate {
                variant,
                d,
                rounds,
                p,
                policy_config,
                output,
            } => {
                let policy = variant.policy().merge_config(parse_json(&policy_config, "policy config")?)?;
                let program = DynamicSurfaceCode::new_policy(policy, d, rounds, p)?.build();
                match output {
                    Some(filename) => std::fs::write(filename, program)?,
                    None => print!("{program}"),
                }
            }
            Commands::Layout { d } => {
                println!("{}", Layout::new(d)?.snapshot());
            }
            Commands::Compare {
                d,
                rounds,
                p,
                sampling,
                tabulate,
            } => {
                let parameters = CircuitParameters::new(d, rounds, p)?;
                let sampler = sampling.sampler()?;
                let mut profiler = BenchmarkProfiler::new(sampling.profiler_output.clone())?;
                let comparison = sampling.compare(&parameters, sampler.as_ref(), &mut profiler)?;
                if tabulate {
                    println!("{}", json!(tabulate_comparison(&comparison)));
                } else {
                    println!("{}", json!(comparison));
                }
                if sampling.profiler_output.is_some() {
                    eprintln!("{}", profiler.brief());
                }
            }
            Commands::Sweep {
                d_vec,
                rounds,
                p_vec,
                sampling,
            } => {
                let d_vec: Vec<usize> = parse_json(&d_vec, "distances, should be [a,b,c,...]")?;
                let p_vec: Vec<f64> = parse_json(&p_vec, "error rates, should be [a,b,c,...]")?;
                // validate everything before the first sample
                let mut parameters_vec = Vec::with_capacity(d_vec.len() * p_vec.len());
                for &d in d_vec.iter() {
                    for &p in p_vec.iter() {
                        parameters_vec.push(CircuitParameters::new(d, rounds, p)?);
                    }
                }
                let sampler = sampling.sampler()?;
                let mut profiler = BenchmarkProfiler::new(sampling.profiler_output.clone())?;
                let mut pb = ProgressBar::on(std::io::stderr(), parameters_vec.len() as u64);
                for parameters in parameters_vec.iter() {
                    pb.message(format!("d={} p={} ", parameters.distance, parameters.p).as_str());
                    let comparison = sampling.compare(parameters, sampler.as_ref(), &mut profiler)?;
                    println!(
                        "{}",
                        json!({
                            "distance": parameters.distance,
                            "rounds": parameters.rounds,
                            "p": parameters.p,
                            "comparison": comparison,
                        })
                    );
                    pb.inc();
                }
                pb.finish();
                eprintln!();
                if sampling.profiler_output.is_some() {
                    eprintln!("{}", profiler.brief());
                }
            }
        }
        Ok(())
    }
}

fn main() {
    if let Err(err) = Cli::parse().run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
