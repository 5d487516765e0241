extern crate cfg_if;
extern crate rand_xoshiro;
extern crate serde;
#[macro_use] extern crate serde_json;
extern crate derivative;
extern crate rayon;
extern crate rand;

pub mod util;
pub mod circuit;
pub mod layout;
pub mod emitter;
pub mod stabilizer_cycle;
pub mod dynamic_codes;
pub mod sampler;
pub mod frame_sampler;
pub mod comparison;

pub use dynamic_codes::{
    hexagonal_surface_code, iswap_surface_code, static_surface_code, surface_code_circuit, walking_surface_code,
    CodeVariant,
};
pub use comparison::{compare_nested_policies, tabulate_comparison};
pub use util::StemError;
