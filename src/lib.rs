pub mod errors;
pub mod ms;
pub mod network;
pub mod pipeline;
pub mod scoring;
pub mod utils;

pub use errors::SpecMeshError;
pub use pipeline::{
    build_network,
    build_network_with,
    NetworkResult,
    PipelineConfig,
};
