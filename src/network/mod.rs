pub mod community;
pub mod edges;
pub mod graph;
pub mod louvain;
pub mod screening;

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    Result,
    SpecMeshError,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct NetworkConfig {
    /// A pair is kept only when its similarity is strictly above this.
    pub similarity_threshold: f64,
    pub show_progress: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            similarity_threshold: 0.5,
            show_progress: true,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0. ..=1.).contains(&self.similarity_threshold) {
            return Err(SpecMeshError::Config(format!(
                "similarity_threshold must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_network_config {
    use super::*;

    #[test]
    fn test_threshold_range_is_closed() {
        for threshold in [0., 0.5, 1.] {
            let config = NetworkConfig {
                similarity_threshold: threshold,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{}", threshold);
        }
        for threshold in [-0.01, 1.0001, f64::NAN] {
            let config = NetworkConfig {
                similarity_threshold: threshold,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{}", threshold);
        }
    }
}
