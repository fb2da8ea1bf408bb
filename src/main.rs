extern crate log;
extern crate pretty_env_logger;

use std::error::Error;
use std::fs;
use std::path::Path;

use clap::Parser;
use serde::{
    Deserialize,
    Serialize,
};

use specmesh::ms::io;
use specmesh::ms::spectrum::SpectrumSet;
use specmesh::{
    build_network,
    PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: String,
    #[arg(short, long, default_value = "specmesh_output")]
    output_dir: String,
    #[arg(long, action)]
    write_template: bool,
    /// Parent spectra table (ID, mz, MS2)
    #[arg(long, required_unless_present = "write_template")]
    parent: Option<String>,
    /// Product spectra table (ID, mz, MS2)
    #[arg(long, required_unless_present = "write_template")]
    product: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
struct OutputConfig {
    similarities_csv: String,
    partition_csv: String,
    summary_json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            similarities_csv: "similarities.csv".into(),
            partition_csv: "partition.csv".into(),
            summary_json: Some("summary.json".into()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    pipeline: PipelineConfig,
    output_config: OutputConfig,
}

impl Config {
    fn from_toml(path: &str) -> Result<Self, Box<dyn Error>> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if args.write_template {
        let config = Config::default();
        let config_str = toml::to_string_pretty(&config)?;

        let out_path = args.config;
        if fs::metadata(&out_path).is_ok() {
            return Err(format!("File already exists: {}", out_path).into());
        }
        std::fs::write(&out_path, config_str)?;
        println!("Wrote default config to {}", out_path);
        return Ok(());
    }

    let config = Config::from_toml(&args.config)?;

    pretty_env_logger::init();

    let (Some(parent_path), Some(product_path)) = (args.parent, args.product) else {
        return Err("Both --parent and --product are required".into());
    };

    let out_path_dir = Path::new(&args.output_dir);
    if !out_path_dir.exists() {
        fs::create_dir_all(out_path_dir)?;
    }

    let parents = io::read_spectra_table(&parent_path, SpectrumSet::Parent)?;
    let products = io::read_spectra_table(&product_path, SpectrumSet::Product)?;

    let result = build_network(parents, products, &config.pipeline)?;

    let out_config = &config.output_config;
    io::write_similarities_csv(
        &result.records,
        out_path_dir.join(&out_config.similarities_csv),
    )?;
    io::write_partition_csv(
        &result.node_summaries(),
        out_path_dir.join(&out_config.partition_csv),
    )?;

    let summary = result.summary();
    if let Some(ref path) = out_config.summary_json {
        if let Err(e) = io::write_summary_json(&summary, out_path_dir.join(path)) {
            log::warn!("Error writing summary: {:?}", e);
        }
    }

    println!(
        "nodes: {}, edges: {}, communities: {}, modularity: {:.4}",
        summary.num_nodes, summary.num_edges, summary.num_communities, summary.modularity
    );
    Ok(())
}

#[cfg(test)]
mod test_config {
    use super::*;
    use specmesh::network::community::CommunityMethod;

    #[test]
    fn test_flat_toml_sections() {
        let config: Config = toml::from_str(
            r#"
            community_method = "connected_components"

            [network_config]
            similarity_threshold = 0.8

            [output_config]
            summary_json = "run.json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.pipeline.community_method,
            CommunityMethod::ConnectedComponents
        );
        assert_eq!(config.pipeline.network_config.similarity_threshold, 0.8);
        assert_eq!(config.pipeline.louvain_config.seed, 42);
        assert_eq!(config.output_config.summary_json.as_deref(), Some("run.json"));
        assert_eq!(config.output_config.partition_csv, "partition.csv");
    }

    #[test]
    fn test_template_loads_back() {
        let template = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(template.contains("[louvain_config]"));
        let config: Config = toml::from_str(&template).unwrap();
        assert!(config.pipeline.validate().is_ok());
        assert_eq!(config.output_config.similarities_csv, "similarities.csv");
    }
}
