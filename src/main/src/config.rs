use crate::cmd_arg::CmdArgs;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: SocketAddr,
    /// process-wide telemetry mode, fixed at startup
    pub mock: bool,
    pub file_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct YamlConfig {
    pub listen: SocketAddr,
    #[serde(default)]
    pub mock: bool,
}

fn read_yaml_config(file_path: impl AsRef<Path>) -> YamlConfig {
    tracing::info!("Running at dir: {:?}", std::env::current_dir());
    let path = file_path.as_ref().to_owned();
    let file = std::fs::File::open(file_path).unwrap_or_else(|err| {
        panic!("open config file {:?} failed, err: {:?}", path, err);
    });
    serde_yaml::from_reader(file).unwrap_or_else(|e| {
        panic!("parse yaml config file failed, err: {:?}", e);
    })
}

pub fn read_config(args: &CmdArgs) -> ApiConfig {
    let config_path = Path::new(&args.files_dir).join("files/api_config.yaml");
    let yaml_config = read_yaml_config(config_path);

    ApiConfig {
        listen: yaml_config.listen,
        mock: yaml_config.mock || args.mock,
        file_dir: PathBuf::from(&args.files_dir),
    }
}
