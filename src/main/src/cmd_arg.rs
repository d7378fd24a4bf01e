use clap::Parser;

/// Console for managed blockchain node deployments
#[derive(Parser, Debug)]
pub struct CmdArgs {
    /// Directory holding `files/api_config.yaml` and the node store
    pub files_dir: String,
    /// Serve synthetic telemetry instead of polling node rpc endpoints
    #[arg(long)]
    pub mock: bool,
}
