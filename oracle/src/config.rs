//! Command-line and file configuration, following the same
//! clap-derive-plus-serde shape the wallet crate this oracle grew out of
//! uses for its own config.

use alloy_primitives::Address;
use clap::Parser;
use serde::{Deserialize, Serialize};
use zion_audit_common::logging::{LogConfig, LogLevel};

#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[clap(
    version,
    about = "Off-chain audit oracle for the Zion proof-of-stake network",
    styles = zion_audit_common::get_cli_styles()
)]
pub struct Config {
    /// JSON-RPC endpoint of the Zion node to index.
    #[clap(long, env = "ZION_RPC_URL", default_value = "http://127.0.0.1:8545")]
    pub rpc_url: String,

    /// Address of the node-manager governance contract.
    #[clap(long, env = "ZION_NODE_MANAGER_CONTRACT")]
    pub node_manager_contract: Address,

    /// Postgres connection string for the state store.
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Max Postgres connections held in the pool.
    #[clap(long, default_value_t = 10)]
    pub db_max_connections: u32,

    /// Address the query API HTTP server binds to.
    #[clap(long, default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Worker thread count for the query API HTTP server.
    #[clap(long, default_value_t = 2)]
    pub http_workers: usize,

    /// How often the listener polls the node for a new tip, in milliseconds.
    #[clap(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// How long to sleep before retrying a block after a transient error,
    /// in milliseconds.
    #[clap(long, default_value_t = 1000)]
    pub retry_interval_ms: u64,

    /// Reject a duplicate `CreateValidator` for an already-known consensus
    /// address instead of silently overwriting it. Off by default to match
    /// the permissive behavior of the chain this oracle was built against;
    /// operators who want the stricter guarantee can opt in.
    #[clap(long)]
    pub strict_duplicate_create_validator: bool,

    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,

    #[clap(long, default_value = "logs/")]
    pub logs_path: String,

    #[clap(long)]
    pub disable_file_logging: bool,
}

impl Config {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            file_level: self.file_log_level,
            logs_path: self.logs_path.clone(),
            filename_prefix: "zion-audit-oracle".to_owned(),
            disable_file_logging: self.disable_file_logging,
        }
    }
}
