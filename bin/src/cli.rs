//! Parse from either cli or env var
use std::{net::Ipv4Addr, time::Duration};

pub use clap::Parser;
use clap::{Subcommand, ValueEnum};
use ipnet::Ipv4Net;

/// default coordinator address
pub static DEFAULT_SERVER: &str = "127.0.0.1:8888";
/// default per-request timeout (secs)
pub const DEFAULT_TIMEOUT: u64 = 5;
/// renew this long before the lease expires (secs)
pub const DEFAULT_RENEW_MARGIN: u64 = 3600;
/// default log level. Can use this argument or SUBNETCTL_LOG env var
pub static DEFAULT_SUBNETCTL_LOG: &str = "info";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(author, name = "subnetctl", bin_name = "subnetctl", about, long_about = None)]
/// parses from cli & environment var. subnetctl will load `.env` in the working dir as well
pub struct Config {
    /// coordinator address as `host:port`
    #[clap(long, env = "SUBNETCTL_SERVER", value_parser, default_value = DEFAULT_SERVER)]
    pub server: String,
    /// network to operate on, empty for the default network
    #[clap(long, env = "SUBNETCTL_NETWORK", value_parser, default_value_t = String::new())]
    pub network: String,
    /// per-request timeout in seconds
    #[clap(long, env = "SUBNETCTL_TIMEOUT", value_parser, default_value_t = DEFAULT_TIMEOUT)]
    pub timeout: u64,
    /// set the log level. All valid RUST_LOG arguments are accepted
    #[clap(long, env, value_parser, default_value = DEFAULT_SUBNETCTL_LOG)]
    pub subnetctl_log: String,
    /// log output format
    #[clap(long, env = "SUBNETCTL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Standard)]
    pub log_format: LogFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// print the network configuration as JSON
    Config,
    /// acquire a subnet lease and print it as JSON
    Acquire {
        /// public address other nodes reach this one on
        #[clap(long, value_parser)]
        public_ip: Ipv4Addr,
        /// backend the lease is used with
        #[clap(long, value_parser, default_value_t = String::new())]
        backend_type: String,
        /// keep renewing the lease until interrupted
        #[clap(long)]
        hold: bool,
        /// with `--hold`, renew this many seconds before expiry
        #[clap(long, value_parser, default_value_t = DEFAULT_RENEW_MARGIN)]
        renew_margin: u64,
    },
    /// stream lease changes as JSON lines until interrupted
    Watch {
        /// subnet held by this node, its changes are not printed
        #[clap(long, value_parser)]
        own_subnet: Option<Ipv4Net>,
    },
}

/// log as "json", "pretty" or "standard" (unstructured)
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Standard,
    Json,
    Pretty,
}

impl Config {
    /// timeout applied to each coordinator request
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
