//! tracing configuration
use anyhow::Result;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{
        self,
        format::{Format, PrettyFields},
    },
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

use crate::cli::LogFormat;

/// Logging setup. Logs go to stderr so stdout only carries command output.
#[derive(Debug)]
pub struct Config {
    /// formatting to apply to logs
    pub log_frmt: LogFormat,
}

impl Config {
    /// Install the global subscriber
    pub fn parse(subnetctl_log: &str, log_frmt: LogFormat) -> Result<Self> {
        // Log level comes from SUBNETCTL_LOG
        let filter = filter(subnetctl_log)?;

        match log_frmt {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .event_format(Format::default().pretty().with_source_location(false))
                            .fmt_fields(PrettyFields::new())
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            LogFormat::Standard => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .init();
            }
        }

        Ok(Self { log_frmt })
    }
}

fn filter(directives: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_new("info"))?
        .add_directive("hyper=off".parse()?))
}
