//! Command Line Interface

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use lh_core::constants::paths;

#[derive(Parser, Debug)]
#[command(name = "lumenhubd")]
#[command(version)]
#[command(about = "lumenhub - home lighting hub daemon")]
#[command(long_about = "lumenhub - home lighting hub daemon

Turns RF remote presses and motion sensor datagrams into smooth brightness
ramps on networked LED and lamp dimmers.

EXAMPLES:
    lumenhubd                                   Run with /etc/lumenhub/config.json
    lumenhubd --rf-source /run/lumenhub/rf      Read RF codes from a FIFO
    lumenhubd --print-default-config > config.json

ENVIRONMENT VARIABLES:
    LUMENHUB_LOG=debug     Log filter (trace, debug, info, warn, error)

FILES:
    /etc/lumenhub/config.json          Hub configuration
    /var/lib/lumenhub/settings.json    Persisted lighting state")]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = paths::CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the datagram bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Override the persisted state file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// File or FIFO the RF decoder writes codes to
    #[arg(long)]
    pub rf_source: Option<PathBuf>,

    /// Print the built-in configuration as JSON and exit
    #[arg(long)]
    pub print_default_config: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut lh_core::HubConfig) {
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(settings) = &self.settings {
            config.paths.settings_file = settings.clone();
        }
        if let Some(rf) = &self.rf_source {
            config.paths.rf_source = Some(rf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let cli = Cli::parse_from([
            "lumenhubd",
            "--bind",
            "127.0.0.1:4000",
            "--rf-source",
            "/tmp/rf",
        ]);
        assert_eq!(cli.config, PathBuf::from(paths::CONFIG_FILE));

        let mut config = lh_core::HubConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.network.bind_address.port(), 4000);
        assert_eq!(config.paths.rf_source, Some(PathBuf::from("/tmp/rf")));
        assert_eq!(
            config.paths.settings_file,
            PathBuf::from(paths::SETTINGS_FILE)
        );
    }
}
