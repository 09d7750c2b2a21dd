//! Runtime settings and command line

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "ctrl2osc";
const CONFIG_FILE: &str = "config.json";

/// Forward a wheel or gamepad to OSC and drive its force feedback from OSC
#[derive(Parser, Debug, Clone)]
#[command(name = "ctrl2osc", version, about)]
pub struct Cli {
    /// Profile store (.json, or .toml to use TOML)
    #[arg(long, env = "CTRL2OSC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device index to open at startup
    #[arg(long, env = "CTRL2OSC_DEVICE")]
    pub device: Option<usize>,

    /// Profile to activate at startup
    #[arg(long, env = "CTRL2OSC_PROFILE")]
    pub profile: Option<String>,

    /// Print the connected devices and exit
    #[arg(long, env = "CTRL2OSC_LIST_DEVICES")]
    pub list_devices: bool,

    /// Open the device but do not start streaming
    #[arg(long, env = "CTRL2OSC_NO_STREAM")]
    pub no_stream: bool,

    #[arg(long, env = "CTRL2OSC_POLL_INTERVAL_MS", default_value_t = 10)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "CTRL2OSC_PREVIEW_INTERVAL_MS", default_value_t = 20)]
    pub preview_interval_ms: u64,

    /// Log every message at debug level
    #[arg(short, long, env = "CTRL2OSC_VERBOSE")]
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct BridgeSettings {
    pub poll_interval: Duration,
    pub preview_interval: Duration,
    /// How long a stopping listener may take before it is aborted
    pub listener_grace: Duration,
    pub config_path: PathBuf,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            preview_interval: Duration::from_millis(20),
            listener_grace: Duration::from_secs(1),
            config_path: default_config_path(),
        }
    }
}

impl BridgeSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            // a zero period would make tokio's interval panic
            poll_interval: Duration::from_millis(cli.poll_interval_ms.max(1)),
            preview_interval: Duration::from_millis(cli.preview_interval_ms.max(1)),
            config_path: cli.config.clone().unwrap_or_else(default_config_path),
            ..Self::default()
        }
    }
}

/// `<config dir>/ctrl2osc/config.json`, or `config.json` in the working directory
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(mut path) => {
            path.push(APP_DIR);
            path.push(CONFIG_FILE);
            path
        }
        None => PathBuf::from(CONFIG_FILE),
    }
}
