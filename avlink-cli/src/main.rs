use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use avlink::logging::{self, LoggingMode};
use avlink::{ChannelKind, CommandValue, Endpoint, ProjectorConfig, ReceiverConfig};

mod commands;
mod output;

/// Control Pioneer-style AV receivers and PJLink projectors
#[derive(Parser, Debug)]
#[command(name = "avlink")]
#[command(version, about)]
pub struct Args {
    /// Logging mode: silent, development or debug (default: $AVLINK_LOG)
    #[arg(long, global = true)]
    pub log: Option<LoggingMode>,

    /// Print machine readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub device: DeviceCommand,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Control an AV receiver
    Receiver {
        #[command(flatten)]
        target: ReceiverTarget,

        #[command(subcommand)]
        action: ReceiverAction,
    },
    /// Control a PJLink projector
    Projector {
        #[command(flatten)]
        target: ProjectorTarget,

        #[command(subcommand)]
        action: ProjectorAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReceiverAction {
    /// Connect and print every known channel of every zone
    Status,
    /// Apply a value to a channel, e.g. `send volumePercent 1 40%`
    Send {
        channel: ChannelKind,
        zone: u8,
        /// on, off, up, down, refresh, `<n>%`, `<n>dB` or an input code
        #[arg(allow_hyphen_values = true)]
        value: CommandValue,
    },
    /// Print state changes until Ctrl+C
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum ProjectorAction {
    /// Connect and print power, mute and input
    Status,
    /// Print identification, lamps, inputs and error status
    Info,
    /// Apply a value to a channel, e.g. `send inputSource 31`
    Send {
        channel: ChannelKind,
        value: CommandValue,
    },
    /// Print state changes until Ctrl+C
    Watch,
}

#[derive(clap::Args, Debug)]
pub struct ReceiverTarget {
    /// JSON receiver configuration file
    #[arg(short, long, conflicts_with_all = ["host", "serial", "model"])]
    pub config: Option<PathBuf>,

    /// Host name or address of a networked receiver
    #[arg(long, conflicts_with = "serial")]
    pub host: Option<String>,

    /// TCP port of a networked receiver
    #[arg(long, requires = "host")]
    pub port: Option<u16>,

    /// Serial device of a directly attached receiver
    #[arg(long)]
    pub serial: Option<String>,

    /// Model name, e.g. VSX-1120
    #[arg(long)]
    pub model: Option<String>,
}

impl ReceiverTarget {
    pub fn to_config(&self) -> Result<ReceiverConfig> {
        if let Some(path) = &self.config {
            return ReceiverConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()));
        }

        let endpoint = match (&self.host, &self.serial) {
            (Some(host), None) => {
                let mut endpoint = Endpoint::tcp(host.clone());
                if let (Endpoint::Tcp { port, .. }, Some(custom)) = (&mut endpoint, self.port) {
                    *port = custom;
                }
                endpoint
            }
            (None, Some(port)) => Endpoint::serial(port.clone()),
            _ => bail!("One of --config, --host or --serial is required"),
        };

        let mut config = ReceiverConfig::new(endpoint);
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(clap::Args, Debug)]
pub struct ProjectorTarget {
    /// JSON projector configuration file
    #[arg(short, long, conflicts_with_all = ["host", "password"])]
    pub config: Option<PathBuf>,

    /// Host name or address of the projector
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port of the projector
    #[arg(long, requires = "host")]
    pub port: Option<u16>,

    /// PJLink password, when the projector requires one
    #[arg(long, env = "AVLINK_PJLINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ProjectorTarget {
    pub fn to_config(&self) -> Result<ProjectorConfig> {
        if let Some(path) = &self.config {
            return ProjectorConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()));
        }

        let Some(host) = &self.host else {
            bail!("One of --config or --host is required");
        };
        let mut config = ProjectorConfig::new(host.clone());
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(password) = &self.password {
            config = config.with_password(password.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(mode: Option<LoggingMode>) -> Result<()> {
    match mode {
        Some(mode) => logging::init_logging(mode),
        None => logging::init_logging_from_env(),
    }
    .context("Failed to initialize logging")
}

fn run(args: Args) -> Result<()> {
    match args.device {
        DeviceCommand::Receiver { target, action } => {
            let config = target.to_config()?;
            commands::run_receiver(&config, action, args.json)
        }
        DeviceCommand::Projector { target, action } => {
            let config = target.to_config()?;
            commands::run_projector(&config, action, args.json)
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log) {
        eprintln!("{e:#}");
        std::process::exit(2);
    }

    if let Err(e) = run(args) {
        error!("avlink failed: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
