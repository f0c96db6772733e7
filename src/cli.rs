use std::path::PathBuf;

use clap::Parser;

use crate::outcome::Verb;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Install and control a program as a native OS service (systemd, launchd, Windows SCM)"
)]
pub struct Args {
    /// Lifecycle action to perform
    #[arg(value_enum)]
    pub verb: Option<Verb>,

    /// Path to configuration file (default: service.toml next to this executable)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Print the outcome as JSON instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Run as the SCM-facing host of service NAME (registered by `install` on Windows)
    #[arg(
        long,
        hide = true,
        value_name = "NAME",
        conflicts_with = "verb",
        requires = "log_dir",
        requires = "command"
    )]
    pub service_host: Option<String>,

    /// Directory receiving the hosted program's output
    #[arg(long, hide = true, value_name = "DIR", requires = "service_host")]
    pub log_dir: Option<PathBuf>,

    /// Program and arguments supervised by the service host
    #[arg(last = true, hide = true, value_name = "COMMAND", requires = "service_host")]
    pub command: Vec<String>,
}
