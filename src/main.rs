use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{error, info};
#[cfg(unix)]
use log::warn;

use servicectl::cli::Args;
use servicectl::config::{ServiceConfig, program_dir, resolve_config_path};
use servicectl::outcome::OutcomeStatus;
use servicectl::service_host::{self, HostCommand};
use servicectl::{EventLog, Outcome, Platform, ServiceDescriptor, SystemRunner, Verb, controller, logging};

/// Exit code for a missing or unknown verb
const EXIT_USAGE: i32 = 2;

fn main() {
    logging::init();

    let args = Args::parse();
    if let Some(hosted) = HostCommand::from_args(&args) {
        // started by the SCM, not by a user
        if let Err(e) = service_host::run(hosted) {
            error!("{e:#}");
            process::exit(1);
        }
        return;
    }

    let Some(verb) = args.verb else {
        // no action requested: show usage and do nothing
        let _ = Args::command().print_help();
        process::exit(EXIT_USAGE);
    };

    let descriptor = match load_descriptor(&args) {
        Ok(d) => d,
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    };

    warn_if_unprivileged(verb);

    let platform = Platform::current();
    info!("{verb} {} ({platform})", descriptor.name);

    let outcome = controller::run(
        platform,
        verb,
        &descriptor,
        Arc::new(SystemRunner),
        EventLog::new(descriptor.name.clone()),
    );

    if let Err(e) = report(&outcome, args.json) {
        error!("{e:#}");
    }
    process::exit(outcome.exit_code());
}

fn load_descriptor(args: &Args) -> Result<ServiceDescriptor> {
    let base_dir = program_dir().context("Failed to locate the program directory")?;
    let cfg_path = resolve_config_path(args.config.as_deref(), &base_dir);

    let cfg = ServiceConfig::load(&cfg_path)
        .with_context(|| format!("Failed to load configuration from {}", cfg_path.display()))?;

    ServiceDescriptor::from_config(&cfg, &base_dir)
        .with_context(|| format!("Invalid service definition in {}", cfg_path.display()))
}

fn report(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?;
        println!("{text}");
        return Ok(());
    }
    match outcome.status {
        OutcomeStatus::Success | OutcomeStatus::AlreadyInDesiredState => println!("{}", outcome.detail),
        OutcomeStatus::NotInstalled | OutcomeStatus::Error => eprintln!("{}", outcome.detail),
    }
    Ok(())
}

/// Native managers only accept registration changes from an administrator
#[cfg(unix)]
fn warn_if_unprivileged(verb: Verb) {
    if verb != Verb::Status && !nix::unistd::Uid::effective().is_root() {
        warn!("not running as root; {verb} will likely be refused by the service manager");
    }
}

#[cfg(not(unix))]
fn warn_if_unprivileged(_verb: Verb) {}
