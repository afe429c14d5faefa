#![allow(clippy::missing_errors_doc)]
#![allow(missing_docs)]

mod helpers;
mod info;
mod run;
mod validate;

use anyhow::Result;
use clap::Parser;
use enum_dispatch::enum_dispatch;
use std::process::ExitCode;

#[derive(Parser)]
pub struct GlobalConfiguration {
    /// Suppress the statistics report after a run.
    #[arg(long)]
    pub quiet: bool,
}

#[enum_dispatch]
pub trait Subcommand {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode>;
}

#[enum_dispatch(Subcommand)]
#[derive(Parser)]
pub enum SubcommandEnum {
    Info(info::Opts),
    Run(run::Opts),
    Validate(validate::Opts),
}

/// Monte Carlo photon-transport simulation for emission tomography.
#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    author,
    about,
    disable_help_subcommand = true,
    name = "emtrace",
    version
)]
pub struct Opts {
    #[command(flatten)]
    pub configuration: GlobalConfiguration,
    #[command(subcommand)]
    pub subcommand: SubcommandEnum,
}
