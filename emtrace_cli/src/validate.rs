use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use std::path::PathBuf;
use std::process::ExitCode;

/// Validate a parameter deck without running it.
#[derive(Parser)]
pub struct Opts {
    /// Path to the YAML parameter deck.
    #[arg(value_hint = ValueHint::FilePath)]
    deck: PathBuf,
}

impl Subcommand for Opts {
    fn run(&self, _cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let deck = helpers::load_deck(&self.deck)?;
        // also exercise the geometry checks that only run at build time
        emtrace::build_detector(&deck)?;
        println!("parameter deck '{}' is valid", self.deck.display());
        Ok(ExitCode::SUCCESS)
    }
}
