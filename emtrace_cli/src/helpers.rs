use anyhow::{Context, Result};
use emtrace::params::Deck;
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::Table;
use std::fs::File;
use std::path::Path;

/// Loads and validates a parameter deck from a YAML file.
pub fn load_deck(path: &Path) -> Result<Deck> {
    let file = File::open(path)
        .with_context(|| format!("unable to open parameter deck '{}'", path.display()))?;
    let deck: Deck = serde_yaml::from_reader(file)
        .with_context(|| format!("unable to parse parameter deck '{}'", path.display()))?;
    deck.validate()
        .with_context(|| format!("invalid parameter deck '{}'", path.display()))?;
    Ok(deck)
}

/// The common table layout of all printed reports.
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}
