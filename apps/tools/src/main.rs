use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::fixture::ResultsFixture;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "data/sample-data.csv")]
    fixture: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unique wells present in the fixture.
    Wells,
    /// Unique analytes present in the fixture.
    Analytes,
    /// Reading count and median per well and analyte.
    Medians,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("failed to read '{}'", cli.fixture.display()))?;
    let fixture = ResultsFixture::parse(&text)
        .with_context(|| format!("failed to parse '{}'", cli.fixture.display()))?;

    match cli.command {
        Command::Wells => {
            for well in fixture.wells() {
                println!("{well}");
            }
        }
        Command::Analytes => {
            for analyte in fixture.analytes() {
                println!("{analyte}");
            }
        }
        Command::Medians => {
            for summary in fixture.medians() {
                println!(
                    "{}\t{}\tcount={}\tmedian={}",
                    summary.well, summary.analyte, summary.count, summary.median
                );
            }
        }
    }

    Ok(())
}
