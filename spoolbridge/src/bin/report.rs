use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;

use spoolbridge::cli;
use spoolbridge::report::{self, ReportSettings};

#[tokio::main]
pub async fn main() {
    cli::init_logging();

    // parse command line arguments
    let cli_args = cli::parse_args(
        cli::command(
            "filament-report",
            "List the filament changes of a G-code file with their Spoolman details",
        )
        .arg(
            clap::arg!(<GCODE_FILE> "G-code file, a bare name is looked up in GCODE_PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        ),
    );

    cli::exit_on_error(run(cli_args).await);
}

async fn run(cli_args: ArgMatches) -> anyhow::Result<()> {
    let file = cli_args
        .get_one::<PathBuf>("GCODE_FILE")
        .context("missing G-code file argument")?;

    // configuration errors stop us before any request
    let config = cli::load_config(&cli_args).await?;
    let settings = ReportSettings::from_config(&config)?;

    report::run(&settings, file, &mut std::io::stdout()).await?;

    return Ok(());
}
