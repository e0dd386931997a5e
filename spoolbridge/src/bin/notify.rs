use anyhow::Context;
use clap::ArgMatches;

use spoolbridge::FilamentId;
use spoolbridge::cli;
use spoolbridge::notify::{self, NotifySettings};

#[tokio::main]
pub async fn main() {
    cli::init_logging();

    // parse command line arguments
    let cli_args = cli::parse_args(
        cli::command(
            "filament-notify",
            "Send the Spoolman details of a filament to Klipper through Moonraker",
        )
        .arg(
            clap::arg!(<FILAMENT_ID> "Spoolman filament id")
                .value_parser(clap::value_parser!(FilamentId)),
        ),
    );

    cli::exit_on_error(run(cli_args).await);
}

async fn run(cli_args: ArgMatches) -> anyhow::Result<()> {
    let id = *cli_args
        .get_one::<FilamentId>("FILAMENT_ID")
        .context("missing filament id argument")?;

    // configuration errors stop us before any request
    let config = cli::load_config(&cli_args).await?;
    let settings = NotifySettings::from_config(&config)?;

    notify::run(&settings, id).await?;

    return Ok(());
}
