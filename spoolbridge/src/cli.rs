use std::path::{Path, PathBuf};

use clap::ArgMatches;

use crate::config::{Config, ConfigError, resolve_config_path};

/// configuration file looked up next to the executable
pub const DEFAULT_CONFIG_FILE: &str = "config.ini";

/// log to stderr, `info` unless RUST_LOG says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// command with the options shared by every binary
pub fn command(name: &'static str, about: &'static str) -> clap::Command {
    clap::Command::new(name)
        .about(about)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            clap::arg!(-c --config <PATH> "configuration file, relative paths start next to the executable")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_FILE),
        )
}

/// parse command line arguments, usage errors exit with status 1
pub fn parse_args(command: clap::Command) -> ArgMatches {
    match command.try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            // --help and --version end up here too
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

/// load the configuration file named on the command line
pub async fn load_config(cli_args: &ArgMatches) -> Result<Config, ConfigError> {
    let path = cli_args
        .get_one::<PathBuf>("config")
        .map(PathBuf::as_path)
        .unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

    let path = resolve_config_path(path);

    log::debug!("using configuration {}", path.display());

    return Config::load(&path).await;
}

/// print the error chain and exit with status 1
pub fn exit_on_error<T>(result: anyhow::Result<T>) -> T {
    match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[test]
fn test_missing_positional_is_an_error() {
    let command = command("filament-test", "test").arg(clap::arg!(<FILE> "file"));

    let err = command.try_get_matches_from(["filament-test"]).unwrap_err();

    assert!(err.use_stderr());
}

#[test]
fn test_default_config() {
    let cli_args = command("filament-test", "test")
        .try_get_matches_from(["filament-test"])
        .unwrap();

    assert_eq!(
        cli_args.get_one::<PathBuf>("config"),
        Some(&PathBuf::from(DEFAULT_CONFIG_FILE))
    );

    let cli_args = command("filament-test", "test")
        .try_get_matches_from(["filament-test", "-c", "/etc/spoolbridge.ini"])
        .unwrap();

    assert_eq!(
        cli_args.get_one::<PathBuf>("config"),
        Some(&PathBuf::from("/etc/spoolbridge.ini"))
    );
}
