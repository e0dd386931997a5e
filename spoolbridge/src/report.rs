use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use spoolbridge_api::{FilamentId, FilamentRecord, SpoolmanClient};

use crate::config::{Config, ConfigError, KlipperSettings, SpoolmanSettings};
use crate::gcode;

/// Spoolman timeout of the report, one lookup per change so keep it short
pub const DEFAULT_SPOOLMAN_TIMEOUT: Duration = Duration::from_secs(5);

pub const NO_CHANGES_MESSAGE: &str =
    "No ASSERT_ACTIVE_FILAMENT commands or filament changes found.";
pub const HEADER: &str = "Filament sequence detected:";
pub const COMPLETED_MESSAGE: &str = "Analysis completed successfully.";

/// settings needed to report a gcode file
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub spoolman: SpoolmanSettings,
    pub klipper: KlipperSettings,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        return Ok(Self {
            spoolman: SpoolmanSettings::from_config(config, DEFAULT_SPOOLMAN_TIMEOUT)?,
            klipper: KlipperSettings::from_config(config)?,
        });
    }
}

pub enum ReportOutcome {
    /// the file has no filament markers
    NoChanges,
    /// one record per change, in file order
    Reported(Vec<FilamentRecord>),
}

/// a bare file name is looked up in the gcode directory
pub fn resolve_gcode_path(gcode_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        return file.to_path_buf();
    }

    return gcode_dir.join(file);
}

/// look up every change and print the sequence
pub async fn write_report<W: Write>(
    changes: &[FilamentId],
    client: &SpoolmanClient,
    out: &mut W,
) -> anyhow::Result<ReportOutcome> {
    if changes.is_empty() {
        writeln!(out, "{}", NO_CHANGES_MESSAGE)?;
        return Ok(ReportOutcome::NoChanges);
    }

    writeln!(out, "{}", HEADER)?;
    writeln!(out, "{}", "-".repeat(35))?;

    let mut records = Vec::with_capacity(changes.len());

    for (i, id) in changes.iter().enumerate() {
        let info = client.get_filament(*id).await;

        writeln!(
            out,
            "  Change {}: ID={} | Name={} | Material={}",
            i + 1,
            info.id,
            info.name,
            info.material
        )?;

        records.push(info);
    }

    writeln!(out)?;
    writeln!(out, "{}", COMPLETED_MESSAGE)?;

    return Ok(ReportOutcome::Reported(records));
}

/// scan a gcode file and report its filament changes
pub async fn run<W: Write>(
    settings: &ReportSettings,
    file: &Path,
    out: &mut W,
) -> anyhow::Result<ReportOutcome> {
    let path = resolve_gcode_path(&settings.klipper.gcode_path, file);

    log::debug!("scanning {}", path.display());

    let changes = gcode::scan_file(&path).await?;

    let client = SpoolmanClient::new(settings.spoolman.url.clone(), settings.spoolman.timeout)
        .context("failed to create the Spoolman client")?;

    return write_report(&changes, &client, out).await;
}

#[test]
fn test_resolve_gcode_path() {
    let dir = Path::new("/home/pi/printer_data/gcodes");

    assert_eq!(
        resolve_gcode_path(dir, Path::new("benchy.gcode")),
        PathBuf::from("/home/pi/printer_data/gcodes/benchy.gcode")
    );
    assert_eq!(
        resolve_gcode_path(dir, Path::new("multi/benchy.gcode")),
        PathBuf::from("/home/pi/printer_data/gcodes/multi/benchy.gcode")
    );
    assert_eq!(
        resolve_gcode_path(dir, Path::new("/tmp/benchy.gcode")),
        PathBuf::from("/tmp/benchy.gcode")
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Path as UrlPath, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::testing::serve;

    /// fake Spoolman knowing filaments 1 and 2, counts lookups
    async fn spoolman() -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route(
                "/api/v1/filament/{id}",
                get(
                    |State(hits): State<Arc<AtomicUsize>>, UrlPath(id): UrlPath<u64>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        match id {
                            1 => Ok(Json(json!({"name": "Matte White", "material": "PLA"}))),
                            2 => Ok(Json(json!({"name": "Fire Red", "material": "PETG"}))),
                            _ => Err(StatusCode::NOT_FOUND),
                        }
                    },
                ),
            )
            .with_state(hits.clone());

        let url = serve(app).await.join("api/v1/filament/").unwrap();

        (url, hits)
    }

    fn client(url: Url) -> SpoolmanClient {
        SpoolmanClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_report() {
        let (url, hits) = spoolman().await;
        let mut out = Vec::new();

        let outcome = write_report(&[1, 404, 2, 1], &client(url), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let expected = "\
Filament sequence detected:
-----------------------------------
  Change 1: ID=1 | Name=Matte White | Material=PLA
  Change 2: ID=404 | Name=ID Not Found | Material=Unknown
  Change 3: ID=2 | Name=Fire Red | Material=PETG
  Change 4: ID=1 | Name=Matte White | Material=PLA

Analysis completed successfully.
";
        assert_eq!(text, expected);
        // the unknown id does not stop the report
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        match outcome {
            ReportOutcome::Reported(records) => {
                assert_eq!(records.len(), 4);
                assert!(!records[1].is_found());
            }
            ReportOutcome::NoChanges => panic!("expected a report"),
        }
    }

    #[tokio::test]
    async fn test_no_changes_performs_no_lookup() {
        let (url, hits) = spoolman().await;
        let mut out = Vec::new();

        let outcome = write_report(&[], &client(url), &mut out).await.unwrap();

        assert!(matches!(outcome, ReportOutcome::NoChanges));
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", NO_CHANGES_MESSAGE));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run() {
        let (url, hits) = spoolman().await;
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("cube.gcode"),
            "ASSERT_ACTIVE_FILAMENT ID=1\n\
             ASSERT_ACTIVE_FILAMENT ID=1\n\
             G1 X1\n\
             ASSERT_ACTIVE_FILAMENT ID=2\n\
             ASSERT_ACTIVE_FILAMENT ID=2\n\
             ASSERT_ACTIVE_FILAMENT ID=2\n\
             ASSERT_ACTIVE_FILAMENT ID=1\n",
        )
        .unwrap();

        let settings = ReportSettings {
            spoolman: SpoolmanSettings {
                url,
                timeout: Duration::from_secs(5),
            },
            klipper: KlipperSettings {
                gcode_path: dir.path().to_path_buf(),
            },
        };

        let mut out = Vec::new();
        let outcome = run(&settings, Path::new("cube.gcode"), &mut out).await.unwrap();

        match outcome {
            ReportOutcome::Reported(records) => {
                let ids: Vec<_> = records.iter().map(|r| r.id).collect();
                assert_eq!(ids, vec![1, 2, 1]);
            }
            ReportOutcome::NoChanges => panic!("expected a report"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        // missing file is an error
        assert!(run(&settings, Path::new("missing.gcode"), &mut Vec::new()).await.is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::parse(
            "[Spoolman]\nSPOOLMAN_URL = http://host:7912/api/v1/filament\n[Klipper]\nGCODE_PATH = /gcodes\n",
        )
        .unwrap();

        let settings = ReportSettings::from_config(&config).unwrap();

        assert_eq!(settings.spoolman.timeout, DEFAULT_SPOOLMAN_TIMEOUT);
        assert_eq!(settings.klipper.gcode_path, PathBuf::from("/gcodes"));

        let config = Config::parse("[Spoolman]\nSPOOLMAN_URL = http://host/\n").unwrap();
        assert!(matches!(
            ReportSettings::from_config(&config),
            Err(ConfigError::MissingSection(_))
        ));
    }
}
