use std::time::Duration;

use anyhow::Context;

use spoolbridge_api::{FilamentId, MoonrakerClient, SpoolmanClient};

use crate::config::{Config, ConfigError, MoonrakerSettings, SpoolmanSettings};

/// Spoolman timeout of the notification, a single lookup can afford to wait
pub const DEFAULT_SPOOLMAN_TIMEOUT: Duration = Duration::from_secs(15);

/// settings needed to notify the printer
#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub spoolman: SpoolmanSettings,
    pub moonraker: MoonrakerSettings,
}

impl NotifySettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        return Ok(Self {
            spoolman: SpoolmanSettings::from_config(config, DEFAULT_SPOOLMAN_TIMEOUT)?,
            moonraker: MoonrakerSettings::from_config(config)?,
        });
    }
}

/// look up a filament and announce it to the printer.
/// a failed lookup still notifies with placeholder values, a failed notification is an error
pub async fn notify(
    spoolman: &SpoolmanClient,
    moonraker: &MoonrakerClient,
    id: FilamentId,
) -> anyhow::Result<String> {
    let record = spoolman.get_filament(id).await;

    if !record.is_found() {
        log::warn!("filament {} is not available, notifying with placeholders", id);
    }

    let script = moonraker
        .send_filament_info(&record)
        .await
        .with_context(|| format!("failed to send filament {} to the printer", id))?;

    return Ok(script);
}

pub async fn run(settings: &NotifySettings, id: FilamentId) -> anyhow::Result<String> {
    let spoolman = SpoolmanClient::new(settings.spoolman.url.clone(), settings.spoolman.timeout)
        .context("failed to create the Spoolman client")?;

    let moonraker = MoonrakerClient::new(
        settings.moonraker.url.clone(),
        &settings.moonraker.macro_name,
        settings.moonraker.timeout,
    )
    .context("failed to create the Moonraker client")?;

    return notify(&spoolman, &moonraker, id).await;
}
