use std::time::Duration;

use url::Url;

use crate::{ApiError, FilamentId, FilamentRecord, SpoolmanFilament, describe};

/// Spoolman REST client, only knows about the filament endpoint
pub struct SpoolmanClient {
    client: reqwest::Client,
    /// filament endpoint, always ends with '/'
    url: Url,
}

impl SpoolmanClient {
    /// `url` is the filament endpoint, e.g. `http://host:7912/api/v1/filament/`
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        return Ok(Self { client, url });
    }

    /// url of a single filament
    pub fn filament_url(&self, id: FilamentId) -> Result<Url, ApiError> {
        Ok(self.url.join(&id.to_string())?)
    }

    /// look up a filament.
    /// never fails, a failed lookup degrades to a sentinel record
    pub async fn get_filament(&self, id: FilamentId) -> FilamentRecord {
        let url = match self.filament_url(id) {
            Ok(u) => u,
            Err(e) => return FilamentRecord::unreachable(id, e.to_string()),
        };

        log::debug!("GET {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("failed to reach Spoolman for filament {}: {}", id, describe(&e));
                return FilamentRecord::unreachable(id, describe(&e));
            }
        };

        let status = response.status();

        if !status.is_success() {
            log::warn!("Spoolman answered {} for filament {}", status, id);
            return FilamentRecord::not_found(id, status.as_u16());
        }

        // the body arrives after the headers and can still time out
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                log::warn!("failed to read Spoolman response for filament {}: {}", id, describe(&e));
                return FilamentRecord::unreachable(id, describe(&e));
            }
        };

        match serde_json::from_slice::<SpoolmanFilament>(&body) {
            Ok(filament) => filament.into_record(id),
            Err(e) => {
                log::warn!("invalid Spoolman response for filament {}: {}", id, e);
                FilamentRecord::invalid_response(id, e.to_string())
            }
        }
    }
}
