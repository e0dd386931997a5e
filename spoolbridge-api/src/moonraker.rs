use std::time::Duration;

use url::Url;

use crate::{ApiError, FilamentId, FilamentRecord, GcodeScriptParams};

/// macro invoked on the printer, the leading '_' keeps it out of the public macro list
pub const DEFAULT_MACRO_NAME: &str = "_FILAMENT_INFO";

/// endpoint executing a gcode script, relative to the Moonraker base url
const GCODE_SCRIPT_PATH: &str = "printer/gcode/script";

/// replace double quotes so the value can sit inside a quoted macro parameter.
/// lossy, `"` and `'` become indistinguishable
pub fn sanitize(value: &str) -> String {
    value.replace('"', "'")
}

/// build the macro command announcing a filament
pub fn filament_info_script(
    macro_name: &str,
    id: FilamentId,
    name: &str,
    material: &str,
) -> String {
    format!(
        r#"{} ID={} NAME="{}" MATERIAL="{}""#,
        macro_name,
        id,
        sanitize(name),
        sanitize(material)
    )
}

/// Moonraker REST client
pub struct MoonrakerClient {
    client: reqwest::Client,
    /// base url, always ends with '/'
    url: Url,
    macro_name: String,
}

impl MoonrakerClient {
    pub fn new(url: Url, macro_name: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        return Ok(Self {
            client,
            url,
            macro_name: macro_name.to_string(),
        });
    }

    pub fn macro_name(&self) -> &str {
        &self.macro_name
    }

    pub fn gcode_script_url(&self) -> Result<Url, ApiError> {
        Ok(self.url.join(GCODE_SCRIPT_PATH)?)
    }

    /// execute a gcode script on the printer.
    /// any non-success status is an error
    pub async fn run_gcode(&self, script: &str) -> Result<(), ApiError> {
        let url = self.gcode_script_url()?;

        let response = self
            .client
            .post(url.clone())
            .json(&GcodeScriptParams {
                script: script.to_string(),
            })
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            // Moonraker puts the reason in the body
            let body = response.text().await.unwrap_or_default();

            return Err(ApiError::StatusError {
                url: url.to_string(),
                status,
                body,
            });
        }

        return Ok(());
    }

    /// announce a filament to the printer, returns the script that was sent
    pub async fn send_filament_info(&self, record: &FilamentRecord) -> Result<String, ApiError> {
        let script = filament_info_script(&self.macro_name, record.id, &record.name, &record.material);

        self.run_gcode(&script).await?;

        log::info!("sent to printer: {}", script);

        return Ok(script);
    }
}
