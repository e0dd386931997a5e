mod moonraker;
mod spoolman;

pub use moonraker::{DEFAULT_MACRO_NAME, MoonrakerClient, filament_info_script, sanitize};
pub use spoolman::SpoolmanClient;

use serde::{Deserialize, Serialize};

/// identifier of a filament in the inventory
pub type FilamentId = u64;

/// placeholder for a field the inventory did not provide
pub const UNKNOWN: &str = "Unknown";
/// name reported when the inventory answers with a non-success status
pub const NOT_FOUND_NAME: &str = "ID Not Found";
/// name reported when the inventory could not be reached
pub const CONNECTION_ERROR_NAME: &str = "Connection Error";
/// name reported when the inventory answered with a body that is not a filament
pub const INVALID_RESPONSE_NAME: &str = "Invalid Response";

/// outcome of a filament lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// record fetched from the inventory
    Found,
    /// inventory answered with the given non-success status code
    NotFound(u16),
    /// inventory answered with a success status but the body could not be decoded
    InvalidResponse,
    /// request never completed: timeout, refused connection, dns failure...
    Unreachable,
}

/// filament metadata as reported in the sequence and sent to the printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilamentRecord {
    pub id: FilamentId,
    pub name: String,
    pub material: String,
    pub status: LookupStatus,
}

impl FilamentRecord {
    /// record for a filament the inventory does not know about
    pub fn not_found(id: FilamentId, status: u16) -> Self {
        Self {
            id,
            name: NOT_FOUND_NAME.to_string(),
            material: UNKNOWN.to_string(),
            status: LookupStatus::NotFound(status),
        }
    }

    /// record for a lookup that failed at the network level,
    /// the material carries the failure description
    pub fn unreachable(id: FilamentId, description: String) -> Self {
        Self {
            id,
            name: CONNECTION_ERROR_NAME.to_string(),
            material: description,
            status: LookupStatus::Unreachable,
        }
    }

    /// record for a success response whose body could not be decoded
    pub fn invalid_response(id: FilamentId, description: String) -> Self {
        Self {
            id,
            name: INVALID_RESPONSE_NAME.to_string(),
            material: description,
            status: LookupStatus::InvalidResponse,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == LookupStatus::Found
    }
}

/// filament object returned by the Spoolman filament endpoint.
/// only the fields we report are decoded, the rest is ignored
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpoolmanFilament {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
}

impl SpoolmanFilament {
    pub fn into_record(self, id: FilamentId) -> FilamentRecord {
        FilamentRecord {
            id,
            name: self.name.unwrap_or_else(|| UNKNOWN.to_string()),
            material: self.material.unwrap_or_else(|| UNKNOWN.to_string()),
            status: LookupStatus::Found,
        }
    }
}

/// body of a Moonraker `printer/gcode/script` request
#[derive(Debug, Serialize, Deserialize)]
pub struct GcodeScriptParams {
    pub script: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("{0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{url} answered with status {status}: {body}")]
    StatusError {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// renders an error together with its sources, reqwest keeps the
/// interesting part (timeout, connection refused) in the source chain
pub fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(s) = source {
        let text = s.to_string();
        // hyper and reqwest sometimes repeat the same message
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = s.source();
    }

    return message;
}


#[test]
fn test_missing_fields_default_to_unknown() {
    let filament: SpoolmanFilament =
        serde_json::from_str(r#"{"id": 4, "name": null, "vendor": {"name": "Acme"}}"#).unwrap();
    let record = filament.into_record(4);

    assert_eq!(record.name, UNKNOWN);
    assert_eq!(record.material, UNKNOWN);
    assert!(record.is_found());
}

#[test]
fn test_sentinel_records() {
    let record = FilamentRecord::not_found(9, 404);
    assert_eq!(record.name, NOT_FOUND_NAME);
    assert_eq!(record.material, UNKNOWN);
    assert_eq!(record.status, LookupStatus::NotFound(404));

    let record = FilamentRecord::unreachable(9, "connection refused".to_string());
    assert_eq!(record.name, CONNECTION_ERROR_NAME);
    assert_eq!(record.material, "connection refused");
    assert!(!record.is_found());
}
