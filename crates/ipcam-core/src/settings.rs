//! JSON settings-file loader. An equivalent XML form exists in older camera
//! manager tooling but is not implemented here.

use crate::error::SettingsResult;
use ipcam_stream::{AuthMode, CameraConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CameraEntry {
    #[serde(default)]
    name: String,
    url: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default, rename = "auth-type")]
    auth_type: Option<String>,
}

/// Unrecognized or absent values default to `AuthMode::None` rather than
/// failing the whole file.
fn parse_auth_type(raw: Option<&str>) -> AuthMode {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("BASIC") => AuthMode::Basic,
        Some("COOKIE") => AuthMode::Cookie,
        _ => AuthMode::None,
    }
}

/// Reads a JSON array of `{name, url, username, password, "auth-type"}`
/// entries into one `CameraConfig` per entry. Unrecognized or missing
/// `auth-type` values default to `AuthMode::None`.
pub fn load_camera_configs(path: impl AsRef<Path>) -> SettingsResult<Vec<CameraConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<CameraEntry> = serde_json::from_str(&raw)?;

    Ok(entries
        .into_iter()
        .map(|entry| CameraConfig {
            name: entry.name,
            username: entry.username,
            password: entry.password,
            auth_mode: parse_auth_type(entry.auth_type.as_deref()),
            ..CameraConfig::new(entry.url)
        })
        .collect())
}
