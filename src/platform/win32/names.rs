use crate::error::{DimmerError, DimmerResult};
use crate::registry::{parse_friendly_names, NameResolver};
use std::os::windows::process::CommandExt;
use std::process::Command;
use windows::Win32::System::Threading::CREATE_NO_WINDOW;

const MONITOR_ID_QUERY: &str = r#"Get-CimInstance -Namespace root\wmi -ClassName WmiMonitorID | ForEach-Object {
    [System.Text.Encoding]::ASCII.GetString($_.UserFriendlyName).Trim([char]0)
}"#;

/// Reads EDID model names through WMI. Slow (a PowerShell start-up), so it
/// only runs during enumeration.
pub struct WmiNameResolver;

impl NameResolver for WmiNameResolver {
    fn friendly_names(&self) -> DimmerResult<Vec<String>> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", MONITOR_ID_QUERY])
            .creation_flags(CREATE_NO_WINDOW.0)
            .output()
            .map_err(|e| DimmerError::NameLookup(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DimmerError::NameLookup(stderr.trim().to_string()));
        }

        Ok(parse_friendly_names(&String::from_utf8_lossy(&output.stdout)))
    }
}
