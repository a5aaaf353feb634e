//! "Run at Startup" via the per-user Run registry key.

use anyhow::Result;
use std::path::Path;
use windows::core::HSTRING;
use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE,
};

const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";
const VALUE_NAME: &str = "Nox Dimmer";

struct RunKey(HKEY);

impl RunKey {
    fn open(access: REG_SAM_FLAGS) -> Result<Option<Self>> {
        let subkey = HSTRING::from(RUN_KEY);
        let mut hkey = HKEY::default();
        let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, &subkey, None, access, &mut hkey) };

        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status.is_err() {
            return Err(anyhow::anyhow!("Failed to open registry key: {:?}", status));
        }
        Ok(Some(Self(hkey)))
    }
}

impl Drop for RunKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

pub fn is_registered() -> Result<bool> {
    let Some(key) = RunKey::open(KEY_READ)? else {
        return Ok(false);
    };

    let value_name = HSTRING::from(VALUE_NAME);
    let mut buffer = [0u16; 512];
    let mut buffer_size = (buffer.len() * 2) as u32;
    let mut value_type = REG_VALUE_TYPE::default();

    let status = unsafe {
        RegQueryValueExW(
            key.0,
            &value_name,
            None,
            Some(&mut value_type),
            Some(buffer.as_mut_ptr() as *mut u8),
            Some(&mut buffer_size),
        )
    };

    Ok(status.is_ok())
}

pub fn set_registered(enabled: bool, exe_path: &Path) -> Result<()> {
    let key = RunKey::open(KEY_WRITE)?
        .ok_or_else(|| anyhow::anyhow!("Run registry key does not exist"))?;
    let value_name = HSTRING::from(VALUE_NAME);

    let status = if enabled {
        let quoted = format!("\"{}\" --minimized", exe_path.display());
        let wide: Vec<u16> = quoted.encode_utf16().chain(std::iter::once(0)).collect();
        let bytes: Vec<u8> = wide.iter().flat_map(|c| c.to_le_bytes()).collect();
        unsafe { RegSetValueExW(key.0, &value_name, None, REG_SZ, Some(&bytes)) }
    } else {
        let status = unsafe { RegDeleteValueW(key.0, &value_name) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        status
    };

    if status.is_err() {
        return Err(anyhow::anyhow!("Failed to update startup entry: {:?}", status));
    }
    Ok(())
}
