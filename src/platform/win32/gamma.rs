use crate::error::{DimmerError, DimmerResult};
use crate::gamma::{GammaBackend, GammaDevice, GammaRamp};
use std::ffi::c_void;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Graphics::Gdi::{CreateDCW, DeleteDC, HDC};
use windows::Win32::UI::ColorSystem::{GetDeviceGammaRamp, SetDeviceGammaRamp};

/// Opens a GDI device context per display (`\\.\DISPLAYn`).
pub struct GdiGammaBackend;

impl GammaBackend for GdiGammaBackend {
    fn open(&self, system_id: &str) -> DimmerResult<Box<dyn GammaDevice>> {
        let device_name = HSTRING::from(system_id);
        let hdc = unsafe { CreateDCW(PCWSTR::null(), &device_name, PCWSTR::null(), None) };
        if hdc.is_invalid() {
            return Err(DimmerError::DeviceUnavailable {
                system_id: system_id.to_string(),
                reason: "CreateDCW returned no device context".to_string(),
            });
        }
        Ok(Box::new(GdiDevice {
            system_id: system_id.to_string(),
            hdc,
        }))
    }
}

struct GdiDevice {
    system_id: String,
    hdc: HDC,
}

impl GammaDevice for GdiDevice {
    fn read_ramp(&mut self) -> DimmerResult<GammaRamp> {
        let mut ramp = GammaRamp::zeroed();
        let ok = unsafe { GetDeviceGammaRamp(self.hdc, &mut ramp as *mut GammaRamp as *mut c_void) };
        if ok.as_bool() {
            Ok(ramp)
        } else {
            Err(DimmerError::RampRead {
                system_id: self.system_id.clone(),
            })
        }
    }

    fn write_ramp(&mut self, ramp: &GammaRamp) -> DimmerResult<()> {
        let ok = unsafe { SetDeviceGammaRamp(self.hdc, ramp as *const GammaRamp as *const c_void) };
        if ok.as_bool() {
            Ok(())
        } else {
            Err(DimmerError::RampWrite {
                system_id: self.system_id.clone(),
            })
        }
    }
}

impl Drop for GdiDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.hdc);
        }
    }
}
