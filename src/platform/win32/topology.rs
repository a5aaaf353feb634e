use crate::display::Rect;
use crate::error::{DimmerError, DimmerResult};
use crate::registry::{MonitorInfo, TopologySource};
use windows::core::BOOL;
use windows::Win32::Foundation::{LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW};

pub struct Win32Topology;

impl TopologySource for Win32Topology {
    fn monitors(&self) -> DimmerResult<Vec<MonitorInfo>> {
        let mut monitors: Vec<MonitorInfo> = Vec::new();

        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(monitor_enum_proc),
                LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
            )
        };
        if !ok.as_bool() {
            return Err(DimmerError::Topology("EnumDisplayMonitors failed".to_string()));
        }

        Ok(monitors)
    }
}

fn to_rect(rect: RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right - rect.left, rect.bottom - rect.top)
}

unsafe extern "system" fn monitor_enum_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

    let mut info: MONITORINFOEXW = std::mem::zeroed();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

    if GetMonitorInfoW(hmonitor, &mut info as *mut _ as *mut _).as_bool() {
        let len = info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len());
        monitors.push(MonitorInfo {
            system_id: String::from_utf16_lossy(&info.szDevice[..len]),
            bounds: to_rect(info.monitorInfo.rcMonitor),
            work_area: to_rect(info.monitorInfo.rcWork),
        });
    }

    true.into()
}
