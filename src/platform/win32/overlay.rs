use crate::display::Rect;
use crate::error::{DimmerError, DimmerResult};
use crate::log_warn;
use crate::overlay::{OverlayBackend, OverlaySurface};
use windows::core::w;
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::CreateSolidBrush;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SetLayeredWindowAttributes,
    SetWindowPos, ShowWindow, CS_HREDRAW, CS_VREDRAW, HWND_TOPMOST, LWA_ALPHA, SWP_NOACTIVATE,
    SWP_NOMOVE, SWP_NOSIZE, SW_SHOWNA, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

/// Black layered popups. WS_EX_TRANSPARENT together with WS_EX_LAYERED
/// passes all mouse and keyboard input through to the windows below.
#[derive(Default)]
pub struct LayeredOverlayBackend {
    hinstance: Option<HINSTANCE>,
}

impl LayeredOverlayBackend {
    fn register_class(&mut self) -> DimmerResult<HINSTANCE> {
        if let Some(hinstance) = self.hinstance {
            return Ok(hinstance);
        }

        let module = unsafe { GetModuleHandleW(None) }
            .map_err(|e| DimmerError::Overlay(format!("GetModuleHandleW failed: {}", e)))?;
        let hinstance = HINSTANCE(module.0);

        let wc = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(overlay_window_proc),
            hInstance: hinstance,
            lpszClassName: w!("NoxOverlay"),
            hbrBackground: unsafe { CreateSolidBrush(COLORREF(0)) },
            ..Default::default()
        };

        if unsafe { RegisterClassW(&wc) } == 0 {
            // Already registered by an earlier backend in this process.
            log_warn!("RegisterClassW(NoxOverlay) returned 0");
        }

        self.hinstance = Some(hinstance);
        Ok(hinstance)
    }
}

impl OverlayBackend for LayeredOverlayBackend {
    fn create(&mut self, bounds: Rect, alpha: f32) -> DimmerResult<Box<dyn OverlaySurface>> {
        let hinstance = self.register_class()?;

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                w!("NoxOverlay"),
                w!("NoxOverlay"),
                WS_POPUP,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                None,
                None,
                Some(hinstance),
                None,
            )
        }
        .map_err(|e| DimmerError::Overlay(format!("CreateWindowExW failed: {}", e)))?;

        let mut overlay = LayeredOverlay { hwnd };
        overlay.set_alpha(alpha)?;

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNA);
            let _ = SetWindowPos(
                hwnd,
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            );
        }

        Ok(Box::new(overlay))
    }
}

struct LayeredOverlay {
    hwnd: HWND,
}

impl OverlaySurface for LayeredOverlay {
    fn set_alpha(&mut self, alpha: f32) -> DimmerResult<()> {
        let byte = (alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        unsafe { SetLayeredWindowAttributes(self.hwnd, COLORREF(0), byte, LWA_ALPHA) }
            .map_err(|e| DimmerError::Overlay(format!("SetLayeredWindowAttributes failed: {}", e)))
    }
}

impl Drop for LayeredOverlay {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

unsafe extern "system" fn overlay_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}
