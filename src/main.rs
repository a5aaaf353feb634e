#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod gui;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let result = app::run_app();
    let _ = nox::logger::finalize_logs();
    result
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("Nox drives GDI gamma ramps and layered windows and only runs on Windows")
}

/// Requests from the tray that the control thread acts on.
#[cfg(windows)]
#[derive(Debug)]
pub enum AppCommand {
    OpenPanel,
    ToggleHyper,
    RefreshDisplays,
    Exit,
}

#[cfg(windows)]
mod app {
    use crate::gui;
    use crate::AppCommand;
    use anyhow::Result;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use nox::{log_info, log_warn, DimmingCoordinator, Mode, StateManager};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, MouseButton, TrayIconBuilder, TrayIconEvent};

    type Wakeup = Arc<(parking_lot::Mutex<()>, parking_lot::Condvar)>;

    /// The thread-safe half of the app. Tray callbacks may fire on any
    /// thread, so they only post commands and poke the panel.
    struct Signals {
        command_tx: Sender<AppCommand>,
        panel_visible: Arc<AtomicBool>,
        exit_requested: Arc<AtomicBool>,
        panel_ctx: Arc<parking_lot::Mutex<Option<egui::Context>>>,
        wakeup: Wakeup,
    }

    impl Signals {
        fn send(&self, cmd: AppCommand) {
            let _ = self.command_tx.try_send(cmd);
            if let Some(ctx) = self.panel_ctx.lock().as_ref() {
                ctx.request_repaint();
            }
            self.wakeup.1.notify_one();
        }

        fn request_open_panel(&self) {
            if self.exit_requested.load(Ordering::Acquire) {
                return;
            }
            if self.panel_visible.load(Ordering::Acquire) {
                log_info!("Panel already open - bringing to front");
            }
            self.send(AppCommand::OpenPanel);
        }

        /// The flag is authoritative; the queued `Exit` only wakes the loop
        /// sooner and may be dropped when the queue is full.
        fn request_exit(&self) {
            self.exit_requested.store(true, Ordering::Release);
            self.send(AppCommand::Exit);
        }

        fn exit_pending(&self) -> bool {
            self.exit_requested.load(Ordering::Acquire)
        }
    }

    fn tooltip(coordinator: &DimmingCoordinator) -> String {
        let snapshot = coordinator.snapshot();
        let mode = match snapshot.mode {
            Mode::Normal => "Normal",
            Mode::Hyper => "Hyper",
        };
        format!("Nox\nDim: {} ({})", snapshot.master, mode)
    }

    fn remember(state: &StateManager, coordinator: &DimmingCoordinator) {
        state.remember_session(coordinator.master(), coordinator.mode());
    }

    fn shut_down(state: &StateManager, coordinator: &RefCell<DimmingCoordinator>) {
        let mut c = coordinator.borrow_mut();
        if !c.is_shut_down() {
            remember(state, &c);
        }
        c.shutdown();
    }

    pub fn run_app() -> Result<()> {
        let args: Vec<String> = std::env::args().collect();
        let enable_file_logging = args.iter().any(|a| a == "--stream-logs");
        let start_minimized = args.iter().any(|a| a == "--minimized");

        let state = Arc::new(StateManager::new()?);

        let log_retention = state.read(|s| s.log_retention_count);
        nox::logger::init_logger(state.log_dir(), "nox", log_retention, enable_file_logging)?;
        nox::lifecycle::install_panic_hook();

        log_info!("=== Nox Starting ===");
        if let Some(log_path) = nox::logger::get_log_path() {
            log_info!("Log file: {}", log_path.display());
        }
        if enable_file_logging {
            log_info!("Streaming mode enabled via --stream-logs");
        } else {
            log_info!("Buffered mode - logs will be written to file on exit");
        }

        let coordinator = Rc::new(RefCell::new(DimmingCoordinator::init(nox::platform::native_backends())));
        {
            let (intensity, mode) = state.read(|s| s.launch_settings());
            let mut c = coordinator.borrow_mut();
            c.set_master(intensity);
            c.set_mode(mode);
            log_info!("Launch level {} in {:?} mode", intensity, mode);
        }

        let (command_tx, command_rx) = bounded(16);
        let signals = Arc::new(Signals {
            command_tx,
            panel_visible: Arc::new(AtomicBool::new(false)),
            exit_requested: Arc::new(AtomicBool::new(false)),
            panel_ctx: Arc::new(parking_lot::Mutex::new(None)),
            wakeup: Arc::new((parking_lot::Mutex::new(()), parking_lot::Condvar::new())),
        });

        if state.read(|s| s.open_panel_on_launch) && !start_minimized {
            signals.request_open_panel();
        }

        log_info!("Loading tray icon");
        let icon = load_icon()?;

        let menu = Menu::new();
        let show_item = MenuItem::new("Show", true, None);
        let hyper_item = CheckMenuItem::new("Hyper Mode", true, coordinator.borrow().mode().is_hyper(), None);
        let refresh_item = MenuItem::new("Refresh Displays", true, None);
        let quit_item = MenuItem::new("Quit", true, None);

        menu.append(&show_item)?;
        menu.append(&hyper_item)?;
        menu.append(&refresh_item)?;
        menu.append(&PredefinedMenuItem::separator())?;
        menu.append(&quit_item)?;

        let show_id = show_item.id().clone();
        let hyper_id = hyper_item.id().clone();
        let refresh_id = refresh_item.id().clone();
        let quit_id = quit_item.id().clone();

        let tray_icon = TrayIconBuilder::new()
            .with_menu(Box::new(menu.clone()))
            .with_menu_on_left_click(false)
            .with_tooltip(tooltip(&coordinator.borrow()))
            .with_icon(icon)
            .build()?;

        log_info!("Tray icon created on main thread");

        let signals_for_click = Arc::clone(&signals);
        TrayIconEvent::set_event_handler(Some(move |event| match event {
            TrayIconEvent::Click { button, .. } | TrayIconEvent::DoubleClick { button, .. } => {
                if button == MouseButton::Left {
                    log_info!("Tray icon clicked");
                    signals_for_click.request_open_panel();
                }
            }
            _ => {}
        }));

        let signals_for_menu = Arc::clone(&signals);
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            if event.id == show_id {
                log_info!("Show clicked");
                signals_for_menu.request_open_panel();
            } else if event.id == hyper_id {
                log_info!("Hyper Mode clicked");
                signals_for_menu.send(AppCommand::ToggleHyper);
            } else if event.id == refresh_id {
                log_info!("Refresh Displays clicked");
                signals_for_menu.send(AppCommand::RefreshDisplays);
            } else if event.id == quit_id {
                log_info!("Quit clicked");
                signals_for_menu.request_exit();
            }
        }));

        log_info!("Entering main event loop");

        use windows::Win32::UI::WindowsAndMessaging::{
            DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
        };

        let refresh_tray = |coordinator: &DimmingCoordinator| {
            tray_icon.set_tooltip(Some(tooltip(coordinator))).ok();
            hyper_item.set_checked(coordinator.mode().is_hyper());
        };

        let mut last_tray_update = Instant::now();

        loop {
            unsafe {
                let mut msg = MSG::default();
                while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                    if msg.message == WM_QUIT {
                        log_info!("WM_QUIT received, exiting");
                        shut_down(&state, &coordinator);
                        return Ok(());
                    }
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }

            if signals.exit_pending() {
                log_info!("Exit requested - shutting down application");
                shut_down(&state, &coordinator);
                return Ok(());
            }

            if last_tray_update.elapsed() >= Duration::from_millis(100) {
                refresh_tray(&coordinator.borrow());
                last_tray_update = Instant::now();
            }

            while let Ok(cmd) = command_rx.try_recv() {
                match cmd {
                    AppCommand::OpenPanel => {
                        if signals.exit_pending() {
                            log_info!("Exit requested, ignoring panel open request");
                            continue;
                        }
                        open_panel(&signals, &coordinator, &state, &command_rx);

                        if signals.exit_pending() {
                            log_info!("Exit requested from panel - shutting down");
                            shut_down(&state, &coordinator);
                            return Ok(());
                        }
                        refresh_tray(&coordinator.borrow());
                    }
                    AppCommand::ToggleHyper => {
                        coordinator.borrow_mut().toggle_mode();
                        remember(&state, &coordinator.borrow());
                        refresh_tray(&coordinator.borrow());
                    }
                    AppCommand::RefreshDisplays => {
                        coordinator.borrow_mut().reinitialize();
                        refresh_tray(&coordinator.borrow());
                    }
                    AppCommand::Exit => {
                        log_info!("Exit command - shutting down application");
                        shut_down(&state, &coordinator);
                        return Ok(());
                    }
                }
            }

            let mut guard = signals.wakeup.0.lock();
            signals.wakeup.1.wait_for(&mut guard, Duration::from_millis(100));
        }
    }

    /// Runs the control panel until it is hidden or quits. The panel takes
    /// over the command queue while it is open.
    fn open_panel(
        signals: &Arc<Signals>,
        coordinator: &Rc<RefCell<DimmingCoordinator>>,
        state: &Arc<StateManager>,
        command_rx: &Receiver<AppCommand>,
    ) {
        if signals.panel_visible.swap(true, Ordering::AcqRel) {
            return;
        }
        log_info!("Opening control panel");

        let display_count = coordinator.borrow().registry().len();
        let (width, height) = (gui::PANEL_WIDTH, gui::panel_height(display_count));
        let mut viewport = egui::ViewportBuilder::default()
            .with_inner_size([width, height])
            .with_resizable(false)
            .with_decorations(false)
            .with_always_on_top()
            .with_icon(load_window_icon());
        if let Some(primary) = coordinator.borrow().registry().primary() {
            let area = primary.work_area();
            viewport = viewport.with_position([
                (area.x + area.width) as f32 - width - 20.0,
                (area.y + area.height) as f32 - height - 20.0,
            ]);
        }

        let native_options = eframe::NativeOptions {
            viewport,
            run_and_return: true,
            ..Default::default()
        };

        let coordinator_for_panel = Rc::clone(coordinator);
        let state_for_panel = Arc::clone(state);
        let command_rx_for_panel = command_rx.clone();
        let command_tx_for_panel = signals.command_tx.clone();
        let exit_for_panel = Arc::clone(&signals.exit_requested);
        let ctx_for_panel = Arc::clone(&signals.panel_ctx);

        let result = eframe::run_native(
            "Nox",
            native_options,
            Box::new(move |_cc| {
                Ok(Box::new(gui::ControlPanel::new(
                    coordinator_for_panel,
                    state_for_panel,
                    command_rx_for_panel,
                    command_tx_for_panel,
                    exit_for_panel,
                    ctx_for_panel,
                )))
            }),
        );

        if let Err(e) = result {
            log_warn!("Control panel error: {:?}", e);
        }
        *signals.panel_ctx.lock() = None;
        signals.panel_visible.store(false, Ordering::Release);
        if !coordinator.borrow().is_shut_down() {
            remember(state, &coordinator.borrow());
        }
        log_info!("Control panel closed");

        // Clicks that queued up while the panel closed would reopen it at once.
        let mut drained = 0;
        let mut other_commands = Vec::new();
        while let Ok(cmd) = command_rx.try_recv() {
            match cmd {
                AppCommand::OpenPanel => drained += 1,
                other => other_commands.push(other),
            }
        }
        for cmd in other_commands {
            let _ = signals.command_tx.try_send(cmd);
        }
        if drained > 0 {
            log_info!("Drained {} buffered OpenPanel commands", drained);
        }
    }

    fn load_icon() -> Result<Icon> {
        let icon_path = std::env::current_exe()?
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Failed to get parent directory"))?
            .join("icon.ico");

        if icon_path.exists() {
            match Icon::from_path(&icon_path, Some((32, 32))) {
                Ok(icon) => {
                    log_info!("Loaded icon from {:?}", icon_path);
                    return Ok(icon);
                }
                Err(e) => {
                    log_warn!("Failed to load icon from {:?}: {}. Using fallback.", icon_path, e);
                }
            }
        } else {
            log_warn!("Icon file not found at {:?}. Using fallback.", icon_path);
        }

        let size = 32;
        Icon::from_rgba(moon_rgba(size), size, size)
            .map_err(|e| anyhow::anyhow!("Failed to create fallback icon: {}", e))
    }

    fn load_window_icon() -> egui::IconData {
        let icon_path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .map(|p| p.join("icon.ico"));

        if let Some(path) = icon_path {
            if path.exists() {
                if let Ok(image) = image::open(&path) {
                    let rgba = image.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    return egui::IconData {
                        rgba: rgba.into_raw(),
                        width,
                        height,
                    };
                }
            }
        }

        let size = 32;
        egui::IconData {
            rgba: moon_rgba(size),
            width: size,
            height: size,
        }
    }

    /// Accent-coloured disc on the panel background.
    fn moon_rgba(size: u32) -> Vec<u8> {
        let center = (size as f32 - 1.0) / 2.0;
        let radius = size as f32 * 0.4;
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                if (dx * dx + dy * dy).sqrt() <= radius {
                    rgba.extend_from_slice(&[0x60, 0xcd, 0xff, 255]);
                } else {
                    rgba.extend_from_slice(&[0x20, 0x20, 0x20, 255]);
                }
            }
        }
        rgba
    }

}
