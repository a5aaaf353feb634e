use crate::AppCommand;
use crossbeam_channel::{Receiver, Sender};
use egui::Color32;
use nox::platform::win32::startup;
use nox::{log_info, log_warn, ControlEvent, DimmingCoordinator, DimmingSnapshot, Intensity, StateManager};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const ACCENT: Color32 = Color32::from_rgb(0x60, 0xcd, 0xff);
const HYPER_ACCENT: Color32 = Color32::from_rgb(0xff, 0x4d, 0x4d);
const BACKGROUND: Color32 = Color32::from_rgb(0x20, 0x20, 0x20);
const SURFACE: Color32 = Color32::from_rgb(0x2d, 0x2d, 0x2d);
const TEXT: Color32 = Color32::from_rgb(0xff, 0xff, 0xff);
const TEXT_DIM: Color32 = Color32::from_rgb(0xa0, 0xa0, 0xa0);

pub const PANEL_WIDTH: f32 = 360.0;

pub fn panel_height(display_count: usize) -> f32 {
    (170.0 + 65.0 * display_count as f32 + 120.0).min(600.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditTarget {
    Master,
    Display(usize),
}

/// The dimmer's settings window. It renders the coordinator's snapshot
/// every frame and hands user edits back as events, never the other way
/// round.
pub struct ControlPanel {
    coordinator: Rc<RefCell<DimmingCoordinator>>,
    state: Arc<StateManager>,
    commands: Receiver<AppCommand>,
    command_tx: Sender<AppCommand>,
    exit_requested: Arc<AtomicBool>,
    ctx_storage: Arc<parking_lot::Mutex<Option<egui::Context>>>,

    labels: Vec<String>,
    editing: Option<(EditTarget, String)>,
    run_at_startup: bool,
    had_focus: bool,
    first_frame: bool,
    dragging: bool,
}

impl ControlPanel {
    pub fn new(
        coordinator: Rc<RefCell<DimmingCoordinator>>,
        state: Arc<StateManager>,
        commands: Receiver<AppCommand>,
        command_tx: Sender<AppCommand>,
        exit_requested: Arc<AtomicBool>,
        ctx_storage: Arc<parking_lot::Mutex<Option<egui::Context>>>,
    ) -> Self {
        log_info!("Opening control panel");

        // The registry entry is the source of truth for autostart.
        let run_at_startup = startup::is_registered().unwrap_or_else(|e| {
            log_warn!("Startup registry check failed: {}", e);
            false
        });
        state.update(|s| s.run_at_startup = run_at_startup);

        let mut panel = Self {
            coordinator,
            state,
            commands,
            command_tx,
            exit_requested,
            ctx_storage,
            labels: Vec::new(),
            editing: None,
            run_at_startup,
            had_focus: false,
            first_frame: true,
            dragging: false,
        };
        panel.refresh_labels();
        panel
    }

    fn refresh_labels(&mut self) {
        self.labels = self
            .coordinator
            .borrow()
            .registry()
            .displays()
            .iter()
            .map(|d| d.label())
            .collect();
    }

    fn quit(&mut self, ctx: &egui::Context) {
        log_info!("Quit requested from control panel");
        self.exit_requested.store(true, Ordering::Release);
        {
            let mut coordinator = self.coordinator.borrow_mut();
            self.state.remember_session(coordinator.master(), coordinator.mode());
            coordinator.shutdown();
        }
        let _ = self.command_tx.try_send(AppCommand::Exit);
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn hide_to_tray(&self, ctx: &egui::Context) {
        log_info!("Hiding control panel to tray");
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    /// Commands the tray sent while the panel owns the control thread.
    fn drain_commands(&mut self, ctx: &egui::Context, events: &mut Vec<ControlEvent>) -> bool {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                AppCommand::OpenPanel => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                AppCommand::ToggleHyper => events.push(ControlEvent::ToggleMode),
                AppCommand::RefreshDisplays => {
                    self.coordinator.borrow_mut().reinitialize();
                    self.refresh_labels();
                }
                AppCommand::Exit => {
                    self.quit(ctx);
                    return false;
                }
            }
        }
        true
    }

    fn title_bar(&mut self, ctx: &egui::Context, accent: Color32, hyper: bool) {
        let title_bar_height = 40.0;
        let button_size = egui::vec2(36.0, 28.0);

        egui::TopBottomPanel::top("title_bar")
            .exact_height(title_bar_height)
            .frame(egui::Frame::none().fill(BACKGROUND))
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.add_space(15.0);

                    let drag_area = ui.interact(
                        egui::Rect::from_min_size(
                            ui.cursor().min,
                            egui::vec2(ui.available_width() - 2.0 * button_size.x, title_bar_height),
                        ),
                        ui.id().with("title_bar_drag"),
                        egui::Sense::click_and_drag(),
                    );
                    let primary_down = ctx.input(|i| i.pointer.primary_down());
                    if drag_area.is_pointer_button_down_on() && primary_down {
                        if !self.dragging {
                            self.dragging = true;
                        }
                        ctx.send_viewport_cmd(egui::ViewportCommand::StartDrag);
                    } else if self.dragging {
                        self.dragging = false;
                    }

                    let title_color = if hyper { accent } else { TEXT };
                    ui.label(egui::RichText::new("Nox").size(16.0).strong().color(title_color));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.add_space(6.0);
                        let close = ui.add_sized(
                            button_size,
                            egui::Button::new(egui::RichText::new("✕").size(14.0).color(TEXT)).frame(false),
                        );
                        if close.clicked() {
                            self.quit(ctx);
                        }

                        let minimize = ui.add_sized(
                            button_size,
                            egui::Button::new(egui::RichText::new("—").size(14.0).strong().color(TEXT)).frame(false),
                        );
                        if minimize.clicked() {
                            self.hide_to_tray(ctx);
                        }
                    });
                });
            });
    }

    /// Percentage label that turns into a text field on double-click.
    fn value_label(&mut self, ui: &mut egui::Ui, target: EditTarget, value: Intensity, events: &mut Vec<ControlEvent>) {
        if let Some((editing, buffer)) = self.editing.as_mut() {
            if *editing == target {
                let response = ui.add(egui::TextEdit::singleline(buffer).desired_width(36.0));
                if !response.has_focus() && !response.lost_focus() {
                    response.request_focus();
                }
                let submitted = response.lost_focus() || ui.input(|i| i.key_pressed(egui::Key::Enter));
                if submitted {
                    // Non-numeric input is dropped silently.
                    if let Ok(intensity) = buffer.parse::<Intensity>() {
                        events.push(match target {
                            EditTarget::Master => ControlEvent::Master(intensity),
                            EditTarget::Display(index) => ControlEvent::Display { index, intensity },
                        });
                    }
                    self.editing = None;
                }
                return;
            }
        }

        let label = ui.add(
            egui::Label::new(egui::RichText::new(value.to_string()).color(TEXT_DIM))
                .sense(egui::Sense::click()),
        );
        if label.double_clicked() {
            self.editing = Some((target, value.percent().to_string()));
        }
    }

    fn master_row(&mut self, ui: &mut egui::Ui, snapshot: &DimmingSnapshot, events: &mut Vec<ControlEvent>) {
        let enabled = snapshot.displays.len() > 1;

        ui.horizontal(|ui| {
            let color = if enabled { TEXT } else { TEXT_DIM };
            ui.label(egui::RichText::new("Master Dim Level").color(color));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if enabled {
                    self.value_label(ui, EditTarget::Master, snapshot.master, events);
                } else {
                    ui.label(egui::RichText::new(snapshot.master.to_string()).color(TEXT_DIM));
                }
            });
        });

        let mut value = snapshot.master.percent();
        let slider = egui::Slider::new(&mut value, 0..=100).show_value(false).trailing_fill(true);
        ui.spacing_mut().slider_width = ui.available_width();
        if ui.add_enabled(enabled, slider).changed() {
            events.push(ControlEvent::Master(Intensity::from(value)));
        }
    }

    fn display_row(&mut self, ui: &mut egui::Ui, index: usize, intensity: Intensity, events: &mut Vec<ControlEvent>) {
        let label = self.labels.get(index).cloned().unwrap_or_else(|| format!("Display {}", index + 1));

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(label).color(TEXT));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                self.value_label(ui, EditTarget::Display(index), intensity, events);
            });
        });

        let mut value = intensity.percent();
        ui.spacing_mut().slider_width = ui.available_width();
        let slider = egui::Slider::new(&mut value, 0..=100).show_value(false).trailing_fill(true);
        if ui.add(slider).changed() {
            events.push(ControlEvent::Display {
                index,
                intensity: Intensity::from(value),
            });
        }
    }

    fn footer(&mut self, ctx: &egui::Context, snapshot: &DimmingSnapshot, events: &mut Vec<ControlEvent>) {
        egui::TopBottomPanel::bottom("footer")
            .frame(egui::Frame::none().fill(BACKGROUND).inner_margin(egui::Margin::same(15.0)))
            .show(ctx, |ui| {
                let mut hyper = snapshot.mode.is_hyper();
                let text = egui::RichText::new("Hyper Mode (Taskbar Visible)").strong().color(HYPER_ACCENT);
                if ui.checkbox(&mut hyper, text).changed() {
                    events.push(ControlEvent::ToggleMode);
                }

                let mut remember = self.state.read(|s| s.remember_last_intensity);
                let text = egui::RichText::new("Remember Last Level").color(TEXT_DIM);
                if ui.checkbox(&mut remember, text).changed() {
                    log_info!("Remember last level: {}", remember);
                    self.state.update(|s| s.remember_last_intensity = remember);
                    self.state.remember_session(snapshot.master, snapshot.mode);
                }

                let mut hide_on_focus_loss = self.state.read(|s| s.hide_on_focus_loss);
                let text = egui::RichText::new("Hide When Focus Is Lost").color(TEXT_DIM);
                if ui.checkbox(&mut hide_on_focus_loss, text).changed() {
                    self.state.update(|s| s.hide_on_focus_loss = hide_on_focus_loss);
                }

                let mut run_at_startup = self.run_at_startup;
                let text = egui::RichText::new("Run at Startup").color(TEXT_DIM);
                if ui.checkbox(&mut run_at_startup, text).changed() {
                    match std::env::current_exe()
                        .map_err(anyhow::Error::from)
                        .and_then(|exe| startup::set_registered(run_at_startup, &exe))
                    {
                        Ok(()) => {
                            log_info!("Run at startup: {}", run_at_startup);
                            self.run_at_startup = run_at_startup;
                            self.state.update(|s| s.run_at_startup = run_at_startup);
                        }
                        Err(e) => log_warn!("Failed to update startup entry: {}", e),
                    }
                }
            });
    }
}

impl eframe::App for ControlPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            let mut visuals = egui::Visuals::dark();
            visuals.panel_fill = BACKGROUND;
            visuals.extreme_bg_color = SURFACE;
            ctx.set_visuals(visuals);
            ctx.style_mut(|style| style.interaction.selectable_labels = false);
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
            *self.ctx_storage.lock() = Some(ctx.clone());
            self.first_frame = false;
        }

        let mut events = Vec::new();
        if !self.drain_commands(ctx, &mut events) {
            return;
        }

        if ctx.input(|i| i.modifiers.ctrl && i.key_pressed(egui::Key::Q)) {
            self.quit(ctx);
            return;
        }

        let snapshot = self.coordinator.borrow().snapshot();
        let hyper = snapshot.mode.is_hyper();
        let accent = if hyper { HYPER_ACCENT } else { ACCENT };
        ctx.style_mut(|style| {
            style.visuals.selection.bg_fill = accent;
            style.visuals.widgets.inactive.fg_stroke.color = accent;
        });

        self.title_bar(ctx, accent, hyper);
        self.footer(ctx, &snapshot, &mut events);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND).inner_margin(egui::Margin::symmetric(15.0, 5.0)))
            .show(ctx, |ui| {
                self.master_row(ui, &snapshot, &mut events);
                ui.add_space(15.0);
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (index, intensity) in snapshot.displays.iter().enumerate() {
                        self.display_row(ui, index, *intensity, &mut events);
                    }
                });
            });

        if !events.is_empty() {
            let mut coordinator = self.coordinator.borrow_mut();
            for event in events {
                coordinator.dispatch(event);
            }
        }

        let focused = ctx.input(|i| i.viewport().focused);
        match focused {
            Some(true) => self.had_focus = true,
            Some(false) if self.had_focus && !self.dragging => {
                if self.state.read(|s| s.hide_on_focus_loss) {
                    self.hide_to_tray(ctx);
                }
            }
            _ => {}
        }
    }
}
