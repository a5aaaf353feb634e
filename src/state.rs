use crate::coordinator::Mode;
use crate::display::Intensity;
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;

const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default = "default_intensity")]
    pub default_intensity: Intensity,
    #[serde(default)]
    pub remember_last_intensity: bool,
    #[serde(default = "default_intensity")]
    pub last_master_intensity: Intensity,
    #[serde(default)]
    pub last_hyper_mode: bool,

    #[serde(default)]
    pub run_at_startup: bool,
    #[serde(default = "default_true")]
    pub open_panel_on_launch: bool,
    #[serde(default = "default_true")]
    pub hide_on_focus_loss: bool,
    #[serde(default = "default_log_retention")]
    pub log_retention_count: usize,
}

fn default_intensity() -> Intensity {
    Intensity::clamped(30)
}

fn default_true() -> bool {
    true
}

fn default_log_retention() -> usize {
    10
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            default_intensity: default_intensity(),
            remember_last_intensity: false,
            last_master_intensity: default_intensity(),
            last_hyper_mode: false,
            run_at_startup: false,
            open_panel_on_launch: true,
            hide_on_focus_loss: true,
            log_retention_count: default_log_retention(),
        }
    }
}

impl AppState {
    /// Master level and mode to apply once the displays are ready.
    pub fn launch_settings(&self) -> (Intensity, Mode) {
        if self.remember_last_intensity {
            let mode = if self.last_hyper_mode { Mode::Hyper } else { Mode::Normal };
            (self.last_master_intensity, mode)
        } else {
            (self.default_intensity, Mode::Normal)
        }
    }
}

enum WriteCommand {
    Update(AppState),
    Shutdown,
}

/// Settings kept in a small SQLite database. Reads come from memory;
/// writes are handed to a background thread.
pub struct StateManager {
    app_data_dir: PathBuf,
    state: RwLock<AppState>,
    write_sender: Sender<WriteCommand>,
    write_thread: Option<thread::JoinHandle<()>>,
}

impl StateManager {
    /// Opens `%APPDATA%\Nox\state.db`.
    pub fn new() -> Result<Self> {
        let app_data = std::env::var("APPDATA")
            .context("Failed to get APPDATA environment variable")?;
        Self::open_in(PathBuf::from(app_data).join("Nox"))
    }

    pub fn open_in(app_data_dir: impl Into<PathBuf>) -> Result<Self> {
        let app_data_dir = app_data_dir.into();
        std::fs::create_dir_all(&app_data_dir)
            .context("Failed to create app data directory")?;

        let db_path = app_data_dir.join("state.db");
        let conn = Connection::open(&db_path).context("Failed to open database")?;
        Self::init_database(&conn)?;
        let initial_state = Self::load_state(&conn)?;
        drop(conn);

        let (write_sender, write_receiver) = unbounded();
        let write_thread = thread::Builder::new()
            .name("nox-state-writer".into())
            .spawn(move || Self::write_worker(db_path, write_receiver))
            .context("Failed to spawn state writer")?;

        Ok(Self {
            app_data_dir,
            state: RwLock::new(initial_state),
            write_sender,
            write_thread: Some(write_thread),
        })
    }

    fn init_database(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .ok();
        if current_version.is_none() {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }

        Ok(())
    }

    fn load_state(conn: &Connection) -> Result<AppState> {
        let json: Option<String> = conn
            .query_row("SELECT value FROM state WHERE key = 'app_state'", [], |row| row.get(0))
            .ok();

        match json {
            Some(json) => match serde_json::from_str(&json) {
                Ok(state) => Ok(state),
                Err(e) => {
                    crate::log_warn!("Stored settings are unreadable, using defaults: {}", e);
                    Ok(AppState::default())
                }
            },
            None => Ok(AppState::default()),
        }
    }

    fn write_worker(db_path: PathBuf, receiver: Receiver<WriteCommand>) {
        let conn = match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                crate::log_error!("Failed to open database in write worker: {}", e);
                return;
            }
        };

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                WriteCommand::Update(state) => {
                    let json = match serde_json::to_string(&state) {
                        Ok(json) => json,
                        Err(e) => {
                            crate::log_error!("Failed to serialize settings: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = conn.execute(
                        "INSERT OR REPLACE INTO state (key, value) VALUES ('app_state', ?1)",
                        params![json],
                    ) {
                        crate::log_error!("Failed to write settings: {}", e);
                    }
                }
                WriteCommand::Shutdown => break,
            }
        }

        let _ = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE");
    }

    pub fn log_dir(&self) -> PathBuf {
        self.app_data_dir.join("logs")
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        f(&self.state.read())
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write();
        let before = state.clone();
        f(&mut state);
        if *state != before {
            let _ = self.write_sender.send(WriteCommand::Update(state.clone()));
        }
    }

    /// Records the values needed to resume the session next launch.
    pub fn remember_session(&self, master: Intensity, mode: Mode) {
        self.update(|s| {
            s.last_master_intensity = master;
            s.last_hyper_mode = mode.is_hyper();
        });
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        let _ = self.write_sender.send(WriteCommand::Shutdown);
        if let Some(handle) = self.write_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_starts_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateManager::open_in(dir.path()).unwrap();

        store.read(|s| {
            assert_eq!(s.default_intensity.percent(), 30);
            assert!(s.open_panel_on_launch);
            assert!(!s.remember_last_intensity);
        });
    }

    #[test]
    fn updates_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = StateManager::open_in(dir.path()).unwrap();
            store.update(|s| {
                s.default_intensity = Intensity::clamped(55);
                s.hide_on_focus_loss = false;
            });
            store.remember_session(Intensity::clamped(70), Mode::Hyper);
        }

        let store = StateManager::open_in(dir.path()).unwrap();
        store.read(|s| {
            assert_eq!(s.default_intensity.percent(), 55);
            assert!(!s.hide_on_focus_loss);
            assert_eq!(s.last_master_intensity.percent(), 70);
            assert!(s.last_hyper_mode);
        });
    }

    #[test]
    fn launch_settings_follow_remember_flag() {
        let mut state = AppState {
            last_master_intensity: Intensity::clamped(80),
            last_hyper_mode: true,
            ..AppState::default()
        };
        assert_eq!(state.launch_settings(), (Intensity::clamped(30), Mode::Normal));

        state.remember_last_intensity = true;
        assert_eq!(state.launch_settings(), (Intensity::clamped(80), Mode::Hyper));
    }

    #[test]
    fn remembered_session_is_resumed_once_enabled() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = StateManager::open_in(dir.path()).unwrap();
            store.remember_session(Intensity::clamped(65), Mode::Hyper);
            assert_eq!(store.read(|s| s.launch_settings()), (Intensity::clamped(30), Mode::Normal));

            store.update(|s| s.remember_last_intensity = true);
        }

        let store = StateManager::open_in(dir.path()).unwrap();
        assert_eq!(store.read(|s| s.launch_settings()), (Intensity::clamped(65), Mode::Hyper));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let state: AppState = serde_json::from_str(r#"{"run_at_startup": true}"#).unwrap();
        assert!(state.run_at_startup);
        assert_eq!(state.log_retention_count, 10);
        assert_eq!(state.default_intensity.percent(), 30);
    }
}
