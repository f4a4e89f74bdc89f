//! Per-application parameter profiles stored as `<app>_config.json`.

use crate::config::{ParameterConfig, UserSlot};
use crate::host::HostSink;
use crate::store::ParameterStore;
use crate::types::{Binding, BindingType};
use crate::{Result, StereoHmdError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Persistent subset of a [`ParameterConfig`]. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub depth: f32,
    pub convergence: f32,
    pub hmd_height: f32,
    pub pitch_enable: bool,
    pub yaw_enable: bool,
    pub pose_reset_key: u32,
    pub reset_xinput: bool,
    pub ctrl_toggle_key: u32,
    pub ctrl_toggle_type: i32,
    pub ctrl_xinput: bool,
    pub pitch_radius: f32,
    pub ctrl_deadzone: f32,
    pub ctrl_sensitivity: f32,
    pub num_user_settings: usize,
    pub user_settings: Vec<UserSlotRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSlotRecord {
    pub user_load_key: u32,
    pub user_store_key: u32,
    pub user_key_type: i32,
    pub user_depth: f32,
    pub user_convergence: f32,
    pub load_xinput: bool,
}

fn type_code(kind: Option<BindingType>) -> i32 {
    kind.map(BindingType::code).unwrap_or(0)
}

fn type_from_code(app: &str, field: &str, code: i32) -> Result<Option<BindingType>> {
    if code == 0 {
        return Ok(None);
    }
    BindingType::from_code(code)
        .map(Some)
        .ok_or_else(|| StereoHmdError::ProfileSchema {
            app: app.to_string(),
            reason: format!("{} has unknown binding type {}", field, code),
        })
}

impl ProfileRecord {
    pub fn from_config(config: &ParameterConfig) -> Self {
        Self {
            depth: config.depth,
            convergence: config.convergence,
            hmd_height: config.hmd_height,
            pitch_enable: config.pitch_enable,
            yaw_enable: config.yaw_enable,
            pose_reset_key: config.pose_reset_binding.code,
            reset_xinput: config.pose_reset_binding.is_gamepad(),
            ctrl_toggle_key: config.ctrl_toggle_binding.code,
            ctrl_toggle_type: type_code(config.ctrl_type),
            ctrl_xinput: config.ctrl_toggle_binding.is_gamepad(),
            pitch_radius: config.pitch_radius,
            ctrl_deadzone: config.ctrl_deadzone,
            ctrl_sensitivity: config.ctrl_sensitivity,
            num_user_settings: config.num_user_settings(),
            user_settings: config
                .user_slots
                .iter()
                .map(|slot| UserSlotRecord {
                    user_load_key: slot.load.code,
                    user_store_key: slot.store.code,
                    user_key_type: type_code(slot.kind),
                    user_depth: slot.depth,
                    user_convergence: slot.convergence,
                    load_xinput: slot.load.is_gamepad(),
                })
                .collect(),
        }
    }

    /// Overlay this record on `base`, resetting all transient hotkey state.
    /// Which controls the toggle binding may flip stays as in `base`.
    /// Fails without touching anything if the record is inconsistent.
    pub fn into_config(self, base: ParameterConfig, app: &str) -> Result<ParameterConfig> {
        if self.user_settings.len() < self.num_user_settings {
            return Err(StereoHmdError::ProfileSchema {
                app: app.to_string(),
                reason: format!(
                    "num_user_settings is {} but only {} user_settings present",
                    self.num_user_settings,
                    self.user_settings.len()
                ),
            });
        }

        let ctrl_type = type_from_code(app, "ctrl_toggle_type", self.ctrl_toggle_type)?;
        let user_slots = self
            .user_settings
            .iter()
            .take(self.num_user_settings)
            .map(|slot| {
                Ok(UserSlot::new(
                    Binding::from_parts(slot.user_load_key, slot.load_xinput),
                    Binding::keyboard(slot.user_store_key),
                    type_from_code(app, "user_key_type", slot.user_key_type)?,
                    slot.user_depth,
                    slot.user_convergence,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ParameterConfig {
            depth: self.depth,
            convergence: self.convergence,
            hmd_height: self.hmd_height,
            pitch_enable: self.pitch_enable,
            yaw_enable: self.yaw_enable,
            pitch_radius: self.pitch_radius,
            ctrl_deadzone: self.ctrl_deadzone,
            ctrl_sensitivity: self.ctrl_sensitivity,
            pose_reset_binding: Binding::from_parts(self.pose_reset_key, self.reset_xinput),
            reset_debounce: 0,
            ctrl_toggle_binding: Binding::from_parts(self.ctrl_toggle_key, self.ctrl_xinput),
            ctrl_type,
            ctrl_held: false,
            ctrl_debounce: 0,
            user_slots,
            ..base
        })
    }
}

/// Saves and restores per-application profiles.
pub struct ProfileManager {
    dir: PathBuf,
    host: Arc<dyn HostSink>,
    current_app: Mutex<Option<String>>,
}

impl ProfileManager {
    pub fn new(dir: impl Into<PathBuf>, host: Arc<dyn HostSink>) -> Self {
        Self {
            dir: dir.into(),
            host,
            current_app: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, app: &str) -> PathBuf {
        let name: String = app
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}_config.json", name))
    }

    /// Write the persistent subset of `config` for `app`.
    pub fn save(&self, app: &str, config: &ParameterConfig) -> Result<PathBuf> {
        let record = ProfileRecord::from_config(config);
        let path = self.path_for(app);
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;

        log::info!("Settings saved to {} profile", app);
        self.host.signal_success();
        Ok(path)
    }

    /// Read and validate the record for `app`.
    pub fn read(&self, app: &str) -> Result<ProfileRecord> {
        let path = self.path_for(app);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StereoHmdError::ProfileNotFound(app.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| StereoHmdError::ProfileSchema {
            app: app.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load `app`'s profile into `store`. On any error the live
    /// parameters are left untouched.
    pub fn load(&self, app: &str, store: &ParameterStore) -> Result<()> {
        let record = self.read(app)?;
        let config = record.into_config(store.snapshot(), app)?;
        store.apply(config);

        log::info!("Loaded {} profile", app);
        self.host.signal_success();
        Ok(())
    }

    /// Restore the startup configuration through the same apply path.
    pub fn load_defaults(&self, store: &ParameterStore) {
        store.load_defaults();
        self.host.signal_success();
    }

    pub fn current_app(&self) -> Option<String> {
        self.current_app.lock().ok().and_then(|app| app.clone())
    }

    /// Make `app` the current application and load its profile if it
    /// differs from the previous one. Returns whether the app changed.
    pub fn switch_app(&self, app: &str, store: &ParameterStore) -> bool {
        {
            let Ok(mut current) = self.current_app.lock() else {
                return false;
            };
            if current.as_deref() == Some(app) {
                return false;
            }
            *current = Some(app.to_string());
        }

        match self.load(app, store) {
            Ok(()) => {}
            Err(StereoHmdError::ProfileNotFound(_)) => log::info!("No profile found for {}", app),
            Err(e) => log::warn!("{}", e),
        }
        true
    }

    /// Save the live parameters under the current application.
    pub fn save_current(&self, store: &ParameterStore) -> Result<PathBuf> {
        let app = self.current_app().ok_or(StereoHmdError::NoApplication)?;
        self.save(&app, &store.snapshot())
    }
}
