//! Startup settings and the live parameter aggregate.

use crate::keymap;
use crate::types::{Binding, BindingType};
use crate::{Result, StereoHmdError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment override for the profile directory.
pub const PROFILE_DIR_ENV: &str = "STEREOHMD_PROFILE_DIR";

/// HMD height used by the height toggle for games with a bad head-height assumption.
pub const LOW_HMD_HEIGHT: f32 = 0.1;

/// Display settings handed over by the host at startup.
///
/// Missing keys fall back to [`Settings::default`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub window_width: u32,
    pub window_height: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub hmd_height: f32,
    pub aspect_ratio: f32,
    pub fov: f32,
    pub depth: f32,
    pub convergence: f32,
    pub disable_hotkeys: bool,
    pub display_latency: f32,
    pub display_frequency: f32,
    pub pitch_enable: bool,
    pub yaw_enable: bool,
    pub pose_reset_key: String,
    pub ctrl_toggle_key: String,
    pub ctrl_toggle_type: String,
    pub pitch_radius: f32,
    pub ctrl_deadzone: f32,
    pub ctrl_sensitivity: f32,
    pub user_settings: Vec<UserSlotSettings>,
    pub profile_dir: Option<PathBuf>,
}

/// One user slot as written in the settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct UserSlotSettings {
    pub load_key: String,
    pub store_key: String,
    pub key_type: String,
    pub depth: f32,
    pub convergence: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
            render_width: 1920,
            render_height: 1080,
            hmd_height: 1.0,
            aspect_ratio: 1.77778,
            fov: 90.0,
            depth: 0.5,
            convergence: 0.02,
            disable_hotkeys: false,
            display_latency: 0.011,
            display_frequency: 60.0,
            pitch_enable: false,
            yaw_enable: false,
            pose_reset_key: "VK_NUMPAD7".into(),
            ctrl_toggle_key: "XINPUT_GAMEPAD_RIGHT_THUMB".into(),
            ctrl_toggle_type: "toggle".into(),
            pitch_radius: 0.0,
            ctrl_deadzone: 0.05,
            ctrl_sensitivity: 1.0,
            user_settings: Vec::new(),
            profile_dir: None,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Settings> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Settings> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Profile directory: environment override, then settings, then `./profiles`.
    pub fn resolve_profile_dir(&self) -> PathBuf {
        match std::env::var(PROFILE_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self
                .profile_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("profiles")),
        }
    }

    /// Reject geometry the projection and tick math cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(StereoHmdError::InvalidSettings(format!(
                "fov {} outside (0, 180)",
                self.fov
            )));
        }
        if !(self.aspect_ratio > 0.0 && self.aspect_ratio.is_finite()) {
            return Err(StereoHmdError::InvalidSettings(format!(
                "aspect_ratio {} must be positive",
                self.aspect_ratio
            )));
        }
        if !(self.display_frequency > 0.0 && self.display_frequency.is_finite()) {
            return Err(StereoHmdError::InvalidSettings(format!(
                "display_frequency {} must be positive",
                self.display_frequency
            )));
        }
        Ok(())
    }
}

/// Fixed display geometry, immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub window_width: u32,
    pub window_height: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub aspect_ratio: f32,
    pub fov: f32,
    pub display_latency: f32,
    pub display_frequency: f32,
}

/// A user preset slot: load/store bindings, bound values and transient state.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSlot {
    pub load: Binding,
    /// Keyboard-only.
    pub store: Binding,
    /// `None` for an unrecognized type; such a slot never fires.
    pub kind: Option<BindingType>,
    pub depth: f32,
    pub convergence: f32,
    pub prev_depth: f32,
    pub prev_convergence: f32,
    pub held: bool,
    pub debounce: u32,
}

impl UserSlot {
    pub fn new(load: Binding, store: Binding, kind: Option<BindingType>, depth: f32, convergence: f32) -> Self {
        Self {
            load,
            store,
            kind,
            depth,
            convergence,
            prev_depth: 0.0,
            prev_convergence: 0.0,
            held: false,
            debounce: 0,
        }
    }
}

/// The live parameter aggregate.
///
/// `depth` and `convergence` mirror the lock-free values held by the
/// store; snapshots refresh them on read.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterConfig {
    pub geometry: DisplayGeometry,
    pub depth: f32,
    pub convergence: f32,
    pub disable_hotkeys: bool,
    pub hmd_height: f32,
    /// Debounce window in control ticks (~1.6 s).
    pub sleep_count_max: u32,

    pub pitch_enable: bool,
    pub yaw_enable: bool,
    /// Which controls the loaded configuration enabled; only these can be toggled.
    pub pitch_set: bool,
    pub yaw_set: bool,
    pub pitch_radius: f32,
    pub ctrl_deadzone: f32,
    pub ctrl_sensitivity: f32,

    pub pose_reset_binding: Binding,
    pub pose_reset: bool,
    pub reset_debounce: u32,

    pub ctrl_toggle_binding: Binding,
    pub ctrl_type: Option<BindingType>,
    pub ctrl_held: bool,
    pub ctrl_debounce: u32,

    pub user_slots: Vec<UserSlot>,
}

/// The subset of parameters the pose task reads every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParams {
    pub pitch_enable: bool,
    pub yaw_enable: bool,
    pub ctrl_deadzone: f32,
    pub ctrl_sensitivity: f32,
    pub pitch_radius: f32,
    pub hmd_height: f32,
    pub pose_reset: bool,
}

/// Debounce window of 1.6 s expressed in ticks at `display_frequency` Hz.
pub fn sleep_count_for(display_frequency: f32) -> u32 {
    if display_frequency <= 0.0 {
        return 0;
    }
    (1600.0 / (1000.0 / display_frequency as f64)).floor() as u32
}

fn resolve_binding(name: &str, text: &str) -> Binding {
    keymap::parse_binding(text).unwrap_or_else(|| {
        if !text.is_empty() {
            log::warn!("Unresolved {} '{}', leaving unbound", name, text);
        }
        Binding::UNBOUND
    })
}

impl ParameterConfig {
    pub fn from_settings(settings: &Settings) -> ParameterConfig {
        let user_slots = settings
            .user_settings
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let load = resolve_binding(&format!("user_load_key{}", i + 1), &slot.load_key);
                let store = keymap::parse_store_binding(&slot.store_key).unwrap_or_default();
                let kind = keymap::parse_binding_type(&slot.key_type);
                if kind.is_none() {
                    log::warn!("Unknown user_key_type{} '{}'", i + 1, slot.key_type);
                }
                UserSlot::new(load, store, kind, slot.depth, slot.convergence)
            })
            .collect();

        ParameterConfig {
            geometry: DisplayGeometry {
                window_width: settings.window_width,
                window_height: settings.window_height,
                render_width: settings.render_width,
                render_height: settings.render_height,
                aspect_ratio: settings.aspect_ratio,
                fov: settings.fov,
                display_latency: settings.display_latency,
                display_frequency: settings.display_frequency,
            },
            depth: settings.depth,
            convergence: settings.convergence,
            disable_hotkeys: settings.disable_hotkeys,
            hmd_height: settings.hmd_height,
            sleep_count_max: sleep_count_for(settings.display_frequency),
            pitch_enable: settings.pitch_enable,
            yaw_enable: settings.yaw_enable,
            pitch_set: settings.pitch_enable,
            yaw_set: settings.yaw_enable,
            pitch_radius: settings.pitch_radius,
            ctrl_deadzone: settings.ctrl_deadzone,
            ctrl_sensitivity: settings.ctrl_sensitivity,
            pose_reset_binding: resolve_binding("pose_reset_key", &settings.pose_reset_key),
            pose_reset: false,
            reset_debounce: 0,
            ctrl_toggle_binding: resolve_binding("ctrl_toggle_key", &settings.ctrl_toggle_key),
            ctrl_type: keymap::parse_binding_type(&settings.ctrl_toggle_type),
            ctrl_held: false,
            ctrl_debounce: 0,
            user_slots,
        }
    }

    pub fn num_user_settings(&self) -> usize {
        self.user_slots.len()
    }

    pub fn control_params(&self) -> ControlParams {
        ControlParams {
            pitch_enable: self.pitch_enable,
            yaw_enable: self.yaw_enable,
            ctrl_deadzone: self.ctrl_deadzone,
            ctrl_sensitivity: self.ctrl_sensitivity,
            pitch_radius: self.pitch_radius,
            hmd_height: self.hmd_height,
            pose_reset: self.pose_reset,
        }
    }
}
