//! Per-tick hotkey handling.
//!
//! Each tick first runs the fixed Ctrl-qualified hotkeys, then the
//! configurable bindings (control toggle, pose reset, user slots). The
//! configurable part works on a local copy of the configuration that is
//! committed back in one locked write at the end of the tick.

use crate::binding::is_active;
use crate::config::ParameterConfig;
use crate::keymap::{
    VK_CONTROL, VK_F10, VK_F3, VK_F4, VK_F5, VK_F6, VK_F7, VK_F8, VK_F9, VK_OEM_4, VK_OEM_6,
    VK_OEM_MINUS, VK_OEM_PLUS,
};
use crate::profile::ProfileManager;
use crate::store::ParameterStore;
use crate::types::{BindingType, InputSnapshot, KeyCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEPTH_STEP: f32 = 0.001;
pub const CONVERGENCE_STEP: f32 = 0.001;
pub const SENSITIVITY_STEP: f32 = 0.01;
pub const RADIUS_STEP: f32 = 0.01;

/// Fire on press when the counter is clear, re-arming it; otherwise count down.
fn debounced(counter: &mut u32, pressed: bool, max: u32) -> bool {
    if pressed && *counter == 0 {
        *counter = max;
        true
    } else {
        *counter = counter.saturating_sub(1);
        false
    }
}

pub struct HotkeyEngine {
    store: Arc<ParameterStore>,
    profiles: Arc<ProfileManager>,
    on_top: Arc<AtomicBool>,
    save_debounce: u32,
    top_debounce: u32,
    height_debounce: u32,
}

impl HotkeyEngine {
    pub fn new(
        store: Arc<ParameterStore>,
        profiles: Arc<ProfileManager>,
        on_top: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            profiles,
            on_top,
            save_debounce: 0,
            top_debounce: 0,
            height_debounce: 0,
        }
    }

    /// Run one control tick against `input`.
    pub fn tick(&mut self, input: &InputSnapshot) {
        self.fixed_hotkeys(input);

        let (mut config, generation) = self.store.working_copy();
        let reset = self.bindings(input, &mut config);
        self.store.commit(config, generation);
        if reset {
            self.store.set_reset_latch();
        }
    }

    fn fixed_hotkeys(&mut self, input: &InputSnapshot) {
        let ctrl = |key: KeyCode| input.is_key_down(VK_CONTROL) && input.is_key_down(key);
        let (disable_hotkeys, max) = {
            let config = self.store.snapshot();
            (config.disable_hotkeys, config.sleep_count_max)
        };
        let store = &self.store;

        if !disable_hotkeys {
            if ctrl(VK_F3) {
                store.adjust_depth(-DEPTH_STEP, true);
            } else if ctrl(VK_F4) {
                store.adjust_depth(DEPTH_STEP, true);
            }

            if ctrl(VK_F5) {
                store.adjust_convergence(-CONVERGENCE_STEP, true);
            } else if ctrl(VK_F6) {
                store.adjust_convergence(CONVERGENCE_STEP, true);
            }

            if ctrl(VK_F7) && self.save_debounce == 0 {
                self.save_debounce = max;
                if let Err(e) = self.profiles.save_current(store) {
                    log::warn!("Profile save failed: {}", e);
                }
            } else if ctrl(VK_F10) && self.save_debounce == 0 {
                self.save_debounce = max;
                self.profiles.load_defaults(store);
            } else {
                self.save_debounce = self.save_debounce.saturating_sub(1);
            }
        }

        if debounced(&mut self.top_debounce, ctrl(VK_F8), max) {
            let on_top = !self.on_top.load(Ordering::Relaxed);
            self.on_top.store(on_top, Ordering::Relaxed);
        }

        if debounced(&mut self.height_debounce, ctrl(VK_F9), max) {
            store.set_height_toggle();
        }

        if ctrl(VK_OEM_MINUS) {
            store.adjust_sensitivity(-SENSITIVITY_STEP);
        }
        if ctrl(VK_OEM_PLUS) {
            store.adjust_sensitivity(SENSITIVITY_STEP);
        }
        if ctrl(VK_OEM_4) {
            store.adjust_radius(-RADIUS_STEP);
        }
        if ctrl(VK_OEM_6) {
            store.adjust_radius(RADIUS_STEP);
        }
    }

    /// Configurable bindings against the working copy. Returns whether the
    /// pose reset fired.
    fn bindings(&self, input: &InputSnapshot, config: &mut ParameterConfig) -> bool {
        let max = config.sleep_count_max;

        // Pitch/yaw control toggle
        if is_active(&config.ctrl_toggle_binding, input) {
            match config.ctrl_type {
                Some(BindingType::Hold) if !config.ctrl_held => {
                    config.ctrl_held = true;
                    config.pitch_enable = false;
                    config.yaw_enable = false;
                }
                Some(BindingType::Toggle | BindingType::Switch) if config.ctrl_debounce == 0 => {
                    config.ctrl_debounce = max;
                    if config.pitch_set {
                        config.pitch_enable = !config.pitch_enable;
                    }
                    if config.yaw_set {
                        config.yaw_enable = !config.yaw_enable;
                    }
                }
                _ => {}
            }
        } else if config.ctrl_type == Some(BindingType::Hold) && config.ctrl_held {
            config.ctrl_held = false;
            config.pitch_enable = config.pitch_set;
            config.yaw_enable = config.yaw_set;
        }
        config.ctrl_debounce = config.ctrl_debounce.saturating_sub(1);

        let reset = debounced(
            &mut config.reset_debounce,
            is_active(&config.pose_reset_binding, input),
            max,
        );

        for slot in config.user_slots.iter_mut() {
            slot.debounce = slot.debounce.saturating_sub(1);

            if is_active(&slot.load, input) {
                match slot.kind {
                    Some(BindingType::Hold) if !slot.held => {
                        slot.prev_depth = self.store.depth();
                        slot.prev_convergence = self.store.convergence();
                        slot.held = true;
                        self.apply(slot.depth, slot.convergence);
                    }
                    Some(BindingType::Toggle) if slot.debounce == 0 => {
                        slot.debounce = max;
                        if self.store.depth() == slot.depth
                            && self.store.convergence() == slot.convergence
                        {
                            self.apply(slot.prev_depth, slot.prev_convergence);
                        } else {
                            slot.prev_depth = self.store.depth();
                            slot.prev_convergence = self.store.convergence();
                            self.apply(slot.depth, slot.convergence);
                        }
                    }
                    Some(BindingType::Switch) => self.apply(slot.depth, slot.convergence),
                    _ => {}
                }
            } else if slot.kind == Some(BindingType::Hold) && slot.held {
                slot.held = false;
                self.apply(slot.prev_depth, slot.prev_convergence);
            }

            if is_active(&slot.store, input) {
                slot.depth = self.store.depth();
                slot.convergence = self.store.convergence();
            }
        }

        reset
    }

    fn apply(&self, depth: f32, convergence: f32) {
        self.store.adjust_depth(depth, false);
        self.store.adjust_convergence(convergence, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::host::testing::RecordingHost;
    use crate::types::GamepadButtons;

    struct Rig {
        engine: HotkeyEngine,
        store: Arc<ParameterStore>,
        on_top: Arc<AtomicBool>,
        _dir: tempfile::TempDir,
    }

    // display_frequency 5 Hz gives an 8-tick debounce window.
    fn rig(json: &str) -> Rig {
        let mut settings = Settings::from_json_str(json).unwrap();
        settings.display_frequency = 5.0;
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(RecordingHost::default());
        let store = Arc::new(ParameterStore::new(
            ParameterConfig::from_settings(&settings),
            host.clone(),
        ));
        let profiles = Arc::new(ProfileManager::new(dir.path(), host));
        let on_top = Arc::new(AtomicBool::new(false));
        Rig {
            engine: HotkeyEngine::new(store.clone(), profiles, on_top.clone()),
            store,
            on_top,
            _dir: dir,
        }
    }

    fn keys(codes: &[KeyCode]) -> InputSnapshot {
        InputSnapshot {
            keys: codes.iter().copied().collect(),
            ..InputSnapshot::default()
        }
    }

    fn pad(buttons: GamepadButtons) -> InputSnapshot {
        InputSnapshot {
            buttons,
            gamepad_connected: true,
            ..InputSnapshot::default()
        }
    }

    const SLOT: &str = r#"{
        "depth": 0.5, "convergence": 0.02,
        "user_settings": [
            { "load_key": "VK_NUMPAD1", "store_key": "VK_NUMPAD2", "key_type": "TYPE",
              "depth": 1.5, "convergence": 0.1 }
        ]
    }"#;

    #[test]
    fn test_ctrl_f3_decreases_depth_per_tick() {
        let mut rig = rig(r#"{ "depth": 0.5 }"#);
        let held = keys(&[VK_CONTROL, VK_F3]);
        for _ in 0..10 {
            rig.engine.tick(&held);
        }
        assert!((rig.store.depth() - 0.49).abs() < 1e-5);

        rig.engine.tick(&keys(&[VK_F3]));
        assert!((rig.store.depth() - 0.49).abs() < 1e-5);
    }

    #[test]
    fn test_disable_hotkeys_blocks_depth() {
        let mut rig = rig(r#"{ "depth": 0.5, "disable_hotkeys": true }"#);
        rig.engine.tick(&keys(&[VK_CONTROL, VK_F4]));
        assert_eq!(rig.store.depth(), 0.5);
    }

    #[test]
    fn test_convergence_hotkeys() {
        let mut rig = rig(r#"{ "convergence": 0.02 }"#);
        for _ in 0..5 {
            rig.engine.tick(&keys(&[VK_CONTROL, VK_F6]));
        }
        assert!((rig.store.convergence() - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_toggle_slot() {
        let mut rig = rig(&SLOT.replace("TYPE", "toggle"));
        let press = keys(&[0x61]);
        let idle = keys(&[]);

        rig.engine.tick(&press);
        assert_eq!(rig.store.depth(), 1.5);
        assert_eq!(rig.store.convergence(), 0.1);

        // Bounce inside the debounce window does nothing.
        rig.engine.tick(&idle);
        rig.engine.tick(&press);
        rig.engine.tick(&press);
        assert_eq!(rig.store.depth(), 1.5);

        for _ in 0..10 {
            rig.engine.tick(&idle);
        }
        rig.engine.tick(&press);
        assert_eq!(rig.store.depth(), 0.5);
        assert_eq!(rig.store.convergence(), 0.02);
    }

    #[test]
    fn test_hold_slot_restores_pre_hold_values() {
        let mut rig = rig(&SLOT.replace("TYPE", "hold"));
        let press = keys(&[0x61]);

        rig.engine.tick(&press);
        assert_eq!(rig.store.depth(), 1.5);

        // Mutations while held are discarded on release.
        rig.store.adjust_depth(0.7, false);
        rig.engine.tick(&press);
        assert_eq!(rig.store.depth(), 0.7);

        rig.engine.tick(&keys(&[]));
        assert_eq!(rig.store.depth(), 0.5);
        assert_eq!(rig.store.convergence(), 0.02);
        assert!(!rig.store.snapshot().user_slots[0].held);
    }

    #[test]
    fn test_switch_slot_forces_every_tick() {
        let mut rig = rig(&SLOT.replace("TYPE", "switch"));
        rig.engine.tick(&keys(&[0x61]));
        assert_eq!(rig.store.depth(), 1.5);
        rig.store.adjust_depth(0.1, false);
        rig.engine.tick(&keys(&[0x61]));
        assert_eq!(rig.store.depth(), 1.5);
        rig.engine.tick(&keys(&[]));
        assert_eq!(rig.store.depth(), 1.5);
    }

    #[test]
    fn test_store_binding_captures_live_values() {
        let mut rig = rig(&SLOT.replace("TYPE", "switch"));
        rig.store.adjust_depth(0.9, false);
        rig.store.adjust_convergence(0.04, false);
        rig.engine.tick(&keys(&[0x62]));

        let slot = &rig.store.snapshot().user_slots[0];
        assert_eq!(slot.depth, 0.9);
        assert_eq!(slot.convergence, 0.04);
    }

    #[test]
    fn test_chord_slot() {
        let mut rig = rig(
            r#"{ "depth": 0.5, "user_settings": [
                { "load_key": "XINPUT_GAMEPAD_A+XINPUT_GAMEPAD_LEFT_TRIGGER",
                  "key_type": "switch", "depth": 2.0, "convergence": 0.0 } ] }"#,
        );
        rig.engine.tick(&pad(GamepadButtons::A));
        assert_eq!(rig.store.depth(), 0.5);
        rig.engine
            .tick(&pad(GamepadButtons::A | GamepadButtons::LEFT_TRIGGER));
        assert_eq!(rig.store.depth(), 2.0);
    }

    #[test]
    fn test_pose_reset_binding_sets_latch_once() {
        let mut rig = rig(r#"{ "pose_reset_key": "VK_NUMPAD7" }"#);
        rig.engine.tick(&keys(&[0x67]));
        assert!(rig.store.control_params().pose_reset);

        rig.store.clear_reset_latch();
        rig.engine.tick(&keys(&[0x67]));
        assert!(!rig.store.control_params().pose_reset);
    }

    #[test]
    fn test_control_toggle_only_flips_configured_controls() {
        let mut rig = rig(
            r#"{ "pitch_enable": true, "yaw_enable": false,
                 "ctrl_toggle_key": "VK_F1", "ctrl_toggle_type": "toggle" }"#,
        );
        rig.engine.tick(&keys(&[0x70]));
        let params = rig.store.control_params();
        assert!(!params.pitch_enable);
        assert!(!params.yaw_enable);

        for _ in 0..10 {
            rig.engine.tick(&keys(&[]));
        }
        rig.engine.tick(&keys(&[0x70]));
        let params = rig.store.control_params();
        assert!(params.pitch_enable);
        assert!(!params.yaw_enable);
    }

    #[test]
    fn test_control_toggle_survives_profile_roundtrip() {
        let mut rig = rig(
            r#"{ "pitch_enable": true, "yaw_enable": false,
                 "ctrl_toggle_key": "VK_F1", "ctrl_toggle_type": "toggle" }"#,
        );
        rig.engine.tick(&keys(&[0x70]));
        assert!(!rig.store.control_params().pitch_enable);

        let profiles = rig.engine.profiles.clone();
        profiles.save("game", &rig.store.snapshot()).unwrap();
        profiles.load("game", &rig.store).unwrap();
        assert!(!rig.store.control_params().pitch_enable);

        for _ in 0..20 {
            rig.engine.tick(&keys(&[]));
        }
        rig.engine.tick(&keys(&[0x70]));
        let params = rig.store.control_params();
        assert!(params.pitch_enable);
        assert!(!params.yaw_enable);
    }

    #[test]
    fn test_control_hold_suspends_while_held() {
        let mut rig = rig(
            r#"{ "pitch_enable": true, "yaw_enable": true,
                 "ctrl_toggle_key": "XINPUT_GAMEPAD_RIGHT_THUMB", "ctrl_toggle_type": "hold" }"#,
        );
        rig.engine.tick(&pad(GamepadButtons::RIGHT_THUMB));
        let params = rig.store.control_params();
        assert!(!params.pitch_enable && !params.yaw_enable);

        rig.engine.tick(&pad(GamepadButtons::empty()));
        let params = rig.store.control_params();
        assert!(params.pitch_enable && params.yaw_enable);
    }

    #[test]
    fn test_height_and_topmost_debounced() {
        let mut rig = rig(r#"{ "hmd_height": 1.4 }"#);
        for _ in 0..3 {
            rig.engine.tick(&keys(&[VK_CONTROL, VK_F9]));
            rig.engine.tick(&keys(&[VK_CONTROL, VK_F8]));
        }
        assert_eq!(rig.store.control_params().hmd_height, 0.1);
        assert!(rig.on_top.load(Ordering::Relaxed));
    }

    #[test]
    fn test_sensitivity_and_radius_hotkeys() {
        let mut rig = rig(r#"{ "yaw_enable": true, "ctrl_sensitivity": 1.0, "pitch_radius": 0.2 }"#);
        rig.engine.tick(&keys(&[VK_CONTROL, VK_OEM_PLUS, VK_OEM_4]));
        let config = rig.store.snapshot();
        assert!((config.ctrl_sensitivity - 1.01).abs() < 1e-6);
        assert!((config.pitch_radius - 0.19).abs() < 1e-6);
    }

    #[test]
    fn test_reload_defaults_hotkey() {
        let mut rig = rig(r#"{ "depth": 0.5 }"#);
        rig.store.adjust_depth(3.0, false);
        rig.engine.tick(&keys(&[VK_CONTROL, VK_F10]));
        assert_eq!(rig.store.depth(), 0.5);
        assert!(rig.store.control_params().pose_reset);
    }
}
