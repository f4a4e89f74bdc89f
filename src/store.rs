//! Live stereo parameters shared between the worker threads.
//!
//! Depth and convergence live in two lock-free atomics so the hotkey task,
//! profile loads and geometry queries never contend on them. Everything
//! else sits behind one reader/writer lock and is replaced wholesale.

use crate::config::{ControlParams, DisplayGeometry, ParameterConfig, LOW_HMD_HEIGHT};
use crate::host::{HostEvent, HostSink};
use crate::types::Eye;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// `f32` stored as its bit pattern.
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Compare-and-swap retry loop. `update` is re-run against the freshly
    /// observed value on every failed attempt. Returns (old, new).
    fn update(&self, update: impl Fn(f32) -> f32) -> (f32, f32) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let old = f32::from_bits(current);
            let new = update(old);
            match self.0.compare_exchange_weak(
                current,
                new.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return (old, new),
                Err(observed) => current = observed,
            }
        }
    }
}

/// Concurrency-safe owner of the [`ParameterConfig`].
pub struct ParameterStore {
    config: RwLock<ParameterConfig>,
    /// Captured at startup for "load defaults".
    defaults: ParameterConfig,
    geometry: DisplayGeometry,
    /// Configured HMD height the height toggle returns to.
    user_height: f32,
    depth: AtomicF32,
    convergence: AtomicF32,
    host: Arc<dyn HostSink>,
    device_index: AtomicU32,
    /// Bumped under the write lock by every [`apply`](Self::apply).
    generation: AtomicU64,
}

impl ParameterStore {
    pub fn new(config: ParameterConfig, host: Arc<dyn HostSink>) -> Self {
        Self {
            defaults: config.clone(),
            geometry: config.geometry,
            user_height: config.hmd_height,
            depth: AtomicF32::new(config.depth),
            convergence: AtomicF32::new(config.convergence),
            config: RwLock::new(config),
            host,
            device_index: AtomicU32::new(0),
            generation: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ParameterConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ParameterConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Device index attached to host notifications.
    pub fn set_device_index(&self, index: u32) {
        self.device_index.store(index, Ordering::Relaxed);
    }

    pub fn device_index(&self) -> u32 {
        self.device_index.load(Ordering::Relaxed)
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Full copy of the configuration with live depth and convergence.
    pub fn snapshot(&self) -> ParameterConfig {
        let mut config = self.read().clone();
        config.depth = self.depth();
        config.convergence = self.convergence();
        config
    }

    /// The startup configuration.
    pub fn defaults(&self) -> &ParameterConfig {
        &self.defaults
    }

    pub fn control_params(&self) -> ControlParams {
        self.read().control_params()
    }

    /// Copy of the configuration to edit and hand back to
    /// [`commit`](Self::commit), tagged with the current generation.
    pub fn working_copy(&self) -> (ParameterConfig, u64) {
        let (mut config, generation) = {
            let current = self.read();
            (current.clone(), self.generation.load(Ordering::Acquire))
        };
        config.depth = self.depth();
        config.convergence = self.convergence();
        (config, generation)
    }

    /// Replace the whole configuration in one locked write.
    ///
    /// Skipped, returning `false`, when an [`apply`](Self::apply) landed
    /// after `generation` was taken: the applied configuration wins.
    /// Depth and convergence in `config` are ignored; use the adjust calls.
    /// The reset latch keeps its current value: it only moves through
    /// [`set_reset_latch`](Self::set_reset_latch) and
    /// [`clear_reset_latch`](Self::clear_reset_latch).
    pub fn commit(&self, mut config: ParameterConfig, generation: u64) -> bool {
        let mut current = self.write();
        if self.generation.load(Ordering::Acquire) != generation {
            log::debug!("Configuration replaced mid-tick, dropping working copy");
            return false;
        }
        config.pose_reset = current.pose_reset;
        *current = config;
        true
    }

    pub fn depth(&self) -> f32 {
        self.depth.load()
    }

    pub fn convergence(&self) -> f32 {
        self.convergence.load()
    }

    /// Set depth, or add to it when `is_delta`. Returns the new depth.
    pub fn adjust_depth(&self, value: f32, is_delta: bool) -> f32 {
        let (_, new) = self
            .depth
            .update(|current| if is_delta { current + value } else { value });
        self.host
            .notify(self.device_index(), HostEvent::DepthChanged(new));
        new
    }

    /// Set convergence, or add to it when `is_delta`. Returns the new
    /// convergence. The host gets a fresh projection only on change.
    pub fn adjust_convergence(&self, value: f32, is_delta: bool) -> f32 {
        let (old, new) = self
            .convergence
            .update(|current| if is_delta { current + value } else { value });
        if old != new {
            let device_index = self.device_index();
            self.host.notify(
                device_index,
                HostEvent::ProjectionChanged {
                    left: self.projection_raw(Eye::Left),
                    right: self.projection_raw(Eye::Right),
                },
            );
            self.host
                .notify(device_index, HostEvent::LensDistortionChanged);
        }
        new
    }

    /// Raw projection `[left, right, top, bottom]` for one eye, shifted
    /// horizontally by the live convergence.
    pub fn projection_raw(&self, eye: Eye) -> [f32; 4] {
        let horizontal = (self.geometry.fov.to_radians() / 2.0).tan();
        let vertical = (horizontal / self.geometry.aspect_ratio).atan().tan();
        let convergence = self.convergence();
        let shift = match eye {
            Eye::Left => convergence,
            Eye::Right => -convergence,
        };
        [-horizontal + shift, horizontal + shift, -vertical, vertical]
    }

    /// Ignored unless pitch or yaw control is enabled; floors at zero.
    pub fn adjust_sensitivity(&self, delta: f32) {
        let mut config = self.write();
        if config.pitch_enable || config.yaw_enable {
            config.ctrl_sensitivity = (config.ctrl_sensitivity + delta).max(0.0);
        }
    }

    /// Ignored unless pitch or yaw control is enabled; floors at zero.
    pub fn adjust_radius(&self, delta: f32) {
        let mut config = self.write();
        if config.pitch_enable || config.yaw_enable {
            config.pitch_radius = (config.pitch_radius + delta).max(0.0);
        }
    }

    /// Flip the HMD height between its configured value and [`LOW_HMD_HEIGHT`].
    pub fn set_height_toggle(&self) {
        let mut config = self.write();
        config.hmd_height = if config.hmd_height == self.user_height {
            LOW_HMD_HEIGHT
        } else {
            self.user_height
        };
        log::info!("HMD height set to {:.2}", config.hmd_height);
    }

    pub fn set_reset_latch(&self) {
        self.write().pose_reset = true;
    }

    pub fn clear_reset_latch(&self) {
        self.write().pose_reset = false;
    }

    /// Install `config` as the live configuration: depth and convergence
    /// go through the adjust path, the reset latch is set so the view
    /// recentres.
    pub fn apply(&self, config: ParameterConfig) {
        self.adjust_depth(config.depth, false);
        self.adjust_convergence(config.convergence, false);
        let mut current = self.write();
        *current = config;
        current.pose_reset = true;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Restore the startup configuration.
    pub fn load_defaults(&self) {
        self.apply(self.defaults.clone());
        log::info!("Loaded startup defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::host::testing::RecordingHost;

    fn store_with(settings: Settings) -> (ParameterStore, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let store = ParameterStore::new(ParameterConfig::from_settings(&settings), host.clone());
        (store, host)
    }

    #[test]
    fn test_concurrent_depth_deltas_are_not_lost() {
        let (store, _) = store_with(Settings {
            depth: 0.0,
            ..Settings::default()
        });

        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..100 {
                        store.adjust_depth(0.01, true);
                    }
                });
            }
        });

        assert!((store.depth() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_absolute_and_delta_depth() {
        let (store, host) = store_with(Settings::default());
        assert_eq!(store.adjust_depth(0.25, false), 0.25);
        assert!((store.adjust_depth(-0.05, true) - 0.20).abs() < 1e-6);
        assert_eq!(host.events()[0], HostEvent::DepthChanged(0.25));
    }

    #[test]
    fn test_convergence_change_notifies_projection() {
        let (store, host) = store_with(Settings {
            convergence: 0.0,
            fov: 90.0,
            aspect_ratio: 1.0,
            ..Settings::default()
        });

        store.adjust_convergence(0.1, true);
        let events = host.events();
        assert_eq!(events.len(), 2);
        match events[0] {
            HostEvent::ProjectionChanged { left, right } => {
                assert!((left[0] - (-0.9)).abs() < 1e-5);
                assert!((left[1] - 1.1).abs() < 1e-5);
                assert!((right[0] - (-1.1)).abs() < 1e-5);
                assert!((right[3] - 1.0).abs() < 1e-5);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[1], HostEvent::LensDistortionChanged);

        // Same value again: no notification.
        store.adjust_convergence(store.convergence(), false);
        assert_eq!(host.events().len(), 2);
    }

    #[test]
    fn test_sensitivity_and_radius_gated_and_clamped() {
        let (store, _) = store_with(Settings {
            ctrl_sensitivity: 1.0,
            pitch_radius: 0.1,
            ..Settings::default()
        });
        store.adjust_sensitivity(0.5);
        store.adjust_radius(0.5);
        let config = store.snapshot();
        assert_eq!(config.ctrl_sensitivity, 1.0);
        assert_eq!(config.pitch_radius, 0.1);

        let (store, _) = store_with(Settings {
            yaw_enable: true,
            ctrl_sensitivity: 0.02,
            pitch_radius: 0.1,
            ..Settings::default()
        });
        store.adjust_sensitivity(-0.05);
        store.adjust_radius(0.01);
        let config = store.snapshot();
        assert_eq!(config.ctrl_sensitivity, 0.0);
        assert!((config.pitch_radius - 0.11).abs() < 1e-6);
    }

    #[test]
    fn test_height_toggle() {
        let (store, _) = store_with(Settings {
            hmd_height: 1.6,
            ..Settings::default()
        });
        store.set_height_toggle();
        assert_eq!(store.control_params().hmd_height, LOW_HMD_HEIGHT);
        store.set_height_toggle();
        assert_eq!(store.control_params().hmd_height, 1.6);
    }

    #[test]
    fn test_reset_latch() {
        let (store, _) = store_with(Settings::default());
        assert!(!store.control_params().pose_reset);
        store.set_reset_latch();
        assert!(store.control_params().pose_reset);
        store.clear_reset_latch();
        assert!(!store.control_params().pose_reset);
    }

    #[test]
    fn test_load_defaults_restores_startup_values() {
        let (store, host) = store_with(Settings {
            depth: 0.4,
            convergence: 0.03,
            hmd_height: 1.2,
            ..Settings::default()
        });
        store.adjust_depth(2.0, false);
        store.adjust_convergence(0.5, false);
        store.set_height_toggle();

        store.load_defaults();
        let config = store.snapshot();
        assert_eq!(config.depth, 0.4);
        assert_eq!(config.convergence, 0.03);
        assert_eq!(config.hmd_height, 1.2);
        assert!(config.pose_reset);
        assert!(host.events().contains(&HostEvent::DepthChanged(0.4)));
    }

    #[test]
    fn test_commit_after_apply_keeps_applied_config() {
        let (store, _) = store_with(Settings {
            yaw_enable: true,
            ctrl_sensitivity: 1.0,
            ..Settings::default()
        });

        let (mut copy, generation) = store.working_copy();
        let mut loaded = store.snapshot();
        loaded.ctrl_sensitivity = 2.5;
        store.apply(loaded);

        copy.ctrl_debounce = 7;
        assert!(!store.commit(copy, generation));
        let config = store.snapshot();
        assert_eq!(config.ctrl_sensitivity, 2.5);
        assert_eq!(config.ctrl_debounce, 0);

        let (mut copy, generation) = store.working_copy();
        copy.ctrl_debounce = 7;
        assert!(store.commit(copy, generation));
        assert_eq!(store.snapshot().ctrl_debounce, 7);
        assert!(store.control_params().pose_reset);
    }
}
