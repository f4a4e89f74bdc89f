use crate::config::{ParameterConfig, Settings};
use crate::host::HostSink;
use crate::input::{InputSampler, InputSource};
use crate::profile::ProfileManager;
use crate::store::ParameterStore;
use crate::tasks::{DeviceTasks, TaskContext};
use crate::types::{Eye, Pose};
use crate::{Result, StereoHmdError};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A virtual stereo HMD.
///
/// Owns the live parameters and profile storage. [`activate`](Self::activate)
/// starts the pose, hotkey and focus threads; [`deactivate`](Self::deactivate)
/// (or dropping the device) stops and joins them.
pub struct HmdDevice {
    sampler: InputSampler,
    host: Arc<dyn HostSink>,
    store: Arc<ParameterStore>,
    profiles: Arc<ProfileManager>,
    /// Last published pose.
    pose: Arc<Mutex<Pose>>,
    subscribers: Arc<Mutex<Vec<crossbeam_channel::Sender<Pose>>>>,
    on_top: Arc<AtomicBool>,
    tasks: Mutex<Option<DeviceTasks>>,
}

impl HmdDevice {
    /// Build a device from startup settings. Profiles live in
    /// [`Settings::resolve_profile_dir`].
    pub fn new(
        settings: &Settings,
        input: Arc<dyn InputSource>,
        host: Arc<dyn HostSink>,
    ) -> Result<HmdDevice> {
        Self::with_profile_dir(settings, settings.resolve_profile_dir(), input, host)
    }

    /// Build a device storing profiles under `profile_dir`.
    pub fn with_profile_dir(
        settings: &Settings,
        profile_dir: impl Into<PathBuf>,
        input: Arc<dyn InputSource>,
        host: Arc<dyn HostSink>,
    ) -> Result<HmdDevice> {
        settings.validate()?;

        let config = ParameterConfig::from_settings(settings);
        let store = Arc::new(ParameterStore::new(config, host.clone()));
        let profiles = Arc::new(ProfileManager::new(profile_dir, host.clone()));

        log::info!(
            "HMD configured: {}x{} render, fov={} depth={} convergence={} profiles={:?}",
            settings.render_width,
            settings.render_height,
            settings.fov,
            settings.depth,
            settings.convergence,
            profiles.dir()
        );

        Ok(HmdDevice {
            sampler: InputSampler::new(input),
            host,
            store,
            profiles,
            pose: Arc::new(Mutex::new(Pose::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            on_top: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(None),
        })
    }

    /// Start the worker threads under the runtime-assigned `device_index`.
    pub fn activate(&self, device_index: u32) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_some() {
            return Err(StereoHmdError::AlreadyActive);
        }

        self.store.set_device_index(device_index);
        *tasks = Some(DeviceTasks::start(TaskContext {
            sampler: self.sampler.clone(),
            store: self.store.clone(),
            profiles: self.profiles.clone(),
            host: self.host.clone(),
            pose: self.pose.clone(),
            subscribers: self.subscribers.clone(),
            on_top: self.on_top.clone(),
        })?);

        log::info!("HMD activated as device {}", device_index);
        Ok(())
    }

    /// Stop the worker threads and wait for all of them to exit.
    pub fn deactivate(&self) -> Result<()> {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(StereoHmdError::NotActive)?;
        tasks.stop();

        log::info!("HMD deactivated");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.is_some())
            .unwrap_or(false)
    }

    /// The most recently published pose.
    pub fn pose(&self) -> Pose {
        self.pose.lock().map(|pose| *pose).unwrap_or_default()
    }

    /// Stream of published poses. Samples are dropped while the channel
    /// is full; dropping the receiver unsubscribes.
    pub fn subscribe_poses(&self, capacity: usize) -> Receiver<Pose> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    /// Switch to `app`'s profile. Loads only when the application changed.
    pub fn load_settings(&self, app: &str) -> bool {
        self.profiles.switch_app(app, &self.store)
    }

    /// Save the live parameters for the current application.
    pub fn save_profile(&self) -> Result<PathBuf> {
        self.profiles.save_current(&self.store)
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn profiles(&self) -> &Arc<ProfileManager> {
        &self.profiles
    }

    pub fn depth(&self) -> f32 {
        self.store.depth()
    }

    pub fn convergence(&self) -> f32 {
        self.store.convergence()
    }

    pub fn projection_raw(&self, eye: Eye) -> [f32; 4] {
        self.store.projection_raw(eye)
    }

    /// Always-on-top flag as toggled by Ctrl+F8.
    pub fn is_on_top(&self) -> bool {
        self.on_top.load(Ordering::Relaxed)
    }
}

impl Drop for HmdDevice {
    fn drop(&mut self) {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tasks) = tasks {
            tasks.stop();
        }
    }
}
