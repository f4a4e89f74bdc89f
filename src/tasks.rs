//! The three worker loops that run while a device is active.
//!
//! Every loop checks a shared stop flag at its head, so a tick in progress
//! always completes. [`DeviceTasks`] owns the threads and joins all of them
//! on shutdown.

use crate::host::HostSink;
use crate::hotkeys::HotkeyEngine;
use crate::input::InputSampler;
use crate::pose::PoseSynthesizer;
use crate::profile::ProfileManager;
use crate::store::ParameterStore;
use crate::types::Pose;
use crate::{Result, StereoHmdError};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pose synthesis period (~125 Hz).
pub const POSE_PERIOD: Duration = Duration::from_millis(8);
/// Window focus check period.
pub const FOCUS_PERIOD: Duration = Duration::from_secs(1);

/// Hotkey tick period for a display frequency in Hz, at least 1 ms.
pub fn control_period(display_frequency: f32) -> Duration {
    if display_frequency > 0.0 && display_frequency.is_finite() {
        Duration::from_millis(((1000.0 / display_frequency).floor() as u64).max(1))
    } else {
        Duration::from_millis(16)
    }
}

/// State the worker loops share with the device handle.
#[derive(Clone)]
pub(crate) struct TaskContext {
    pub sampler: InputSampler,
    pub store: Arc<ParameterStore>,
    pub profiles: Arc<ProfileManager>,
    pub host: Arc<dyn HostSink>,
    pub pose: Arc<Mutex<Pose>>,
    pub subscribers: Arc<Mutex<Vec<Sender<Pose>>>>,
    pub on_top: Arc<AtomicBool>,
}

/// Handle to the running pose, hotkey and focus threads.
pub struct DeviceTasks {
    stop_flag: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl DeviceTasks {
    /// Spawn all three loops. If any spawn fails the ones already
    /// started are stopped again before the error is returned.
    pub(crate) fn start(ctx: TaskContext) -> Result<DeviceTasks> {
        let mut tasks = DeviceTasks {
            stop_flag: Arc::new(AtomicBool::new(false)),
            threads: Vec::with_capacity(3),
        };

        let period = control_period(ctx.store.geometry().display_frequency);
        tasks.spawn("stereohmd-pose", {
            let ctx = ctx.clone();
            move |stop| pose_loop(ctx, stop)
        })?;
        tasks.spawn("stereohmd-hotkeys", {
            let ctx = ctx.clone();
            move |stop| hotkey_loop(ctx, period, stop)
        })?;
        tasks.spawn("stereohmd-focus", move |stop| focus_loop(ctx, stop))?;

        Ok(tasks)
    }

    fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = self.stop_flag.clone();
        let thread = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || body(stop))
            .map_err(|e| StereoHmdError::ThreadSpawn(format!("{}: {}", name, e)))?;
        self.threads.push(thread);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed) && !self.threads.is_empty()
    }

    /// Signal all loops and wait for each to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

impl Drop for DeviceTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleep for whatever is left of `period` after `started`.
fn sleep_remaining(period: Duration, started: Instant) {
    if let Some(remaining) = period.checked_sub(started.elapsed()) {
        std::thread::sleep(remaining);
    }
}

fn pose_loop(ctx: TaskContext, stop_flag: Arc<AtomicBool>) {
    let mut synth = PoseSynthesizer::new();
    let mut last_tick = Instant::now();

    log::info!("Pose task started");

    while !stop_flag.load(Ordering::Relaxed) {
        let started = Instant::now();
        let dt = started.duration_since(last_tick).as_secs_f64();
        last_tick = started;

        let input = ctx.sampler.sample();
        let params = ctx.store.control_params();
        let pose = synth.step(&input, &params, dt);
        if params.pose_reset {
            ctx.store.clear_reset_latch();
        }

        if let Ok(mut slot) = ctx.pose.lock() {
            *slot = pose;
        }
        ctx.host.publish_pose(ctx.store.device_index(), &pose);
        broadcast(&ctx.subscribers, pose);

        sleep_remaining(POSE_PERIOD, started);
    }

    log::info!("Pose task stopped");
}

/// Offer `pose` to every subscriber; full channels drop the sample,
/// disconnected ones are removed.
fn broadcast(subscribers: &Mutex<Vec<Sender<Pose>>>, pose: Pose) {
    let Ok(mut subscribers) = subscribers.lock() else {
        return;
    };
    subscribers.retain(|sender| match sender.try_send(pose) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::trace!("Pose subscriber full, dropping sample");
            true
        }
        Err(TrySendError::Disconnected(_)) => {
            log::debug!("Pose subscriber disconnected");
            false
        }
    });
}

fn hotkey_loop(ctx: TaskContext, period: Duration, stop_flag: Arc<AtomicBool>) {
    let mut engine = HotkeyEngine::new(ctx.store.clone(), ctx.profiles.clone(), ctx.on_top.clone());

    log::info!("Hotkey task started ({} ms tick)", period.as_millis());

    while !stop_flag.load(Ordering::Relaxed) {
        let started = Instant::now();
        engine.tick(&ctx.sampler.sample());
        sleep_remaining(period, started);
    }

    log::info!("Hotkey task stopped");
}

fn focus_loop(ctx: TaskContext, stop_flag: Arc<AtomicBool>) {
    let mut applied = false;

    while !stop_flag.load(Ordering::Relaxed) {
        let started = Instant::now();
        let on_top = ctx.on_top.load(Ordering::Relaxed);
        if on_top != applied {
            ctx.host.set_topmost(on_top);
            applied = on_top;
        }

        // Poll the stop flag between naps; shutdown never waits a full period.
        while started.elapsed() < FOCUS_PERIOD && !stop_flag.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}
