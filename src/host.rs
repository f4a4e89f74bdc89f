//! Boundary to the host VR runtime.

use crate::types::Pose;

/// Property change the host must be told about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// New eye separation (depth), published as the IPD property.
    DepthChanged(f32),
    /// Raw projection `[left, right, top, bottom]` for each eye.
    ProjectionChanged { left: [f32; 4], right: [f32; 4] },
    LensDistortionChanged,
}

/// Calls out of the engine into the host runtime.
pub trait HostSink: Send + Sync {
    fn publish_pose(&self, device_index: u32, pose: &Pose);

    fn notify(&self, device_index: u32, event: HostEvent);

    /// Keep the headset window above other windows, or release it.
    fn set_topmost(&self, on_top: bool);

    /// Audible or visible confirmation of a profile operation.
    fn signal_success(&self);
}

/// Host sink that only logs. Used when no runtime is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl HostSink for LogHost {
    fn publish_pose(&self, device_index: u32, pose: &Pose) {
        log::trace!("pose[{}]: pos={:?} rot={:?}", device_index, pose.position, pose.orientation);
    }

    fn notify(&self, device_index: u32, event: HostEvent) {
        log::debug!("event[{}]: {:?}", device_index, event);
    }

    fn set_topmost(&self, on_top: bool) {
        log::info!("Headset window always-on-top: {}", on_top);
    }

    fn signal_success(&self) {
        log::info!("Operation succeeded");
    }
}
