//! C FFI layer for stereohmd.
//!
//! Provides an opaque handle-based API for the host runtime driver.
//! The generated C header is written to `include/stereohmd.h` by cbindgen.

use crate::config::Settings;
use crate::device::HmdDevice;
use crate::error::LastError;
use crate::host::{HostEvent, HostSink, LogHost};
use crate::input::SharedInput;
use crate::types::{Eye, GamepadButtons, GamepadState, Pose};
use crate::{Result, StereoHmdError};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::sync::Arc;

/// Last error message for C consumers, kept per calling thread.
static LAST_ERROR: LastError = LastError::new();

/// Opaque device handle for C consumers.
pub struct ShDevice {
    device: HmdDevice,
    input: Arc<SharedInput>,
}

/// Pose in C-compatible layout. Orientation is `[w, x, y, z]`.
pub type ShPose = Pose;

/// Gamepad 0 state pushed by the host.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShGamepadState {
    /// XInput button bits.
    pub buttons: u32,
    /// Right thumbstick in [-1, 1].
    pub right_stick_x: f32,
    pub right_stick_y: f32,
    /// Trigger travel in [0, 1].
    pub left_trigger: f32,
    pub right_trigger: f32,
}

/// Host runtime callbacks. Every entry is optional; `user_data` is passed
/// back unchanged as the first argument.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShHostCallbacks {
    pub user_data: *mut c_void,
    pub publish_pose: Option<unsafe extern "C" fn(*mut c_void, u32, *const ShPose)>,
    /// New eye separation (IPD property).
    pub depth_changed: Option<unsafe extern "C" fn(*mut c_void, u32, f32)>,
    /// Raw projections, four floats per eye: left, right, top, bottom.
    pub projection_changed:
        Option<unsafe extern "C" fn(*mut c_void, u32, *const f32, *const f32)>,
    pub lens_distortion_changed: Option<unsafe extern "C" fn(*mut c_void, u32)>,
    pub set_topmost: Option<unsafe extern "C" fn(*mut c_void, bool)>,
    pub signal_success: Option<unsafe extern "C" fn(*mut c_void)>,
}

struct CallbackHost(ShHostCallbacks);

// The host guarantees its callbacks and user_data may be used from any thread.
unsafe impl Send for CallbackHost {}
unsafe impl Sync for CallbackHost {}

impl HostSink for CallbackHost {
    fn publish_pose(&self, device_index: u32, pose: &Pose) {
        if let Some(f) = self.0.publish_pose {
            unsafe { f(self.0.user_data, device_index, pose) };
        }
    }

    fn notify(&self, device_index: u32, event: HostEvent) {
        let cb = &self.0;
        unsafe {
            match event {
                HostEvent::DepthChanged(depth) => {
                    if let Some(f) = cb.depth_changed {
                        f(cb.user_data, device_index, depth);
                    }
                }
                HostEvent::ProjectionChanged { left, right } => {
                    if let Some(f) = cb.projection_changed {
                        f(cb.user_data, device_index, left.as_ptr(), right.as_ptr());
                    }
                }
                HostEvent::LensDistortionChanged => {
                    if let Some(f) = cb.lens_distortion_changed {
                        f(cb.user_data, device_index);
                    }
                }
            }
        }
    }

    fn set_topmost(&self, on_top: bool) {
        if let Some(f) = self.0.set_topmost {
            unsafe { f(self.0.user_data, on_top) };
        }
    }

    fn signal_success(&self) {
        if let Some(f) = self.0.signal_success {
            unsafe { f(self.0.user_data) };
        }
    }
}

unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(StereoHmdError::InvalidSettings(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| StereoHmdError::InvalidSettings(format!("{} is not UTF-8", what)))
}

unsafe fn create(settings_json: *const c_char, callbacks: *const ShHostCallbacks) -> Result<ShDevice> {
    let settings = if settings_json.is_null() {
        Settings::default()
    } else {
        Settings::from_json_str(str_arg(settings_json, "settings_json")?)?
    };

    let host: Arc<dyn HostSink> = if callbacks.is_null() {
        Arc::new(LogHost)
    } else {
        Arc::new(CallbackHost(*callbacks))
    };

    let input = Arc::new(SharedInput::new());
    let device = HmdDevice::new(&settings, input.clone(), host)?;
    Ok(ShDevice { device, input })
}

/// Create a device from a JSON settings document.
///
/// `settings_json` may be null for defaults; `callbacks` may be null to
/// only log host events. Returns NULL on error (check `sh_last_error()`).
///
/// # Safety
/// `settings_json` must be a valid null-terminated string or null.
/// `callbacks` must point to a valid `ShHostCallbacks` or be null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_create(
    settings_json: *const c_char,
    callbacks: *const ShHostCallbacks,
) -> *mut ShDevice {
    match create(settings_json, callbacks) {
        Ok(dev) => {
            LAST_ERROR.clear();
            Box::into_raw(Box::new(dev))
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Stop the device if active and free it.
///
/// # Safety
/// `dev` must be a pointer returned by `sh_device_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_destroy(dev: *mut ShDevice) {
    if !dev.is_null() {
        drop(Box::from_raw(dev));
    }
}

/// Start the device threads. Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_activate(dev: *const ShDevice, device_index: u32) -> c_int {
    if dev.is_null() {
        return -1;
    }
    match (*dev).device.activate(device_index) {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Stop and join the device threads. Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_deactivate(dev: *const ShDevice) -> c_int {
    if dev.is_null() {
        return -1;
    }
    match (*dev).device.deactivate() {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Copy the most recent pose into `out`. Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_get_pose(dev: *const ShDevice, out: *mut ShPose) -> c_int {
    if dev.is_null() || out.is_null() {
        return -1;
    }
    out.write((*dev).device.pose());
    0
}

/// Make `app_name` the current application, loading its profile if it
/// changed. Returns 1 if the application changed, 0 if not, -1 on error.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `app_name` a valid
/// null-terminated string or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_load_settings(
    dev: *const ShDevice,
    app_name: *const c_char,
) -> c_int {
    if dev.is_null() {
        return -1;
    }
    match str_arg(app_name, "app_name") {
        Ok(app) => (*dev).device.load_settings(app) as c_int,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Save the live parameters for the current application.
/// Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_save_profile(dev: *const ShDevice) -> c_int {
    if dev.is_null() {
        return -1;
    }
    match (*dev).device.save_profile() {
        Ok(_) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Live eye separation. Returns 0 for a null device.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_depth(dev: *const ShDevice) -> f32 {
    if dev.is_null() {
        return 0.0;
    }
    (*dev).device.depth()
}

/// Live convergence. Returns 0 for a null device.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_convergence(dev: *const ShDevice) -> f32 {
    if dev.is_null() {
        return 0.0;
    }
    (*dev).device.convergence()
}

/// Write `[left, right, top, bottom]` for `eye` (0 = left, 1 = right).
/// Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_device_projection_raw(
    dev: *const ShDevice,
    eye: c_int,
    out: *mut [f32; 4],
) -> c_int {
    if dev.is_null() || out.is_null() {
        return -1;
    }
    let eye = match eye {
        0 => Eye::Left,
        1 => Eye::Right,
        _ => return -1,
    };
    out.write((*dev).device.projection_raw(eye));
    0
}

/// Report a key transition using Windows virtual-key codes.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_input_key(dev: *const ShDevice, code: u32, down: bool) {
    if !dev.is_null() {
        (*dev).input.set_key(code, down);
    }
}

/// Report gamepad 0 state. A null `state` marks the gamepad disconnected.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `state` a valid
/// `ShGamepadState` or null.
#[no_mangle]
pub unsafe extern "C" fn sh_input_gamepad(dev: *const ShDevice, state: *const ShGamepadState) {
    if dev.is_null() {
        return;
    }
    let gamepad = state.as_ref().map(|s| GamepadState {
        buttons: GamepadButtons::from_bits_truncate(s.buttons),
        right_stick_x: s.right_stick_x,
        right_stick_y: s.right_stick_y,
        left_trigger: s.left_trigger,
        right_trigger: s.right_trigger,
    });
    (*dev).input.set_gamepad(gamepad);
}

/// Get the last error message raised on the calling thread. Returns NULL
/// if none. The pointer is valid until the next stereohmd call on this
/// thread that sets or clears the error.
#[no_mangle]
pub extern "C" fn sh_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::sync::atomic::{AtomicU32, Ordering};

    unsafe extern "C" fn count_depth(user_data: *mut c_void, _index: u32, _depth: f32) {
        let counter = &*(user_data as *const AtomicU32);
        counter.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_create_rejects_bad_json() {
        let json = CString::new("{ not json").unwrap();
        let dev = unsafe { sh_device_create(json.as_ptr(), std::ptr::null()) };
        assert!(dev.is_null());
        assert!(!sh_last_error().is_null());
    }

    #[test]
    fn test_device_roundtrip_through_c_api() {
        let counter = AtomicU32::new(0);
        let callbacks = ShHostCallbacks {
            user_data: &counter as *const AtomicU32 as *mut c_void,
            publish_pose: None,
            depth_changed: Some(count_depth),
            projection_changed: None,
            lens_distortion_changed: None,
            set_topmost: None,
            signal_success: None,
        };
        let json = CString::new(r#"{ "depth": 0.25, "convergence": 0.0, "fov": 90.0, "aspect_ratio": 1.0 }"#).unwrap();

        unsafe {
            let dev = sh_device_create(json.as_ptr(), &callbacks);
            assert!(!dev.is_null());
            assert_eq!(sh_device_depth(dev), 0.25);

            let mut proj = [0.0f32; 4];
            assert_eq!(sh_device_projection_raw(dev, 0, &mut proj), 0);
            assert!((proj[1] - 1.0).abs() < 1e-5);
            assert_eq!(sh_device_projection_raw(dev, 7, &mut proj), -1);

            (*dev).device.store().adjust_depth(0.3, false);
            assert_eq!(counter.load(Ordering::SeqCst), 1);

            sh_input_key(dev, 0x61, true);
            let pad = ShGamepadState {
                buttons: 0x1000,
                right_stick_x: 0.5,
                right_stick_y: 0.0,
                left_trigger: 0.0,
                right_trigger: 0.0,
            };
            sh_input_gamepad(dev, &pad);
            let snapshot = crate::input::InputSampler::new((*dev).input.clone()).sample();
            assert!(snapshot.is_key_down(0x61));
            assert!(snapshot.buttons.contains(GamepadButtons::A));

            sh_input_gamepad(dev, std::ptr::null());
            let snapshot = crate::input::InputSampler::new((*dev).input.clone()).sample();
            assert!(!snapshot.gamepad_connected);

            assert_eq!(sh_device_save_profile(dev), -1);
            assert_eq!(sh_device_deactivate(dev), -1);
            sh_device_destroy(dev);
        }
    }
}
