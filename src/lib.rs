//! # stereohmd - virtual stereoscopic HMD core
//!
//! Turns a 3D-capable flat display into a tracked HMD endpoint for a VR
//! runtime. Provides:
//! - Pose synthesis at ~125 Hz from right-stick pitch/yaw input
//! - Live depth/convergence hotkeys on keyboard keys or gamepad chords
//! - Per-application parameter profiles stored as JSON
//! - C FFI for integration with the runtime driver
//!
//! ## Quick Start
//! ```no_run
//! use stereohmd::{GamepadState, HmdDevice, LogHost, Settings, SharedInput};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let settings = Settings::from_json_str(r#"{ "yaw_enable": true }"#).unwrap();
//! let input = Arc::new(SharedInput::new());
//! let device = HmdDevice::new(&settings, input.clone(), Arc::new(LogHost)).unwrap();
//!
//! let poses = device.subscribe_poses(64);
//! device.activate(0).unwrap();
//! input.set_gamepad(Some(GamepadState { right_stick_x: 0.5, ..Default::default() }));
//! for _ in 0..100 {
//!     let pose = poses.recv_timeout(Duration::from_secs(1)).unwrap();
//!     println!("rot: {:?}", pose.orientation);
//! }
//! device.deactivate().unwrap();
//! ```

pub mod error;
pub mod types;
pub mod keymap;
pub mod input;
pub mod binding;
pub mod config;
pub mod host;
pub mod store;
pub mod pose;
pub mod hotkeys;
pub mod profile;
pub mod tasks;
pub mod device;
pub mod ffi;

pub use error::StereoHmdError;
pub use types::*;
pub use config::{ParameterConfig, Settings};
pub use device::HmdDevice;
pub use host::{HostEvent, HostSink, LogHost};
pub use input::{InputSampler, InputSource, SharedInput};
#[cfg(any(feature = "gilrs", feature = "device-query"))]
pub use input::InputPump;
pub use pose::PoseSynthesizer;
pub use profile::ProfileManager;
pub use store::ParameterStore;

/// Result type alias for stereohmd operations.
pub type Result<T> = std::result::Result<T, StereoHmdError>;
