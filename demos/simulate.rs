//! Drive a virtual HMD from scripted input and print the resulting poses.
//!
//! Usage: cargo run --example simulate
//! Set RUST_LOG=info to see lifecycle and profile messages.

use std::sync::Arc;
use std::time::{Duration, Instant};
use stereohmd::{GamepadState, HmdDevice, LogHost, Settings, SharedInput};

const SETTINGS: &str = r#"{
    "hmd_height": 1.6,
    "pitch_enable": true,
    "yaw_enable": true,
    "pitch_radius": 0.1,
    "ctrl_deadzone": 0.1,
    "ctrl_sensitivity": 1.5,
    "depth": 0.5,
    "convergence": 0.02,
    "user_settings": [
        { "load_key": "VK_NUMPAD1", "store_key": "VK_NUMPAD2", "key_type": "hold",
          "depth": 1.2, "convergence": 0.08 }
    ]
}"#;

const VK_NUMPAD1: u32 = 0x61;

fn main() {
    env_logger::init();

    let settings = match Settings::from_json_str(SETTINGS) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Bad settings: {}", e);
            std::process::exit(1);
        }
    };

    let input = Arc::new(SharedInput::new());
    let device = match HmdDevice::new(&settings, input.clone(), Arc::new(LogHost)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to create device: {}", e);
            std::process::exit(1);
        }
    };

    let poses = device.subscribe_poses(256);
    if let Err(e) = device.activate(0) {
        eprintln!("Failed to activate: {}", e);
        std::process::exit(1);
    }

    println!("depth={:.3} convergence={:.3}", device.depth(), device.convergence());

    // Look up and to the left for two seconds while holding the user preset.
    input.set_gamepad(Some(GamepadState {
        right_stick_x: -0.6,
        right_stick_y: 0.4,
        ..GamepadState::default()
    }));
    input.set_key(VK_NUMPAD1, true);

    let start = Instant::now();
    let mut count: u64 = 0;
    while start.elapsed() < Duration::from_secs(2) {
        match poses.recv_timeout(Duration::from_secs(1)) {
            Ok(p) => {
                count += 1;
                if count % 25 == 1 {
                    println!(
                        "pos=[{:+.4}, {:+.4}, {:+.4}]  rot=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]  depth={:.3} conv={:.3}",
                        p.position[0], p.position[1], p.position[2],
                        p.orientation[0], p.orientation[1], p.orientation[2], p.orientation[3],
                        device.depth(),
                        device.convergence(),
                    );
                }
            }
            Err(e) => {
                eprintln!("Pose stream error: {}", e);
                break;
            }
        }
    }

    input.set_key(VK_NUMPAD1, false);
    input.set_gamepad(None);
    std::thread::sleep(Duration::from_millis(100));
    println!("released: depth={:.3} convergence={:.3}", device.depth(), device.convergence());

    let elapsed = start.elapsed().as_secs_f64();
    println!("\nTotal: {} poses in {:.1}s ({:.1} Hz)", count, elapsed, count as f64 / elapsed);

    if let Err(e) = device.deactivate() {
        eprintln!("Failed to deactivate: {}", e);
    }
}
