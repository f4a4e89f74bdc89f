//! Keyboard and gamepad sampling.
//!
//! An [`InputSource`] reports the raw real-time state; [`InputSampler`]
//! folds it into one [`InputSnapshot`] per tick. [`SharedInput`] is the
//! source the device uses by default: the host (or one of the optional
//! device pumps) writes into it, the worker threads read from it.

use crate::keymap::TRIGGER_THRESHOLD;
use crate::types::{GamepadButtons, GamepadState, InputSnapshot, KeyCode};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Real-time keyboard and gamepad 0 state.
pub trait InputSource: Send + Sync {
    /// Keys currently held down.
    fn keys_down(&self) -> HashSet<KeyCode>;

    /// Gamepad 0, or `None` when no gamepad is present.
    fn gamepad(&self) -> Option<GamepadState>;
}

/// Produces normalized snapshots from an [`InputSource`].
#[derive(Clone)]
pub struct InputSampler {
    source: Arc<dyn InputSource>,
}

impl InputSampler {
    pub fn new(source: Arc<dyn InputSource>) -> Self {
        Self { source }
    }

    /// Read the current state. An absent gamepad yields zero axes and an
    /// empty button mask.
    pub fn sample(&self) -> InputSnapshot {
        let keys = self.source.keys_down();
        match self.source.gamepad() {
            Some(pad) => {
                let mut buttons = pad.buttons;
                if pad.left_trigger > TRIGGER_THRESHOLD {
                    buttons |= GamepadButtons::LEFT_TRIGGER;
                }
                if pad.right_trigger > TRIGGER_THRESHOLD {
                    buttons |= GamepadButtons::RIGHT_TRIGGER;
                }
                InputSnapshot {
                    keys,
                    buttons,
                    gamepad_connected: true,
                    analog_x: pad.right_stick_x.clamp(-1.0, 1.0),
                    analog_y: pad.right_stick_y.clamp(-1.0, 1.0),
                    trigger_left: pad.left_trigger.clamp(0.0, 1.0),
                    trigger_right: pad.right_trigger.clamp(0.0, 1.0),
                }
            }
            None => InputSnapshot {
                keys,
                ..InputSnapshot::default()
            },
        }
    }
}

#[derive(Default)]
struct SharedState {
    keys: HashSet<KeyCode>,
    gamepad: Option<GamepadState>,
}

/// Input state written by the host or a device pump.
#[derive(Default)]
pub struct SharedInput {
    state: Mutex<SharedState>,
}

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&self, code: KeyCode, down: bool) {
        if let Ok(mut state) = self.state.lock() {
            if down {
                state.keys.insert(code);
            } else {
                state.keys.remove(&code);
            }
        }
    }

    /// Replace the full set of held keys.
    pub fn set_keys(&self, keys: HashSet<KeyCode>) {
        if let Ok(mut state) = self.state.lock() {
            state.keys = keys;
        }
    }

    /// `None` marks the gamepad as disconnected.
    pub fn set_gamepad(&self, gamepad: Option<GamepadState>) {
        if let Ok(mut state) = self.state.lock() {
            state.gamepad = gamepad;
        }
    }
}

impl InputSource for SharedInput {
    fn keys_down(&self) -> HashSet<KeyCode> {
        self.state
            .lock()
            .map(|state| state.keys.clone())
            .unwrap_or_default()
    }

    fn gamepad(&self) -> Option<GamepadState> {
        self.state.lock().ok().and_then(|state| state.gamepad)
    }
}

#[cfg(any(feature = "gilrs", feature = "device-query"))]
pub use pump::InputPump;

#[cfg(any(feature = "gilrs", feature = "device-query"))]
mod pump {
    use super::SharedInput;
    use crate::{Result, StereoHmdError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const PUMP_PERIOD: Duration = Duration::from_millis(4);

    /// Background thread copying OS input state into a [`SharedInput`].
    ///
    /// The backend is created on the pump thread itself since neither
    /// gilrs nor device_query handles can be moved across threads.
    pub struct InputPump {
        stop_flag: Arc<AtomicBool>,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl InputPump {
        pub fn start(target: Arc<SharedInput>) -> Result<InputPump> {
            let stop_flag = Arc::new(AtomicBool::new(false));
            let stop_clone = stop_flag.clone();

            let thread = std::thread::Builder::new()
                .name("stereohmd-input".into())
                .spawn(move || pump_loop(target, stop_clone))
                .map_err(|e| StereoHmdError::ThreadSpawn(format!("input pump: {}", e)))?;

            Ok(InputPump {
                stop_flag,
                thread: Some(thread),
            })
        }

        pub fn stop(mut self) {
            self.shutdown();
        }

        fn shutdown(&mut self) {
            self.stop_flag.store(true, Ordering::Relaxed);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    impl Drop for InputPump {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn pump_loop(target: Arc<SharedInput>, stop_flag: Arc<AtomicBool>) {
        #[cfg(feature = "gilrs")]
        let mut gamepads = gamepad::GilrsGamepad::new();
        #[cfg(feature = "device-query")]
        let keyboard = keyboard::Keyboard::new();

        log::info!("Input pump started");

        while !stop_flag.load(Ordering::Relaxed) {
            #[cfg(feature = "gilrs")]
            target.set_gamepad(gamepads.as_mut().and_then(|g| g.poll()));
            #[cfg(feature = "device-query")]
            target.set_keys(keyboard.keys_down());

            std::thread::sleep(PUMP_PERIOD);
        }

        log::info!("Input pump stopping (stop flag set)");
    }

    #[cfg(feature = "gilrs")]
    mod gamepad {
        use crate::types::{GamepadButtons, GamepadState};
        use gilrs::{Axis, Button, Gilrs};

        const BUTTON_MAP: &[(Button, GamepadButtons)] = &[
            (Button::South, GamepadButtons::A),
            (Button::East, GamepadButtons::B),
            (Button::West, GamepadButtons::X),
            (Button::North, GamepadButtons::Y),
            (Button::LeftTrigger, GamepadButtons::LEFT_SHOULDER),
            (Button::RightTrigger, GamepadButtons::RIGHT_SHOULDER),
            (Button::Select, GamepadButtons::BACK),
            (Button::Start, GamepadButtons::START),
            (Button::Mode, GamepadButtons::GUIDE),
            (Button::LeftThumb, GamepadButtons::LEFT_THUMB),
            (Button::RightThumb, GamepadButtons::RIGHT_THUMB),
            (Button::DPadUp, GamepadButtons::DPAD_UP),
            (Button::DPadDown, GamepadButtons::DPAD_DOWN),
            (Button::DPadLeft, GamepadButtons::DPAD_LEFT),
            (Button::DPadRight, GamepadButtons::DPAD_RIGHT),
        ];

        pub struct GilrsGamepad {
            gilrs: Gilrs,
        }

        impl GilrsGamepad {
            /// `None` when gilrs cannot initialise; the pad then reads as absent.
            pub fn new() -> Option<Self> {
                match Gilrs::new() {
                    Ok(gilrs) => Some(Self { gilrs }),
                    Err(e) => {
                        log::warn!("Gamepad backend unavailable: {}", e);
                        None
                    }
                }
            }

            /// State of the first connected gamepad.
            pub fn poll(&mut self) -> Option<GamepadState> {
                while self.gilrs.next_event().is_some() {}

                let (_, pad) = self.gilrs.gamepads().find(|(_, pad)| pad.is_connected())?;

                let mut buttons = GamepadButtons::empty();
                for (button, bit) in BUTTON_MAP {
                    if pad.is_pressed(*button) {
                        buttons |= *bit;
                    }
                }
                let trigger = |button| pad.button_data(button).map(|d| d.value()).unwrap_or(0.0);

                Some(GamepadState {
                    buttons,
                    right_stick_x: pad.value(Axis::RightStickX),
                    right_stick_y: pad.value(Axis::RightStickY),
                    left_trigger: trigger(Button::LeftTrigger2),
                    right_trigger: trigger(Button::RightTrigger2),
                })
            }
        }
    }

    #[cfg(feature = "device-query")]
    mod keyboard {
        use crate::keymap;
        use crate::types::KeyCode;
        use device_query::{DeviceQuery, DeviceState, Keycode};
        use std::collections::HashSet;

        pub struct Keyboard {
            state: DeviceState,
        }

        impl Keyboard {
            pub fn new() -> Self {
                Self {
                    state: DeviceState::new(),
                }
            }

            pub fn keys_down(&self) -> HashSet<KeyCode> {
                self.state.get_keys().iter().filter_map(virtual_key).collect()
            }
        }

        fn virtual_key(key: &Keycode) -> Option<KeyCode> {
            let code = match key {
                Keycode::LControl | Keycode::RControl => keymap::VK_CONTROL,
                Keycode::LShift | Keycode::RShift => 0x10,
                Keycode::LAlt | Keycode::RAlt => 0x12,
                Keycode::Backspace => 0x08,
                Keycode::Tab => 0x09,
                Keycode::Enter => 0x0D,
                Keycode::CapsLock => 0x14,
                Keycode::Escape => 0x1B,
                Keycode::Space => 0x20,
                Keycode::PageUp => 0x21,
                Keycode::PageDown => 0x22,
                Keycode::End => 0x23,
                Keycode::Home => 0x24,
                Keycode::Left => 0x25,
                Keycode::Up => 0x26,
                Keycode::Right => 0x27,
                Keycode::Down => 0x28,
                Keycode::Insert => 0x2D,
                Keycode::Delete => 0x2E,
                Keycode::Numpad0 => 0x60,
                Keycode::Numpad1 => 0x61,
                Keycode::Numpad2 => 0x62,
                Keycode::Numpad3 => 0x63,
                Keycode::Numpad4 => 0x64,
                Keycode::Numpad5 => 0x65,
                Keycode::Numpad6 => 0x66,
                Keycode::Numpad7 => 0x67,
                Keycode::Numpad8 => 0x68,
                Keycode::Numpad9 => 0x69,
                Keycode::F1 => 0x70,
                Keycode::F2 => 0x71,
                Keycode::F3 => keymap::VK_F3,
                Keycode::F4 => keymap::VK_F4,
                Keycode::F5 => keymap::VK_F5,
                Keycode::F6 => keymap::VK_F6,
                Keycode::F7 => keymap::VK_F7,
                Keycode::F8 => keymap::VK_F8,
                Keycode::F9 => keymap::VK_F9,
                Keycode::F10 => keymap::VK_F10,
                Keycode::F11 => 0x7A,
                Keycode::F12 => 0x7B,
                Keycode::Minus => keymap::VK_OEM_MINUS,
                Keycode::Equal => keymap::VK_OEM_PLUS,
                Keycode::LeftBracket => keymap::VK_OEM_4,
                Keycode::RightBracket => keymap::VK_OEM_6,
                _ => return None,
            };
            Some(code)
        }
    }
}
