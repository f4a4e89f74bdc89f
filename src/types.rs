use std::collections::HashSet;

/// Keyboard key identifier (Windows virtual-key code space).
pub type KeyCode = u32;

/// Synthesized 6DOF pose of the virtual HMD.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Unit quaternion [w, x, y, z].
    pub orientation: [f64; 4],
    /// Position in meters [x, y, z].
    pub position: [f64; 3],
    /// Meters per second.
    pub linear_velocity: [f64; 3],
    /// Radians per second [pitch, yaw, roll].
    pub angular_velocity: [f64; 3],
    /// Meters per second squared.
    pub linear_accel: [f64; 3],
    /// Radians per second squared [pitch, yaw, roll].
    pub angular_accel: [f64; 3],
    pub valid: bool,
    pub connected: bool,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            orientation: [1.0, 0.0, 0.0, 0.0],
            position: [0.0; 3],
            linear_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
            linear_accel: [0.0; 3],
            angular_accel: [0.0; 3],
            valid: false,
            connected: false,
        }
    }
}

bitflags::bitflags! {
    /// Gamepad button bitmap in XInput layout, extended with two synthetic
    /// trigger bits so chords can mix triggers and buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[repr(C)]
    pub struct GamepadButtons: u32 {
        const DPAD_UP        = 0x0001;
        const DPAD_DOWN      = 0x0002;
        const DPAD_LEFT      = 0x0004;
        const DPAD_RIGHT     = 0x0008;
        const START          = 0x0010;
        const BACK           = 0x0020;
        const LEFT_THUMB     = 0x0040;
        const RIGHT_THUMB    = 0x0080;
        const LEFT_SHOULDER  = 0x0100;
        const RIGHT_SHOULDER = 0x0200;
        /// Only reported by backends with the extended query.
        const GUIDE          = 0x0400;
        const A              = 0x1000;
        const B              = 0x2000;
        const X              = 0x4000;
        const Y              = 0x8000;
        const LEFT_TRIGGER   = 0x10000;
        const RIGHT_TRIGGER  = 0x20000;
    }
}

/// Raw state of gamepad 0 as reported by an input source.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadState {
    /// Digital buttons only; trigger bits are derived by the sampler.
    pub buttons: GamepadButtons,
    /// Right thumbstick, normalized to [-1, 1].
    pub right_stick_x: f32,
    pub right_stick_y: f32,
    /// Triggers, normalized to [0, 1].
    pub left_trigger: f32,
    pub right_trigger: f32,
}

/// One tick's worth of normalized input from keyboard and gamepad.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub keys: HashSet<KeyCode>,
    /// Digital buttons plus trigger bits past the threshold.
    pub buttons: GamepadButtons,
    pub gamepad_connected: bool,
    pub analog_x: f32,
    pub analog_y: f32,
    pub trigger_left: f32,
    pub trigger_right: f32,
}

impl InputSnapshot {
    pub fn is_key_down(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }
}

/// Where a binding's signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    Keyboard,
    GamepadChord,
}

/// A configured key or gamepad chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub source: BindingSource,
    /// Key code for keyboard bindings, button mask for chords.
    pub code: u32,
}

impl Binding {
    /// Key code 0 is never reported as down.
    pub const UNBOUND: Binding = Binding {
        source: BindingSource::Keyboard,
        code: 0,
    };

    pub fn keyboard(code: KeyCode) -> Self {
        Self {
            source: BindingSource::Keyboard,
            code,
        }
    }

    pub fn chord(buttons: GamepadButtons) -> Self {
        Self {
            source: BindingSource::GamepadChord,
            code: buttons.bits(),
        }
    }

    /// Rebuild from the persisted (code, is-gamepad) pair.
    pub fn from_parts(code: u32, gamepad: bool) -> Self {
        if gamepad {
            Self::chord(GamepadButtons::from_bits_truncate(code))
        } else {
            Self::keyboard(code)
        }
    }

    pub fn is_gamepad(&self) -> bool {
        self.source == BindingSource::GamepadChord
    }

    pub fn buttons(&self) -> GamepadButtons {
        GamepadButtons::from_bits_truncate(self.code)
    }
}

impl Default for Binding {
    fn default() -> Self {
        Self::UNBOUND
    }
}

/// Hotkey behaviour for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    /// Force the bound values every tick while active.
    Switch = 1,
    /// Alternate between bound and previous values on each press.
    Toggle = 2,
    /// Bound values while held, previous values on release.
    Hold = 3,
}

impl BindingType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(BindingType::Switch),
            2 => Some(BindingType::Toggle),
            3 => Some(BindingType::Hold),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "switch" => Some(BindingType::Switch),
            "toggle" => Some(BindingType::Toggle),
            "hold" => Some(BindingType::Hold),
            _ => None,
        }
    }
}

/// Stereo eye selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left = 0,
    Right = 1,
}
