//! Symbol tables for binding strings and the binding parser.
//!
//! Keyboard names resolve to Windows virtual-key codes and gamepad names
//! to XInput button bits, so stored profiles keep the same numeric codes
//! regardless of which input backend produced them.

use crate::types::{Binding, BindingType, GamepadButtons, KeyCode};
use std::collections::HashMap;
use std::sync::LazyLock;

// -- Keyboard virtual-key codes used by the fixed hotkeys --
pub const VK_CONTROL: KeyCode = 0x11;
pub const VK_F3: KeyCode = 0x72;
pub const VK_F4: KeyCode = 0x73;
pub const VK_F5: KeyCode = 0x74;
pub const VK_F6: KeyCode = 0x75;
pub const VK_F7: KeyCode = 0x76;
pub const VK_F8: KeyCode = 0x77;
pub const VK_F9: KeyCode = 0x78;
pub const VK_F10: KeyCode = 0x79;
pub const VK_OEM_PLUS: KeyCode = 0xBB;
pub const VK_OEM_MINUS: KeyCode = 0xBD;
pub const VK_OEM_4: KeyCode = 0xDB;
pub const VK_OEM_6: KeyCode = 0xDD;

/// Trigger travel (of 255) past which a trigger counts as a pressed button.
pub const TRIGGER_THRESHOLD: f32 = 30.0 / 255.0;

/// Separator for gamepad chords.
pub const CHORD_SEPARATOR: char = '+';

static KEYBOARD_TABLE: &[(&str, KeyCode)] = &[
    ("VK_LBUTTON", 0x01),
    ("VK_RBUTTON", 0x02),
    ("VK_CANCEL", 0x03),
    ("VK_MBUTTON", 0x04),
    ("VK_XBUTTON1", 0x05),
    ("VK_XBUTTON2", 0x06),
    ("VK_BACK", 0x08),
    ("VK_TAB", 0x09),
    ("VK_CLEAR", 0x0C),
    ("VK_RETURN", 0x0D),
    ("VK_SHIFT", 0x10),
    ("VK_CONTROL", VK_CONTROL),
    ("VK_MENU", 0x12),
    ("VK_PAUSE", 0x13),
    ("VK_CAPITAL", 0x14),
    ("VK_ESCAPE", 0x1B),
    ("VK_SPACE", 0x20),
    ("VK_PRIOR", 0x21),
    ("VK_NEXT", 0x22),
    ("VK_END", 0x23),
    ("VK_HOME", 0x24),
    ("VK_LEFT", 0x25),
    ("VK_UP", 0x26),
    ("VK_RIGHT", 0x27),
    ("VK_DOWN", 0x28),
    ("VK_SELECT", 0x29),
    ("VK_PRINT", 0x2A),
    ("VK_EXECUTE", 0x2B),
    ("VK_SNAPSHOT", 0x2C),
    ("VK_INSERT", 0x2D),
    ("VK_DELETE", 0x2E),
    ("VK_HELP", 0x2F),
    ("VK_NUMPAD0", 0x60),
    ("VK_NUMPAD1", 0x61),
    ("VK_NUMPAD2", 0x62),
    ("VK_NUMPAD3", 0x63),
    ("VK_NUMPAD4", 0x64),
    ("VK_NUMPAD5", 0x65),
    ("VK_NUMPAD6", 0x66),
    ("VK_NUMPAD7", 0x67),
    ("VK_NUMPAD8", 0x68),
    ("VK_NUMPAD9", 0x69),
    ("VK_F1", 0x70),
    ("VK_F2", 0x71),
    ("VK_F3", VK_F3),
    ("VK_F4", VK_F4),
    ("VK_F5", VK_F5),
    ("VK_F6", VK_F6),
    ("VK_F7", VK_F7),
    ("VK_F8", VK_F8),
    ("VK_F9", VK_F9),
    ("VK_F10", VK_F10),
    ("VK_F11", 0x7A),
    ("VK_F12", 0x7B),
    ("VK_F13", 0x7C),
    ("VK_F14", 0x7D),
    ("VK_F15", 0x7E),
    ("VK_F16", 0x7F),
    ("VK_F17", 0x80),
    ("VK_F18", 0x81),
    ("VK_F19", 0x82),
    ("VK_F20", 0x83),
    ("VK_F21", 0x84),
    ("VK_F22", 0x85),
    ("VK_F23", 0x86),
    ("VK_F24", 0x87),
    ("VK_OEM_PLUS", VK_OEM_PLUS),
    ("VK_OEM_MINUS", VK_OEM_MINUS),
    ("VK_OEM_4", VK_OEM_4),
    ("VK_OEM_6", VK_OEM_6),
];

static GAMEPAD_TABLE: &[(&str, GamepadButtons)] = &[
    ("XINPUT_GAMEPAD_A", GamepadButtons::A),
    ("XINPUT_GAMEPAD_B", GamepadButtons::B),
    ("XINPUT_GAMEPAD_X", GamepadButtons::X),
    ("XINPUT_GAMEPAD_Y", GamepadButtons::Y),
    ("XINPUT_GAMEPAD_RIGHT_SHOULDER", GamepadButtons::RIGHT_SHOULDER),
    ("XINPUT_GAMEPAD_LEFT_SHOULDER", GamepadButtons::LEFT_SHOULDER),
    ("XINPUT_GAMEPAD_LEFT_TRIGGER", GamepadButtons::LEFT_TRIGGER),
    ("XINPUT_GAMEPAD_RIGHT_TRIGGER", GamepadButtons::RIGHT_TRIGGER),
    ("XINPUT_GAMEPAD_DPAD_UP", GamepadButtons::DPAD_UP),
    ("XINPUT_GAMEPAD_DPAD_DOWN", GamepadButtons::DPAD_DOWN),
    ("XINPUT_GAMEPAD_DPAD_LEFT", GamepadButtons::DPAD_LEFT),
    ("XINPUT_GAMEPAD_DPAD_RIGHT", GamepadButtons::DPAD_RIGHT),
    ("XINPUT_GAMEPAD_START", GamepadButtons::START),
    ("XINPUT_GAMEPAD_BACK", GamepadButtons::BACK),
    ("XINPUT_GAMEPAD_LEFT_THUMB", GamepadButtons::LEFT_THUMB),
    ("XINPUT_GAMEPAD_RIGHT_THUMB", GamepadButtons::RIGHT_THUMB),
    ("XINPUT_GAMEPAD_GUIDE", GamepadButtons::GUIDE),
];

static KEYBOARD_KEYS: LazyLock<HashMap<&'static str, KeyCode>> =
    LazyLock::new(|| KEYBOARD_TABLE.iter().copied().collect());

static GAMEPAD_BUTTONS: LazyLock<HashMap<&'static str, GamepadButtons>> =
    LazyLock::new(|| GAMEPAD_TABLE.iter().copied().collect());

/// Look up a keyboard key name such as `VK_F3`.
pub fn keyboard_code(name: &str) -> Option<KeyCode> {
    KEYBOARD_KEYS.get(name).copied()
}

/// Look up a single gamepad button name such as `XINPUT_GAMEPAD_A`.
pub fn gamepad_button(name: &str) -> Option<GamepadButtons> {
    GAMEPAD_BUTTONS.get(name).copied()
}

/// Resolve a binding string.
///
/// A bare token found in the keyboard table binds as a key. Otherwise a
/// token from the gamepad table, or any `+`-joined chord, binds as a
/// gamepad chord; unknown chord tokens are dropped from the mask. Returns
/// `None` when the string resolves to nothing at all.
pub fn parse_binding(text: &str) -> Option<Binding> {
    let text = text.trim();
    if let Some(code) = keyboard_code(text) {
        return Some(Binding::keyboard(code));
    }

    if gamepad_button(text).is_none() && !text.contains(CHORD_SEPARATOR) {
        return None;
    }

    let mut mask = GamepadButtons::empty();
    for token in text.split(CHORD_SEPARATOR) {
        match gamepad_button(token.trim()) {
            Some(button) => mask |= button,
            None => log::warn!("Ignoring unknown gamepad token '{}' in '{}'", token, text),
        }
    }
    Some(Binding::chord(mask))
}

/// Resolve a store-binding string; store bindings are keyboard-only.
pub fn parse_store_binding(text: &str) -> Option<Binding> {
    keyboard_code(text.trim()).map(Binding::keyboard)
}

/// Resolve a binding type name (`switch`, `toggle`, `hold`).
pub fn parse_binding_type(text: &str) -> Option<BindingType> {
    BindingType::from_name(text.trim())
}
