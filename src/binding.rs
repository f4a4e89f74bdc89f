use crate::types::{Binding, BindingSource, InputSnapshot};

/// Whether `binding` is active in `snapshot`.
///
/// A chord is active only when every bit of its mask is held at once.
/// An empty chord (every token failed to resolve) never activates.
pub fn is_active(binding: &Binding, snapshot: &InputSnapshot) -> bool {
    match binding.source {
        BindingSource::Keyboard => snapshot.is_key_down(binding.code),
        BindingSource::GamepadChord => {
            let mask = binding.buttons();
            snapshot.gamepad_connected && !mask.is_empty() && snapshot.buttons.contains(mask)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::parse_binding;
    use crate::types::GamepadButtons;

    fn pad(buttons: GamepadButtons) -> InputSnapshot {
        InputSnapshot {
            buttons,
            gamepad_connected: true,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn test_chord_requires_all_bits() {
        let binding = parse_binding("XINPUT_GAMEPAD_A+XINPUT_GAMEPAD_LEFT_TRIGGER").unwrap();

        assert!(!is_active(&binding, &pad(GamepadButtons::A)));
        assert!(!is_active(&binding, &pad(GamepadButtons::LEFT_TRIGGER)));
        assert!(is_active(
            &binding,
            &pad(GamepadButtons::A | GamepadButtons::LEFT_TRIGGER)
        ));
        assert!(is_active(
            &binding,
            &pad(GamepadButtons::A | GamepadButtons::LEFT_TRIGGER | GamepadButtons::B)
        ));
    }

    #[test]
    fn test_chord_inactive_without_gamepad() {
        let binding = Binding::chord(GamepadButtons::A);
        let mut snap = pad(GamepadButtons::A);
        snap.gamepad_connected = false;
        assert!(!is_active(&binding, &snap));
    }

    #[test]
    fn test_empty_chord_never_active() {
        let binding = parse_binding("BOGUS+ALSO_BOGUS").unwrap();
        assert!(!is_active(&binding, &pad(GamepadButtons::all())));
    }

    #[test]
    fn test_keyboard_binding() {
        let binding = Binding::keyboard(0x67);
        let mut snap = InputSnapshot::default();
        assert!(!is_active(&binding, &snap));
        snap.keys.insert(0x67);
        assert!(is_active(&binding, &snap));
    }

    #[test]
    fn test_unbound_never_active() {
        let mut snap = pad(GamepadButtons::all());
        snap.keys.insert(0x11);
        assert!(!is_active(&Binding::UNBOUND, &snap));
    }
}
