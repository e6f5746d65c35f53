use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{Key, KeyCode, ModifiersState, PhysicalKey};
use winit_gui_core::{Gui, Modifiers};

/// Feeds window keyboard events to [`Gui::process_key_shortcut`].
///
/// Keeps track of the modifier state, which winit reports separately from key presses.
/// Letters and digits are taken from the physical key so shortcuts keep working with
/// non-latin layouts and with modifiers that change the produced text.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyboardRouter {
    modifiers: Modifiers,
}

impl KeyboardRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modifiers currently held, as last reported by winit.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Handle `event`, returning whether it triggered a menu item.
    pub fn handle_event<T>(&mut self, gui: &Gui<T>, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = convert_modifiers(modifiers.state());
                false
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(gui, event),
            _ => false,
        }
    }

    fn handle_key<T>(&self, gui: &Gui<T>, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed || event.repeat {
            return false;
        }
        let Some(key) = shortcut_key(event) else {
            return false;
        };
        gui.process_key_shortcut(self.modifiers, key)
    }
}

fn shortcut_key(event: &KeyEvent) -> Option<char> {
    if let PhysicalKey::Code(code) = event.physical_key {
        if let Some(key) = keycode_char(code) {
            return Some(key);
        }
    }
    match &event.logical_key {
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(key), None) => Some(key),
                _ => None,
            }
        }
        _ => None,
    }
}

fn keycode_char(code: KeyCode) -> Option<char> {
    let key = match code {
        KeyCode::KeyA => 'a',
        KeyCode::KeyB => 'b',
        KeyCode::KeyC => 'c',
        KeyCode::KeyD => 'd',
        KeyCode::KeyE => 'e',
        KeyCode::KeyF => 'f',
        KeyCode::KeyG => 'g',
        KeyCode::KeyH => 'h',
        KeyCode::KeyI => 'i',
        KeyCode::KeyJ => 'j',
        KeyCode::KeyK => 'k',
        KeyCode::KeyL => 'l',
        KeyCode::KeyM => 'm',
        KeyCode::KeyN => 'n',
        KeyCode::KeyO => 'o',
        KeyCode::KeyP => 'p',
        KeyCode::KeyQ => 'q',
        KeyCode::KeyR => 'r',
        KeyCode::KeyS => 's',
        KeyCode::KeyT => 't',
        KeyCode::KeyU => 'u',
        KeyCode::KeyV => 'v',
        KeyCode::KeyW => 'w',
        KeyCode::KeyX => 'x',
        KeyCode::KeyY => 'y',
        KeyCode::KeyZ => 'z',
        KeyCode::Digit0 => '0',
        KeyCode::Digit1 => '1',
        KeyCode::Digit2 => '2',
        KeyCode::Digit3 => '3',
        KeyCode::Digit4 => '4',
        KeyCode::Digit5 => '5',
        KeyCode::Digit6 => '6',
        KeyCode::Digit7 => '7',
        KeyCode::Digit8 => '8',
        KeyCode::Digit9 => '9',
        _ => return None,
    };
    Some(key)
}

fn convert_modifiers(state: ModifiersState) -> Modifiers {
    let mut modifiers = Modifiers::NONE;
    if state.shift_key() {
        modifiers |= Modifiers::SHIFT;
    }
    if state.control_key() {
        modifiers |= Modifiers::CONTROL;
    }
    if state.alt_key() {
        modifiers |= Modifiers::ALT;
    }
    // Command on macOS, the Windows key elsewhere
    if state.meta_key() {
        modifiers |= Modifiers::SUPER;
    }
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_map_to_lowercase_chars() {
        assert_eq!(keycode_char(KeyCode::KeyA), Some('a'));
        assert_eq!(keycode_char(KeyCode::KeyZ), Some('z'));
        assert_eq!(keycode_char(KeyCode::Digit0), Some('0'));
        assert_eq!(keycode_char(KeyCode::Digit9), Some('9'));
    }

    #[test]
    fn other_keys_are_not_shortcut_keys() {
        assert_eq!(keycode_char(KeyCode::Enter), None);
        assert_eq!(keycode_char(KeyCode::ShiftLeft), None);
        assert_eq!(keycode_char(KeyCode::F1), None);
    }

    #[test]
    fn modifier_state_converts_bit_for_bit() {
        assert_eq!(convert_modifiers(ModifiersState::empty()), Modifiers::NONE);
        assert_eq!(convert_modifiers(ModifiersState::SHIFT), Modifiers::SHIFT);
        assert_eq!(
            convert_modifiers(ModifiersState::CONTROL | ModifiersState::ALT),
            Modifiers::CONTROL | Modifiers::ALT
        );
        assert_eq!(
            convert_modifiers(
                ModifiersState::SHIFT | ModifiersState::CONTROL | ModifiersState::ALT | ModifiersState::META
            ),
            Modifiers::ALL
        );
    }
}
