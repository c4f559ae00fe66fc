//! Key model and keypad orientation mapping
//!
//! Remote controls and D-pads report Windows-style virtual-key codes. This
//! module decodes them into [`Key`]s and rotates directional and keypad
//! semantics with the screen. It is completely pure and testable without a
//! host.

use crate::domain::core::{Direction, Rotation};

/// Error types for key parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardError {
    /// Key name not known to [`Key::from_name`]
    UnknownKeyName(String),
}

impl std::fmt::Display for KeyboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyboardError::UnknownKeyName(name) => write!(f, "Unknown key name '{}'", name),
        }
    }
}

impl std::error::Error for KeyboardError {}

pub const VK_BACK: u32 = 0x08;
pub const VK_RETURN: u32 = 0x0D;
pub const VK_ESCAPE: u32 = 0x1B;
pub const VK_PRIOR: u32 = 0x21;
pub const VK_NEXT: u32 = 0x22;
pub const VK_LEFT: u32 = 0x25;
pub const VK_UP: u32 = 0x26;
pub const VK_RIGHT: u32 = 0x27;
pub const VK_DOWN: u32 = 0x28;
pub const VK_SELECT: u32 = 0x29;
pub const VK_0: u32 = 0x30;
pub const VK_NUMPAD0: u32 = 0x60;
pub const VK_MULTIPLY: u32 = 0x6A;
pub const VK_ADD: u32 = 0x6B;
pub const VK_SUBTRACT: u32 = 0x6D;
pub const VK_DIVIDE: u32 = 0x6F;

/// A decoded key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    /// D-pad center / OK
    Center,
    /// Number key 0-9, top row or numeric keypad
    Digit(u8),
    Enter,
    Back,
    PageUp,
    PageDown,
    /// Anything else, kept by code so activation keys can be remapped freely
    Other(u32),
}

impl Key {
    /// Decodes a virtual-key code
    pub fn from_vk_code(code: u32) -> Self {
        match code {
            VK_UP => Key::Up,
            VK_DOWN => Key::Down,
            VK_LEFT => Key::Left,
            VK_RIGHT => Key::Right,
            VK_SELECT => Key::Center,
            VK_RETURN => Key::Enter,
            VK_ESCAPE | VK_BACK => Key::Back,
            VK_PRIOR => Key::PageUp,
            VK_NEXT => Key::PageDown,
            c if (VK_0..=VK_0 + 9).contains(&c) => Key::Digit((c - VK_0) as u8),
            c if (VK_NUMPAD0..=VK_NUMPAD0 + 9).contains(&c) => Key::Digit((c - VK_NUMPAD0) as u8),
            other => Key::Other(other),
        }
    }

    /// A representative virtual-key code for this key
    pub fn vk_code(&self) -> u32 {
        match self {
            Key::Up => VK_UP,
            Key::Down => VK_DOWN,
            Key::Left => VK_LEFT,
            Key::Right => VK_RIGHT,
            Key::Center => VK_SELECT,
            Key::Enter => VK_RETURN,
            Key::Back => VK_ESCAPE,
            Key::PageUp => VK_PRIOR,
            Key::PageDown => VK_NEXT,
            Key::Digit(d) => VK_NUMPAD0 + u32::from(*d),
            Key::Other(code) => *code,
        }
    }

    /// Parses the key names used by replay scripts
    ///
    /// Accepts `up`, `down`, `left`, `right`, `center`, `enter`, `back`,
    /// `pageup`, `pagedown`, digits `0`-`9`, `star`, `plus`, `minus`,
    /// `slash` and raw codes such as `0x6A`.
    pub fn from_name(name: &str) -> Result<Self, KeyboardError> {
        let lower = name.trim().to_ascii_lowercase();
        let key = match lower.as_str() {
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "center" | "ok" => Key::Center,
            "enter" => Key::Enter,
            "back" | "escape" | "esc" => Key::Back,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "star" => Key::Other(VK_MULTIPLY),
            "plus" => Key::Other(VK_ADD),
            "minus" => Key::Other(VK_SUBTRACT),
            "slash" => Key::Other(VK_DIVIDE),
            digit if digit.len() == 1 && digit.as_bytes()[0].is_ascii_digit() => {
                Key::Digit(digit.as_bytes()[0] - b'0')
            }
            hex if hex.starts_with("0x") => u32::from_str_radix(&hex[2..], 16)
                .map(Key::from_vk_code)
                .map_err(|_| KeyboardError::UnknownKeyName(name.to_string()))?,
            _ => return Err(KeyboardError::UnknownKeyName(name.to_string())),
        };
        Ok(key)
    }

    /// Direction of an arrow key
    pub fn arrow_direction(&self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            _ => None,
        }
    }

    /// Direction of a keypad digit (2 up, 8 down, 4 left, 6 right)
    pub fn keypad_direction(&self) -> Option<Direction> {
        match self {
            Key::Digit(2) => Some(Direction::Up),
            Key::Digit(8) => Some(Direction::Down),
            Key::Digit(4) => Some(Direction::Left),
            Key::Digit(6) => Some(Direction::Right),
            _ => None,
        }
    }

    fn from_direction_arrow(direction: Direction) -> Key {
        match direction {
            Direction::Up => Key::Up,
            Direction::Down => Key::Down,
            Direction::Left => Key::Left,
            Direction::Right => Key::Right,
        }
    }
}

/// Press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// A raw key event as delivered by the host input thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn down(code: u32) -> Self {
        Self {
            code,
            action: KeyAction::Down,
        }
    }

    pub fn up(code: u32) -> Self {
        Self {
            code,
            action: KeyAction::Up,
        }
    }

    pub fn key(&self) -> Key {
        Key::from_vk_code(self.code)
    }

    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }
}

/// Rotates arrow and keypad semantics with the screen
///
/// Arrows turn by the rotation's quarter turns. Digits 1-9 are treated as
/// positions on the 3x3 keypad and rotated around the `5` key; `0` and every
/// other key are unchanged.
pub fn remap_for_rotation(key: Key, rotation: Rotation) -> Key {
    let turns = rotation.quarter_turns();
    if turns == 0 {
        return key;
    }

    if let Some(direction) = key.arrow_direction() {
        return Key::from_direction_arrow(direction.rotate_clockwise(turns));
    }

    if let Key::Digit(d @ 1..=9) = key {
        let index = i32::from(d - 1);
        let (mut row, mut col) = (index / 3 - 1, index % 3 - 1);
        for _ in 0..turns {
            // Clockwise quarter turn around the center key
            (row, col) = (col, -row);
        }
        let rotated = (row + 1) * 3 + (col + 1);
        return Key::Digit(rotated as u8 + 1);
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_event_conversion() {
        assert_eq!(Key::from_vk_code(0x26), Key::Up);
        assert_eq!(Key::from_vk_code(0x25), Key::Left);
        assert_eq!(Key::from_vk_code(0x0D), Key::Enter);
        assert_eq!(Key::from_vk_code(0x1B), Key::Back);
        assert_eq!(Key::from_vk_code(0x35), Key::Digit(5));
        assert_eq!(Key::from_vk_code(0x69), Key::Digit(9));
        assert_eq!(Key::from_vk_code(0x6A), Key::Other(0x6A));
    }

    #[test]
    fn vk_code_round_trips_for_named_keys() {
        for key in [Key::Up, Key::Center, Key::Digit(0), Key::Digit(7), Key::PageDown] {
            assert_eq!(Key::from_vk_code(key.vk_code()), key);
        }
    }

    #[test]
    fn key_names() {
        assert_eq!(Key::from_name("Up"), Ok(Key::Up));
        assert_eq!(Key::from_name(" 7 "), Ok(Key::Digit(7)));
        assert_eq!(Key::from_name("star"), Ok(Key::Other(VK_MULTIPLY)));
        assert_eq!(Key::from_name("0x26"), Ok(Key::Up));
        assert_eq!(
            Key::from_name("banana"),
            Err(KeyboardError::UnknownKeyName("banana".to_string()))
        );
    }

    #[test]
    fn keypad_directions() {
        assert_eq!(Key::Digit(2).keypad_direction(), Some(Direction::Up));
        assert_eq!(Key::Digit(6).keypad_direction(), Some(Direction::Right));
        assert_eq!(Key::Digit(5).keypad_direction(), None);
        assert_eq!(Key::Up.keypad_direction(), None);
    }

    #[test]
    fn no_rotation_is_identity() {
        for key in [Key::Up, Key::Digit(1), Key::Digit(0), Key::Enter] {
            assert_eq!(remap_for_rotation(key, Rotation::Rotation0), key);
        }
    }

    #[test]
    fn arrows_rotate_with_screen() {
        assert_eq!(remap_for_rotation(Key::Up, Rotation::Rotation90), Key::Right);
        assert_eq!(remap_for_rotation(Key::Right, Rotation::Rotation180), Key::Left);
        assert_eq!(remap_for_rotation(Key::Down, Rotation::Rotation270), Key::Right);
    }

    #[test]
    fn keypad_rotates_around_center() {
        // A clockwise quarter turn moves the top-left key to the top-right
        assert_eq!(remap_for_rotation(Key::Digit(1), Rotation::Rotation90), Key::Digit(3));
        assert_eq!(remap_for_rotation(Key::Digit(2), Rotation::Rotation90), Key::Digit(6));
        assert_eq!(remap_for_rotation(Key::Digit(5), Rotation::Rotation90), Key::Digit(5));
        assert_eq!(remap_for_rotation(Key::Digit(1), Rotation::Rotation180), Key::Digit(9));
        assert_eq!(remap_for_rotation(Key::Digit(4), Rotation::Rotation270), Key::Digit(8));
        assert_eq!(remap_for_rotation(Key::Digit(0), Rotation::Rotation90), Key::Digit(0));
    }

    #[test]
    fn keypad_rotation_matches_arrow_rotation() {
        for rotation in [Rotation::Rotation90, Rotation::Rotation180, Rotation::Rotation270] {
            for (digit, arrow) in [(2, Key::Up), (8, Key::Down), (4, Key::Left), (6, Key::Right)] {
                let rotated_digit = remap_for_rotation(Key::Digit(digit), rotation);
                let rotated_arrow = remap_for_rotation(arrow, rotation);
                assert_eq!(
                    rotated_digit.keypad_direction(),
                    rotated_arrow.arrow_direction()
                );
            }
        }
    }
}
