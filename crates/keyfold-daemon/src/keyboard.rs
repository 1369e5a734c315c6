use rdev::Key as RdevKey;

/// What a key-down means to the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    /// Modifiers, navigation and anything without a printable mapping.
    Ignored,
}

impl KeyInput {
    pub fn as_char(self) -> Option<char> {
        match self {
            KeyInput::Char(c) => Some(c),
            _ => None,
        }
    }
}

/// Classify a key-down from the hook into engine input.
///
/// Best effort: relies on the character name the OS reports for the key,
/// so shifted symbols come through when the platform provides them.
pub fn classify_key(key: RdevKey, name: Option<&str>) -> KeyInput {
    match key {
        RdevKey::Backspace => return KeyInput::Backspace,
        RdevKey::Return | RdevKey::KpReturn => return KeyInput::Char('\r'),
        RdevKey::Space => return KeyInput::Char(' '),
        RdevKey::Tab => return KeyInput::Char('\t'),
        _ => {}
    }

    rdev_key_to_char(key, name).map_or(KeyInput::Ignored, KeyInput::Char)
}

/// Convert an rdev key and its reported name to a printable character.
pub fn rdev_key_to_char(key: RdevKey, name: Option<&str>) -> Option<char> {
    // Punctuation keys whose name is sometimes reported for the unshifted symbol only
    let special_char = match (key, name) {
        (RdevKey::SemiColon, Some(":")) => Some(':'),
        (RdevKey::SemiColon, Some(";")) => Some(';'),
        (RdevKey::Quote, Some("\"")) => Some('"'),
        (RdevKey::Quote, Some("'")) => Some('\''),
        (RdevKey::Comma, Some("<")) => Some('<'),
        (RdevKey::Comma, Some(",")) => Some(','),
        (RdevKey::Dot, Some(">")) => Some('>'),
        (RdevKey::Dot, Some(".")) => Some('.'),
        (RdevKey::Slash, Some("?")) => Some('?'),
        (RdevKey::Slash, Some("/")) => Some('/'),
        (RdevKey::BackSlash, Some("|")) => Some('|'),
        (RdevKey::BackSlash, Some("\\")) => Some('\\'),
        (RdevKey::Equal, Some("+")) => Some('+'),
        _ => None,
    };

    if special_char.is_some() {
        return special_char;
    }

    // Regular single character keys
    let mut chars = name?.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c),
        _ => None,
    }
}
