use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Delimiter condition required before an abbreviation is recognized.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Space,
    Enter,
    /// Expand as soon as the buffer ends with the abbreviation.
    #[default]
    None,
}

impl Trigger {
    /// Classify a typed character as a trigger delimiter.
    pub fn from_char(c: char) -> Option<Trigger> {
        match c {
            ' ' => Some(Trigger::Space),
            '\r' | '\n' => Some(Trigger::Enter),
            _ => None,
        }
    }

    /// Characters the trigger itself adds to the target text.
    pub fn delimiter_len(self) -> usize {
        match self {
            Trigger::None => 0,
            Trigger::Space | Trigger::Enter => 1,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Space => "space",
            Trigger::Enter => "enter",
            Trigger::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "space" => Ok(Trigger::Space),
            "enter" | "return" => Ok(Trigger::Enter),
            "none" | "instant" => Ok(Trigger::None),
            other => Err(format!("unknown trigger '{}'", other)),
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Snippet {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub abbreviation: String,
    pub expansion: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
    #[serde(default = "Local::now")]
    pub updated_at: DateTime<Local>,
}

impl Snippet {
    pub fn new(abbreviation: impl Into<String>, expansion: impl Into<String>, trigger: Trigger) -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4(),
            abbreviation: abbreviation.into(),
            expansion: expansion.into(),
            label: None,
            trigger,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Matching identity: two snippets with the same abbreviation and trigger
    /// compete for the same keystrokes regardless of their ids.
    pub fn same_identity(&self, other: &Snippet) -> bool {
        self.abbreviation == other.abbreviation && self.trigger == other.trigger
    }

    pub fn update_expansion(&mut self, expansion: String) {
        self.expansion = expansion;
        self.updated_at = Local::now();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Local::now();
    }

    pub fn formatted_time(&self) -> String {
        let duration = Local::now().signed_duration_since(self.updated_at);

        if duration.num_seconds() < 60 {
            format!("{}s ago", duration.num_seconds())
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            format!("{}d ago", duration.num_days())
        }
    }
}

/// One classified key-down observed by the capture side.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    #[serde(default)]
    pub character: Option<char>,
    #[serde(default)]
    pub is_backspace: bool,
}

impl KeyEvent {
    pub fn character(c: char) -> Self {
        Self {
            character: Some(c),
            is_backspace: false,
        }
    }

    pub fn backspace() -> Self {
        Self {
            character: None,
            is_backspace: true,
        }
    }
}

/// Instructions for replacing a typed abbreviation in the focused application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExpansionDecision {
    /// Characters to remove backward from the caret.
    pub delete_count: usize,
    pub replacement_text: String,
    /// Left moves after insertion; 0 leaves the caret at the end.
    pub cursor_back_offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_classification() {
        assert_eq!(Trigger::from_char(' '), Some(Trigger::Space));
        assert_eq!(Trigger::from_char('\r'), Some(Trigger::Enter));
        assert_eq!(Trigger::from_char('\n'), Some(Trigger::Enter));
        assert_eq!(Trigger::from_char('\t'), None);
        assert_eq!(Trigger::from_char('a'), None);
    }

    #[test]
    fn trigger_parses_cli_spellings() {
        assert_eq!("Space".parse::<Trigger>().unwrap(), Trigger::Space);
        assert_eq!("return".parse::<Trigger>().unwrap(), Trigger::Enter);
        assert_eq!("none".parse::<Trigger>().unwrap(), Trigger::None);
        assert!("tab".parse::<Trigger>().is_err());
    }

    #[test]
    fn snippet_defaults_when_fields_missing() {
        let snippet: Snippet =
            serde_json::from_str(r#"{ "abbreviation": "btw", "expansion": "by the way" }"#)
                .unwrap();
        assert_eq!(snippet.trigger, Trigger::None);
        assert!(snippet.is_active);
        assert!(snippet.label.is_none());
    }

    #[test]
    fn identity_ignores_id_and_expansion() {
        let a = Snippet::new("btw", "by the way", Trigger::Space);
        let b = Snippet::new("btw", "between", Trigger::Space);
        let c = Snippet::new("btw", "by the way", Trigger::Enter);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert_ne!(a.id, b.id);
    }
}
