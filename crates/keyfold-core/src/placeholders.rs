//! Placeholder substitution for expansion templates.
//!
//! Templates may embed `{{date}}`, `{{time}}`, `{{datetime}}`, `{{clipboard}}`
//! and a single `{{cursor}}` marker. Substitution is one left-to-right pass:
//! text produced by a placeholder is never scanned again.

use crate::clipboard::{ClipboardAccess, SystemClipboard};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::warn;

pub const CURSOR_MARKER: &str = "{{cursor}}";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Wall-clock source for date and time placeholders.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Date,
    Time,
    DateTime,
    Clipboard,
    Cursor,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "date" => Some(Placeholder::Date),
            "time" => Some(Placeholder::Time),
            "datetime" => Some(Placeholder::DateTime),
            "clipboard" => Some(Placeholder::Clipboard),
            "cursor" => Some(Placeholder::Cursor),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct PlaceholderResolver {
    clock: Arc<dyn Clock>,
    clipboard: Arc<dyn ClipboardAccess>,
}

impl PlaceholderResolver {
    pub fn new(clock: Arc<dyn Clock>, clipboard: Arc<dyn ClipboardAccess>) -> Self {
        Self { clock, clipboard }
    }

    /// Resolver reading the local clock and the system clipboard.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(SystemClipboard))
    }

    /// Substitute every known placeholder and strip the cursor marker.
    ///
    /// The clock and the clipboard are each read at most once per call, so
    /// `{{date}}` and `{{time}}` in one template always agree.
    pub fn resolve(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut now: Option<DateTime<Local>> = None;
        let mut clipboard: Option<String> = None;
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];

            let Some(end) = after.find(CLOSE) else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            match Placeholder::parse(&after[..end]) {
                Some(placeholder) => {
                    self.substitute(placeholder, &mut now, &mut clipboard, &mut out);
                    rest = &after[end + CLOSE.len()..];
                }
                None => {
                    // Unknown token: keep one brace and rescan from the next, so
                    // a marker overlapping this opener is still found.
                    out.push('{');
                    rest = &rest[start + 1..];
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn substitute(
        &self,
        placeholder: Placeholder,
        now: &mut Option<DateTime<Local>>,
        clipboard: &mut Option<String>,
        out: &mut String,
    ) {
        match placeholder {
            Placeholder::Date => {
                let now = now.get_or_insert_with(|| self.clock.now());
                out.push_str(&now.format(DATE_FORMAT).to_string());
            }
            Placeholder::Time => {
                let now = now.get_or_insert_with(|| self.clock.now());
                out.push_str(&now.format(TIME_FORMAT).to_string());
            }
            Placeholder::DateTime => {
                let now = now.get_or_insert_with(|| self.clock.now());
                out.push_str(&now.format(DATETIME_FORMAT).to_string());
            }
            Placeholder::Clipboard => {
                let text = clipboard.get_or_insert_with(|| match self.clipboard.paste() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Clipboard access failed, substituting empty text: {}", e);
                        String::new()
                    }
                });
                out.push_str(text);
            }
            Placeholder::Cursor => {}
        }
    }

    /// Characters to the right of the caret after insertion.
    ///
    /// Counts the raw template text following the first cursor marker, so
    /// placeholders after the marker are measured by their template length,
    /// not their resolved length. Later cursor markers are stripped by
    /// [`resolve`](Self::resolve) and are not counted.
    pub fn cursor_offset(template: &str) -> usize {
        match template.find(CURSOR_MARKER) {
            Some(index) => {
                let tail = &template[index + CURSOR_MARKER.len()..];
                tail.replace(CURSOR_MARKER, "").chars().count()
            }
            None => 0,
        }
    }

    /// Resolve a template into its final text and caret offset.
    pub fn expand(&self, template: &str) -> (String, usize) {
        (self.resolve(template), Self::cursor_offset(template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KeyfoldError, Result};
    use chrono::TimeZone;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap()
        }
    }

    struct FakeClipboard(Option<&'static str>);

    impl ClipboardAccess for FakeClipboard {
        fn paste(&self) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| KeyfoldError::Clipboard("unavailable".to_string()))
        }

        fn copy(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn resolver(clipboard: Option<&'static str>) -> PlaceholderResolver {
        PlaceholderResolver::new(Arc::new(FixedClock), Arc::new(FakeClipboard(clipboard)))
    }

    #[test]
    fn substitutes_date_and_time() {
        let r = resolver(None);
        assert_eq!(r.resolve("on {{date}}"), "on 2024-03-09");
        assert_eq!(r.resolve("at {{time}}"), "at 07:05");
        assert_eq!(r.resolve("{{datetime}}!"), "2024-03-09 07:05!");
    }

    #[test]
    fn substitutes_clipboard() {
        let r = resolver(Some("pasted"));
        assert_eq!(r.resolve("[{{clipboard}}]"), "[pasted]");
    }

    #[test]
    fn clipboard_failure_yields_empty_text() {
        let r = resolver(None);
        assert_eq!(r.resolve("[{{clipboard}}] {{date}}"), "[] 2024-03-09");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let r = resolver(Some("{{date}} {{cursor}}"));
        assert_eq!(r.resolve("{{clipboard}}"), "{{date}} {{cursor}}");
    }

    #[test]
    fn strips_cursor_marker() {
        let r = resolver(None);
        assert_eq!(r.resolve("<b>{{cursor}}</b>"), "<b></b>");
        assert_eq!(r.resolve("a{{cursor}}b{{cursor}}c"), "abc");
    }

    #[test]
    fn unknown_and_unterminated_tokens_stay_literal() {
        let r = resolver(None);
        assert_eq!(r.resolve("{{name}} {{date}}"), "{{name}} 2024-03-09");
        assert_eq!(r.resolve("{{ {{time}}"), "{{ 07:05");
        assert_eq!(r.resolve("open {{date"), "open {{date");
        assert_eq!(r.resolve("no markers"), "no markers");
    }

    #[test]
    fn brace_before_placeholder_is_still_recognised() {
        let r = resolver(None);
        assert_eq!(r.resolve("{{{date}}}"), "{2024-03-09}");
        assert_eq!(
            r.expand("fn main() {{{cursor}}}"),
            ("fn main() {}".to_string(), 1)
        );
        assert_eq!(r.resolve("{{{{time}}"), "{{07:05");
    }

    #[test]
    fn cursor_offset_counts_trailing_characters() {
        assert_eq!(PlaceholderResolver::cursor_offset("no marker"), 0);
        assert_eq!(PlaceholderResolver::cursor_offset("end{{cursor}}"), 0);
        assert_eq!(PlaceholderResolver::cursor_offset("<b>{{cursor}}</b>"), 4);
        assert_eq!(PlaceholderResolver::cursor_offset("({{cursor}})é"), 2);
    }

    #[test]
    fn cursor_offset_uses_first_marker_only() {
        assert_eq!(PlaceholderResolver::cursor_offset("a{{cursor}}bc{{cursor}}d"), 3);
    }

    #[test]
    fn cursor_offset_undercounts_placeholders_after_marker() {
        // Known approximation pending a product decision: the offset is
        // measured on the raw template, so a placeholder after the marker
        // counts as its token length rather than its resolved length.
        let template = "{{cursor}} {{date}}";
        let (text, offset) = resolver(None).expand(template);
        assert_eq!(text, " 2024-03-09");
        assert_eq!(offset, " {{date}}".chars().count());
        assert_ne!(offset, text.chars().count());
    }
}
