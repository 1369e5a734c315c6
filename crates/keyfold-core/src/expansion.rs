use crate::buffer::SessionBuffer;
use crate::models::{ExpansionDecision, Snippet, Trigger};
use crate::placeholders::PlaceholderResolver;
use tracing::{debug, info, trace};

/// Incremental abbreviation matcher.
///
/// Owns one session buffer and a read-only snapshot of the snippet
/// dictionary. Snippets are scanned in stored order and the first match wins;
/// there is no longest-match preference.
pub struct ExpansionEngine {
    snippets: Vec<Snippet>,
    buffer: SessionBuffer,
    resolver: PlaceholderResolver,
    enabled: bool,
}

impl ExpansionEngine {
    pub fn new(snippets: Vec<Snippet>, capacity: usize, resolver: PlaceholderResolver) -> Self {
        Self {
            snippets,
            buffer: SessionBuffer::new(capacity),
            resolver,
            enabled: true,
        }
    }

    /// Replace the dictionary snapshot. The buffer is kept, so typing in
    /// progress is not lost across a reload.
    pub fn reload(&mut self, snippets: Vec<Snippet>) {
        info!("Engine dictionary reloaded with {} snippets", snippets.len());
        self.snippets = snippets;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn snippet_count(&self) -> usize {
        self.snippets.len()
    }

    pub fn buffer(&self) -> &SessionBuffer {
        &self.buffer
    }

    /// Feed one key-down and decide whether an expansion fires.
    pub fn process_key(
        &mut self,
        character: Option<char>,
        is_backspace: bool,
    ) -> Option<ExpansionDecision> {
        if is_backspace {
            self.buffer.backspace();
            trace!("Buffer after backspace: {:?}", self.buffer.contents());
            return None;
        }

        let c = character?;
        self.buffer.push(c);

        if !self.enabled {
            return None;
        }

        let typed_trigger = Trigger::from_char(c);
        // Trailing delimiter excluded from the candidate when one was typed.
        let skip = typed_trigger.map_or(0, Trigger::delimiter_len);
        trace!(
            "Buffer {:?}, trigger {:?}",
            self.buffer.contents(),
            typed_trigger
        );

        let matched = self.snippets.iter().find(|snippet| {
            snippet.is_active
                && match snippet.trigger {
                    Trigger::None => self.buffer.ends_with(&snippet.abbreviation, 0),
                    trigger => {
                        typed_trigger == Some(trigger)
                            && self.buffer.ends_with(&snippet.abbreviation, skip)
                    }
                }
        })?;

        let (replacement_text, cursor_back_offset) = self.resolver.expand(&matched.expansion);
        let decision = ExpansionDecision {
            delete_count: matched.abbreviation.chars().count() + matched.trigger.delimiter_len(),
            replacement_text,
            cursor_back_offset,
        };
        debug!(
            "Matched '{}' (trigger {}): delete {}, cursor back {}",
            matched.abbreviation, matched.trigger, decision.delete_count, decision.cursor_back_offset
        );

        self.buffer.clear();
        Some(decision)
    }
}
