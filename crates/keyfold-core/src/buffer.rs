use std::collections::VecDeque;

/// Rolling window of the most recently typed characters.
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    chars: VecDeque<char>,
    capacity: usize,
}

impl SessionBuffer {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a character, dropping the oldest once capacity is exceeded.
    pub fn push(&mut self, c: char) {
        self.chars.push_back(c);
        while self.chars.len() > self.capacity {
            self.chars.pop_front();
        }
    }

    /// Remove one character from the tail; no-op when empty.
    pub fn backspace(&mut self) {
        self.chars.pop_back();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the buffer, minus `skip` trailing characters, ends with `suffix`.
    pub fn ends_with(&self, suffix: &str, skip: usize) -> bool {
        let Some(end) = self.chars.len().checked_sub(skip) else {
            return false;
        };

        let mut window = self.chars.range(..end).rev();
        for expected in suffix.chars().rev() {
            match window.next() {
                Some(&actual) if actual == expected => {}
                _ => return false,
            }
        }
        true
    }

    pub fn last(&self) -> Option<char> {
        self.chars.back().copied()
    }

    pub fn contents(&self) -> String {
        self.chars.iter().collect()
    }
}
