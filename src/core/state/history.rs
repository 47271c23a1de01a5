// src/core/state/history.rs

//! A fixed-capacity ring of recently dispatched command names, used by `WAIT`
//! to decide whether the last command processed was a mutation.

use std::collections::VecDeque;

const CAPACITY: usize = 10;

/// Unlike the source this is grounded on (which pre-fills the ring with
/// empty strings and trims from the front on every push, so the first real
/// write still reports an empty top-of-stack), this ring starts empty and
/// only ever holds names that were actually pushed.
#[derive(Debug, Default)]
pub struct CommandHistoryRing {
    entries: VecDeque<String>,
}

impl CommandHistoryRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command_name: &str) {
        if self.entries.len() == CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(command_name.to_ascii_uppercase());
    }

    /// The most recently pushed command name, if any.
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(|s| s.as_str())
    }
}
