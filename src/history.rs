use std::collections::VecDeque;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 7;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub prompt: String,
    pub answer: String,
}

/// Bounded conversation history; the oldest turn is evicted first.
#[derive(Debug)]
pub struct ChatHistory {
    turns: RwLock<VecDeque<ChatTurn>>,
    capacity: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, prompt: &str, answer: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut turns = self.turns.write().unwrap_or_else(|e| e.into_inner());
        while turns.len() >= self.capacity {
            turns.pop_front();
        }
        turns.push_back(ChatTurn {
            prompt: prompt.to_string(),
            answer: answer.to_string(),
        });
    }

    pub fn clear(&self) {
        self.turns
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn snapshot(&self) -> Vec<ChatTurn> {
        let turns = self.turns.read().unwrap_or_else(|e| e.into_inner());
        turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
