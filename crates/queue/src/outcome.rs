use std::sync::Mutex;

use pulsegate_core::CommandItem;

/// Sink for command items that have reached a terminal state (§6.3: "a
/// read-only view of ... recent command outcomes"). Grounded on the
/// teacher's dead-letter-sink pattern: a narrow trait the dispatcher calls
/// on every settle, decoupled from whatever an embedding admin surface
/// wants to do with the result.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, item: CommandItem);
}

/// Discards every outcome. The default when no embedder cares to observe them.
#[derive(Debug, Default)]
pub struct NullOutcomeSink;

impl OutcomeSink for NullOutcomeSink {
    fn record(&self, _item: CommandItem) {}
}

/// Keeps the last `capacity` settled items in memory, oldest first. Useful
/// for tests and for a minimal admin-surface "recent outcomes" view.
#[derive(Debug)]
pub struct InMemoryOutcomeSink {
    capacity: usize,
    items: Mutex<Vec<CommandItem>>,
}

impl InMemoryOutcomeSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn recent(&self) -> Vec<CommandItem> {
        self.items.lock().expect("outcome sink mutex poisoned").clone()
    }
}

impl OutcomeSink for InMemoryOutcomeSink {
    fn record(&self, item: CommandItem) {
        let mut items = self.items.lock().expect("outcome sink mutex poisoned");
        items.push(item);
        if items.len() > self.capacity {
            items.remove(0);
        }
    }
}
