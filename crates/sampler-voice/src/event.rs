//! Timestamped input events consumed by the voice pool's dispatcher.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    Cc { controller: u8, value: u8 },
    PitchBend { value: u16 },
}

/// One scheduled input event. `tie_break_index` is assigned by
/// [`EventBuffer::push`] as an insertion counter so a stable sort by
/// `(time_frames, tie_break_index)` reproduces insertion order for equal
/// timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time_frames: u32,
    pub kind: EventKind,
    pub channel: u8,
    pub tie_break_index: u32,
}

/// Fixed-capacity event queue for one `render` cycle. Overflow silently
/// drops new events (logged by the caller), matching the spec's "never
/// throws in the audio thread" contract.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Event>,
    capacity: usize,
    next_tie_break: u32,
    dropped: u64,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity), capacity, next_tie_break: 0, dropped: 0 }
    }

    /// Append an event, dropping it if the buffer is at capacity. Returns
    /// `false` when the event was dropped.
    pub fn push(&mut self, time_frames: u32, channel: u8, kind: EventKind) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            tracing::debug!(capacity = self.capacity, "event buffer full, dropping event");
            return false;
        }
        let tie_break_index = self.next_tie_break;
        self.next_tie_break += 1;
        self.events.push(Event { time_frames, kind, channel, tie_break_index });
        true
    }

    /// Stable-sort by `(time_frames, tie_break_index)` -- already the
    /// insertion order for equal timestamps since `tie_break_index` is
    /// monotonic, but an explicit sort keeps the contract independent of
    /// `Vec::push` order guarantees.
    pub fn sorted(&mut self) -> &[Event] {
        self.events.sort_by_key(|e| (e.time_frames, e.tie_break_index));
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.next_tie_break = 0;
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_sort_preserves_insertion_order_for_equal_timestamps() {
        let mut buf = EventBuffer::new(8);
        buf.push(10, 0, EventKind::Cc { controller: 1, value: 1 });
        buf.push(10, 0, EventKind::Cc { controller: 2, value: 2 });
        buf.push(10, 0, EventKind::Cc { controller: 3, value: 3 });
        let sorted = buf.sorted();
        let controllers: Vec<u8> = sorted
            .iter()
            .map(|e| match e.kind {
                EventKind::Cc { controller, .. } => controller,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(controllers, vec![1, 2, 3]);
    }

    #[test]
    fn sorts_by_time_first() {
        let mut buf = EventBuffer::new(8);
        buf.push(50, 0, EventKind::NoteOff { key: 60 });
        buf.push(0, 0, EventKind::NoteOn { key: 60, velocity: 100 });
        let sorted = buf.sorted();
        assert_eq!(sorted[0].time_frames, 0);
        assert_eq!(sorted[1].time_frames, 50);
    }

    #[test]
    fn overflow_drops_and_counts() {
        let mut buf = EventBuffer::new(1);
        assert!(buf.push(0, 0, EventKind::NoteOff { key: 1 }));
        assert!(!buf.push(0, 0, EventKind::NoteOff { key: 2 }));
        assert_eq!(buf.dropped_count(), 1);
    }

    #[test]
    fn clear_empties_and_resets_tie_break() {
        let mut buf = EventBuffer::new(4);
        buf.push(0, 0, EventKind::NoteOff { key: 1 });
        buf.clear();
        assert!(buf.is_empty());
    }
}
