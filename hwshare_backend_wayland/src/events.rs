// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer events from the display process, and their queue.

use std::collections::VecDeque;

use hwshare_core::registry::TransportBuffer;

/// Something the display process reported about shared buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferEvent {
    /// The compositor no longer reads from the buffer (`wl_buffer.release`).
    Released(TransportBuffer),
    /// The `android_wlegl` global went away. Existing transport buffers stay
    /// valid; no new ones can be created.
    ProtocolRemoved,
}

/// Bounded FIFO of [`BufferEvent`]s.
///
/// When full, pushing drops the oldest queued event, so the newest release
/// notifications survive a host that polls late.
#[derive(Debug, Clone)]
pub struct BufferEventQueue {
    events: VecDeque<BufferEvent>,
    capacity: usize,
    dropped: u64,
}

impl BufferEventQueue {
    /// Capacity used by [`Default`].
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a queue holding at most `capacity` events (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Enqueues an event, evicting the oldest one when full.
    pub fn push(&mut self, event: BufferEvent) {
        if self.events.len() == self.capacity {
            let _ = self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Pops the oldest event.
    pub fn pop(&mut self) -> Option<BufferEvent> {
        self.events.pop_front()
    }

    /// Removes and yields every queued event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = BufferEvent> + '_ {
        self.events.drain(..)
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted by overflow since creation.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

impl Default for BufferEventQueue {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
