use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::event::Event;

/// Lock-free single-producer/single-consumer ring buffer for note events.
///
/// Producer: scheduler or control thread (owns [`EventProducer`])
/// Consumer: audio thread (owns [`EventConsumer`])
///
/// The producer only ever advances `write`, the consumer only ever advances
/// `read`. A slot is written before `write` is published (Release) and read
/// after `write` is observed (Acquire), so no slot is touched by both sides
/// at once.
struct Ring {
    slots: Box<[UnsafeCell<Event>]>,
    mask: usize,
    read: AtomicUsize,
    write: AtomicUsize,
}

// SAFETY: access to each slot is serialized by the read/write cursors, and
// each half of the queue is a unique, non-cloneable owner.
unsafe impl Sync for Ring {}

impl Ring {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Create a queue with room for `capacity` events.
///
/// Panics if `capacity` is not a power of two; queue sizes are fixed at
/// setup time.
pub fn event_queue(capacity: usize) -> (EventProducer, EventConsumer) {
    assert!(
        capacity > 0 && capacity.is_power_of_two(),
        "event queue capacity must be a power of 2, got {capacity}"
    );

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(Event::default()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let ring = Arc::new(Ring {
        slots,
        mask: capacity - 1,
        read: AtomicUsize::new(0),
        write: AtomicUsize::new(0),
    });

    (
        EventProducer { ring: ring.clone() },
        EventConsumer { ring },
    )
}

/// Writing half of an event queue.
pub struct EventProducer {
    ring: Arc<Ring>,
}

impl EventProducer {
    /// Push an event, spinning (with a cooperative yield) while the queue is
    /// full.
    ///
    /// Never call this from the audio thread: if the consumer is the caller
    /// it will spin forever. Use [`try_push`](Self::try_push) there.
    pub fn push(&mut self, event: Event) {
        let mut event = event;
        loop {
            match self.try_push(event) {
                Ok(()) => return,
                Err(rejected) => {
                    event = rejected;
                    thread::yield_now();
                }
            }
        }
    }

    /// Push an event if there is room, handing it back otherwise.
    #[inline]
    pub fn try_push(&mut self, event: Event) -> Result<(), Event> {
        let ring = &*self.ring;
        let write = ring.write.load(Ordering::Relaxed);
        let read = ring.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) == ring.capacity() {
            return Err(event);
        }

        // SAFETY: the slot at `write` is outside [read, write) so the consumer
        // cannot be reading it.
        unsafe {
            *ring.slots[write & ring.mask].get() = event;
        }
        ring.write.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Reading half of an event queue.
pub struct EventConsumer {
    ring: Arc<Ring>,
}

impl EventConsumer {
    /// Visit queued events in push order, stopping before the first event
    /// whose offset is `>= cutoff`. `None` drains everything.
    ///
    /// Audio-thread-safe: never blocks, never allocates.
    pub fn drain_until(&mut self, cutoff: Option<usize>, mut visit: impl FnMut(Event)) {
        let ring = &*self.ring;
        let mut read = ring.read.load(Ordering::Relaxed);
        let write = ring.write.load(Ordering::Acquire);

        while read != write {
            // SAFETY: slots in [read, write) were published by the producer
            // and will not be rewritten until `read` moves past them.
            let event = unsafe { *ring.slots[read & ring.mask].get() };
            if cutoff.is_some_and(|cutoff| event.offset >= cutoff) {
                break;
            }
            visit(event);
            read = read.wrapping_add(1);
        }

        ring.read.store(read, Ordering::Release);
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        let write = self.ring.write.load(Ordering::Acquire);
        let read = self.ring.read.load(Ordering::Relaxed);
        write.wrapping_sub(read)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
