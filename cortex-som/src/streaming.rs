//! Bounded hand-off between audio capture and the training loop
//!
//! The producer never blocks: when the queue is full the oldest chunk is
//! discarded so capture keeps pace with the device. The consumer waits up to
//! a timeout for the next chunk and receives chunks in capture order.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A fixed block of mono samples, immutable once captured
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    sequence: u64,
    samples: Vec<f32>,
}

impl AudioChunk {
    /// Wrap captured samples. The sequence number is assigned on push.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { sequence: 0, samples }
    }

    /// Capture order, starting at 0 for the first pushed chunk
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<f32>> for AudioChunk {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without loss
    Queued,
    /// Queued after discarding the oldest pending chunk
    DroppedOldest,
    /// Buffer already closed; the chunk was discarded
    Closed,
}

/// Result of a pop
#[derive(Debug, Clone, PartialEq)]
pub enum PopResult {
    Chunk(AudioChunk),
    /// Nothing arrived before the timeout
    Empty,
    /// Closed and fully drained
    Closed,
}

/// Buffer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub pushed: u64,
    pub dropped: u64,
    pub popped: u64,
}

struct BufferState {
    queue: VecDeque<AudioChunk>,
    closed: bool,
    next_sequence: u64,
    stats: BufferStats,
}

/// Bounded, drop-oldest queue of audio chunks
pub struct StreamBuffer {
    capacity: usize,
    state: Mutex<BufferState>,
    available: Condvar,
}

impl StreamBuffer {
    /// Create a buffer holding at most `capacity` chunks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
                next_sequence: 0,
                stats: BufferStats::default(),
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a chunk, never blocking the caller
    pub fn push(&self, chunk: impl Into<AudioChunk>) -> PushOutcome {
        let mut chunk = chunk.into();
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            chunk.sequence = state.next_sequence;
            state.next_sequence += 1;
            state.stats.pushed = state.stats.pushed.saturating_add(1);

            let outcome = if state.queue.len() >= self.capacity {
                if let Some(dropped) = state.queue.pop_front() {
                    debug!("Stream buffer full, dropping chunk {}", dropped.sequence);
                }
                state.stats.dropped = state.stats.dropped.saturating_add(1);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };

            state.queue.push_back(chunk);
            outcome
        };

        self.available.notify_one();
        outcome
    }

    /// Wait up to `timeout` for the oldest queued chunk
    pub fn pop(&self, timeout: Duration) -> PopResult {
        let mut state = self.state.lock();
        // None: the timeout is too large to represent, wait without one
        let mut deadline = None;

        loop {
            if let Some(chunk) = state.queue.pop_front() {
                state.stats.popped = state.stats.popped.saturating_add(1);
                return PopResult::Chunk(chunk);
            }

            if state.closed {
                return PopResult::Closed;
            }

            let until = *deadline.get_or_insert_with(|| Instant::now().checked_add(timeout));
            let timed_out = match until {
                Some(until) => self.available.wait_until(&mut state, until).timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };

            if timed_out {
                // A push may have raced the timeout
                return match state.queue.pop_front() {
                    Some(chunk) => {
                        state.stats.popped = state.stats.popped.saturating_add(1);
                        PopResult::Chunk(chunk)
                    }
                    None if state.closed => PopResult::Closed,
                    None => PopResult::Empty,
                };
            }
        }
    }

    /// Stop accepting chunks. Pending chunks stay poppable.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            info!("Stream buffer closed with {} pending chunks", state.queue.len());
        }
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> BufferStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f32) -> AudioChunk {
        AudioChunk::new(vec![value; 4])
    }

    #[test]
    fn test_fifo_order() {
        let buffer = StreamBuffer::new(4);
        for i in 0..3 {
            assert_eq!(buffer.push(chunk(i as f32)), PushOutcome::Queued);
        }
        for i in 0..3 {
            match buffer.pop(Duration::from_millis(10)) {
                PopResult::Chunk(c) => {
                    assert_eq!(c.sequence(), i);
                    assert_eq!(c.samples()[0], i as f32);
                }
                other => panic!("Expected chunk, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_pop_times_out_when_empty() {
        let buffer = StreamBuffer::new(2);
        assert_eq!(buffer.pop(Duration::from_millis(5)), PopResult::Empty);
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let buffer = StreamBuffer::new(2);
        buffer.close();
        assert_eq!(buffer.push(chunk(1.0)), PushOutcome::Closed);
        assert_eq!(buffer.pop(Duration::from_millis(5)), PopResult::Closed);
        assert_eq!(buffer.stats().pushed, 0);
    }

    #[test]
    fn test_unbounded_timeout_returns_queued_chunk() {
        let buffer = StreamBuffer::new(2);
        buffer.push(chunk(0.5));
        match buffer.pop(Duration::MAX) {
            PopResult::Chunk(c) => assert_eq!(c.samples()[0], 0.5),
            other => panic!("Expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_timeout_wakes_on_push_and_close() {
        let buffer = std::sync::Arc::new(StreamBuffer::new(2));
        let consumer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || (buffer.pop(Duration::MAX), buffer.pop(Duration::MAX)))
        };

        std::thread::sleep(Duration::from_millis(20));
        buffer.push(chunk(1.0));
        std::thread::sleep(Duration::from_millis(20));
        buffer.close();

        let (first, second) = consumer.join().unwrap();
        assert!(matches!(first, PopResult::Chunk(_)));
        assert_eq!(second, PopResult::Closed);
    }
}
