//! Frame buffer with ready/valid semantics
//!
//! On the input side samples are pushed one at a time until the window is
//! full, then the whole frame is moved out with [`FrameBuffer::take_frame`].
//! On the output side a decoded frame is loaded and drained sample by
//! sample. While full or draining the buffer refuses new samples; that
//! refusal is the backpressure signal seen by the producer.
//!
//! ```text
//! Idle --push--> Collecting --push(last)--> Full --take_frame--> Idle
//! Idle --load--> Draining --pop(last)--> Idle
//! ```

use crate::error::{CodecError, Result};
use tracing::trace;

/// Buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameBufferState {
    /// Empty, ready for samples or a frame to drain
    Idle,
    /// Partially filled
    Collecting,
    /// Holding a complete frame that has not been taken yet
    Full,
    /// Handing out a loaded frame
    Draining,
}

/// Why a push was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// A complete frame is waiting to be taken
    BufferFull,
    /// A loaded frame is still being drained
    Draining,
    /// The owner is applying a new configuration before the next frame
    Reconfiguring,
}

/// Result of offering one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushOutcome {
    /// Sample stored
    Accepted,
    /// Sample not stored; offer it again later
    Rejected(RejectReason),
}

impl PushOutcome {
    /// Check if the sample was stored
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// A complete frame of samples, moved between stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    /// Wrap a sample vector
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Borrow the samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Take ownership of the samples
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the frame is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Fixed-capacity sample window
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    capacity: usize,
    samples: Vec<i16>,
    read_pos: usize,
    state: FrameBufferState,
}

impl FrameBuffer {
    /// Create a buffer holding frames of `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            read_pos: 0,
            state: FrameBufferState::Idle,
        }
    }

    /// Frame size in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current state
    pub fn state(&self) -> FrameBufferState {
        self.state
    }

    /// Samples collected so far, or samples left to drain
    pub fn len(&self) -> usize {
        match self.state {
            FrameBufferState::Draining => self.samples.len() - self.read_pos,
            _ => self.samples.len(),
        }
    }

    /// Check if the buffer holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a complete frame is waiting
    pub fn is_full(&self) -> bool {
        self.state == FrameBufferState::Full
    }

    /// Whether a push would be accepted right now
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            FrameBufferState::Idle | FrameBufferState::Collecting
        )
    }

    /// Offer one sample
    pub fn push(&mut self, sample: i16) -> PushOutcome {
        match self.state {
            FrameBufferState::Full => PushOutcome::Rejected(RejectReason::BufferFull),
            FrameBufferState::Draining => PushOutcome::Rejected(RejectReason::Draining),
            FrameBufferState::Idle | FrameBufferState::Collecting => {
                self.samples.push(sample);
                self.state = if self.samples.len() == self.capacity {
                    trace!("frame buffer full ({} samples)", self.capacity);
                    FrameBufferState::Full
                } else {
                    FrameBufferState::Collecting
                };
                PushOutcome::Accepted
            }
        }
    }

    /// Move the complete frame out and return to `Idle`
    pub fn take_frame(&mut self) -> Result<Frame> {
        if self.state != FrameBufferState::Full {
            return Err(CodecError::IncompleteFrame {
                expected: self.capacity,
                actual: self.len(),
            });
        }
        let samples = std::mem::replace(&mut self.samples, Vec::with_capacity(self.capacity));
        self.state = FrameBufferState::Idle;
        Ok(Frame::new(samples))
    }

    /// Load a complete frame for draining
    pub fn load(&mut self, frame: Frame) -> Result<()> {
        if self.state != FrameBufferState::Idle {
            return Err(CodecError::invalid_state("load", self.state));
        }
        if frame.len() != self.capacity {
            return Err(CodecError::InvalidFrameSize {
                expected: self.capacity,
                actual: frame.len(),
            });
        }
        self.samples = frame.into_samples();
        self.read_pos = 0;
        self.state = FrameBufferState::Draining;
        Ok(())
    }

    /// Next sample of the loaded frame
    pub fn pop_sample(&mut self) -> Option<i16> {
        if self.state != FrameBufferState::Draining {
            return None;
        }
        let sample = self.samples.get(self.read_pos).copied();
        self.read_pos += 1;
        if self.read_pos >= self.samples.len() {
            self.samples.clear();
            self.read_pos = 0;
            self.state = FrameBufferState::Idle;
        }
        sample
    }

    /// Everything left in the loaded frame, at once
    ///
    /// Returns `None` unless the buffer is draining.
    pub fn drain_remaining(&mut self) -> Option<Vec<i16>> {
        if self.state != FrameBufferState::Draining {
            return None;
        }
        let rest = self.samples.split_off(self.read_pos);
        self.samples.clear();
        self.read_pos = 0;
        self.state = FrameBufferState::Idle;
        Some(rest)
    }

    /// Discard any partial or pending frame; returns the samples dropped
    pub fn flush(&mut self) -> usize {
        let dropped = self.len();
        self.samples.clear();
        self.read_pos = 0;
        self.state = FrameBufferState::Idle;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_and_take() {
        let mut buf = FrameBuffer::new(4);
        assert_eq!(buf.state(), FrameBufferState::Idle);
        assert!(buf.push(1).is_accepted());
        assert_eq!(buf.state(), FrameBufferState::Collecting);
        for s in 2..=4 {
            assert!(buf.push(s).is_accepted());
        }
        assert!(buf.is_full());

        let frame = buf.take_frame().unwrap();
        assert_eq!(frame.samples(), &[1, 2, 3, 4]);
        assert_eq!(buf.state(), FrameBufferState::Idle);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_full_buffer_rejects() {
        let mut buf = FrameBuffer::new(2);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.push(3), PushOutcome::Rejected(RejectReason::BufferFull));
        // Nothing was dropped or overwritten
        assert_eq!(buf.take_frame().unwrap().samples(), &[1, 2]);
    }

    #[test]
    fn test_take_before_full_is_incomplete() {
        let mut buf = FrameBuffer::new(8);
        buf.push(5);
        assert!(matches!(
            buf.take_frame(),
            Err(CodecError::IncompleteFrame { expected: 8, actual: 1 })
        ));
        // The partial frame survives the failed call
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.state(), FrameBufferState::Collecting);
    }

    #[test]
    fn test_load_and_drain() {
        let mut buf = FrameBuffer::new(3);
        buf.load(Frame::new(vec![7, 8, 9])).unwrap();
        assert_eq!(buf.state(), FrameBufferState::Draining);
        assert_eq!(buf.push(1), PushOutcome::Rejected(RejectReason::Draining));
        assert_eq!(buf.pop_sample(), Some(7));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.pop_sample(), Some(8));
        assert_eq!(buf.pop_sample(), Some(9));
        assert_eq!(buf.state(), FrameBufferState::Idle);
        assert_eq!(buf.pop_sample(), None);
    }

    #[test]
    fn test_drain_remaining() {
        let mut buf = FrameBuffer::new(3);
        buf.load(Frame::new(vec![1, 2, 3])).unwrap();
        buf.pop_sample();
        assert_eq!(buf.drain_remaining(), Some(vec![2, 3]));
        assert_eq!(buf.state(), FrameBufferState::Idle);
        assert_eq!(buf.drain_remaining(), None);
    }

    #[test]
    fn test_load_checks_size_and_state() {
        let mut buf = FrameBuffer::new(3);
        assert!(matches!(
            buf.load(Frame::new(vec![1, 2])),
            Err(CodecError::InvalidFrameSize { expected: 3, actual: 2 })
        ));
        buf.push(1);
        assert!(matches!(
            buf.load(Frame::new(vec![1, 2, 3])),
            Err(CodecError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_flush_discards_partial_frame() {
        let mut buf = FrameBuffer::new(4);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.flush(), 2);
        assert_eq!(buf.state(), FrameBufferState::Idle);
        assert!(buf.push(3).is_accepted());
        assert_eq!(buf.len(), 1);
    }
}
