use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Channel, ChannelError, ChannelRange, INVALID_CHANNEL};

// -----------------------------------------------------------------------------
// ----- ChannelAllocator ------------------------------------------------------

/// Hands out unique channels from `[min, max]`.
///
/// The monotonic range is drained first; released channels are only reused
/// (oldest first) once it is exhausted. Not synchronized, see
/// [`SharedChannelAllocator`] for the cross-task wrapper.
#[derive(Debug)]
pub struct ChannelAllocator {
    min: Channel,
    max: Channel,
    next: Option<Channel>,
    released: VecDeque<Channel>,
    outstanding: HashSet<Channel>,
}

// -----------------------------------------------------------------------------
// ----- ChannelAllocator: Static ----------------------------------------------

impl ChannelAllocator {
    /// Raw bounds, no reserved-range checks. Config goes through [`ChannelRange`].
    pub fn new(min: Channel, max: Channel) -> Self {
        Self {
            min,
            max,
            next: Some(min),
            released: VecDeque::new(),
            outstanding: HashSet::new(),
        }
    }

    pub fn from_range(range: ChannelRange) -> Self {
        Self::new(range.min(), range.max())
    }
}

// -----------------------------------------------------------------------------
// ----- ChannelAllocator: Public Methods --------------------------------------

impl ChannelAllocator {
    /// Returns [`INVALID_CHANNEL`] when the pool is exhausted. The caller
    /// decides what that means for the session asking.
    #[must_use]
    pub fn alloc(&mut self) -> Channel {
        let channel = match self.next {
            Some(next) if next <= self.max => {
                // None once `max` was Channel::MAX; the range is spent either way.
                self.next = next.checked_add(1);
                next
            }
            _ => match self.released.pop_front() {
                Some(reused) => reused,
                None => return INVALID_CHANNEL,
            },
        };

        self.outstanding.insert(channel);
        channel
    }

    pub fn try_alloc(&mut self) -> Result<Channel, ChannelError> {
        match self.alloc() {
            INVALID_CHANNEL => Err(ChannelError::Exhausted),
            channel => Ok(channel),
        }
    }

    /// Queues `channel` for reuse without any validation.
    ///
    /// Freeing a value twice, or one that was never handed out, makes later
    /// `alloc` calls return duplicates. Prefer [`ChannelAllocator::release`].
    pub fn free(&mut self, channel: Channel) {
        self.outstanding.remove(&channel);
        self.released.push_back(channel);
    }

    /// Checked release: only channels currently handed out may come back.
    pub fn release(&mut self, channel: Channel) -> Result<(), ChannelError> {
        if channel == INVALID_CHANNEL || !(self.min..=self.max).contains(&channel) {
            return Err(ChannelError::OutOfRange(channel));
        }
        if !self.outstanding.remove(&channel) {
            return Err(ChannelError::NotAllocated(channel));
        }

        self.released.push_back(channel);
        Ok(())
    }

    pub fn range(&self) -> (Channel, Channel) {
        (self.min, self.max)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn released(&self) -> usize {
        self.released.len()
    }
}

// -----------------------------------------------------------------------------
// ----- SharedChannelAllocator ------------------------------------------------

/// Mutex-guarded allocator shared by every session task. Locks are held for
/// a single O(1) operation only.
#[derive(Debug, Clone)]
pub struct SharedChannelAllocator {
    inner: Arc<Mutex<ChannelAllocator>>,
}

impl SharedChannelAllocator {
    pub fn new(allocator: ChannelAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    #[must_use]
    pub fn alloc(&self) -> Channel {
        self.inner.lock().alloc()
    }

    pub fn try_alloc(&self) -> Result<Channel, ChannelError> {
        self.inner.lock().try_alloc()
    }

    pub fn free(&self, channel: Channel) {
        self.inner.lock().free(channel);
    }

    pub fn release(&self, channel: Channel) -> Result<(), ChannelError> {
        self.inner.lock().release(channel)
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_range_then_reuses_freed() {
        let mut ct = ChannelAllocator::new(10, 12);
        assert_eq!(ct.alloc(), 10);
        assert_eq!(ct.alloc(), 11);
        assert_eq!(ct.alloc(), 12);
        assert_eq!(ct.alloc(), INVALID_CHANNEL);

        ct.free(11);
        assert_eq!(ct.alloc(), 11);
        assert_eq!(ct.alloc(), INVALID_CHANNEL);
    }

    #[test]
    fn range_is_drained_before_any_reuse() {
        let mut ct = ChannelAllocator::new(2000, 2004);
        let first = ct.alloc();
        ct.free(first);

        // The freed value must not come back while the cursor still has room.
        let rest: Vec<_> = (0..4).map(|_| ct.alloc()).collect();
        assert_eq!(rest, vec![2001, 2002, 2003, 2004]);

        assert_eq!(ct.alloc(), first);
        assert_eq!(ct.alloc(), INVALID_CHANNEL);
    }

    #[test]
    fn released_channels_come_back_fifo() {
        let mut ct = ChannelAllocator::new(3000, 3003);
        for _ in 0..4 {
            let _ = ct.alloc();
        }

        ct.release(3002).unwrap();
        ct.release(3000).unwrap();
        ct.release(3003).unwrap();

        assert_eq!(ct.alloc(), 3002);
        assert_eq!(ct.alloc(), 3000);
        assert_eq!(ct.alloc(), 3003);
        assert_eq!(ct.alloc(), INVALID_CHANNEL);
    }

    #[test]
    fn sentinel_only_when_pool_empty() {
        let mut ct = ChannelAllocator::new(4000, 4000);
        assert_eq!(ct.try_alloc(), Ok(4000));
        assert_eq!(ct.try_alloc(), Err(ChannelError::Exhausted));

        ct.release(4000).unwrap();
        assert_eq!(ct.try_alloc(), Ok(4000));
        assert_eq!(ct.try_alloc(), Err(ChannelError::Exhausted));
    }

    #[test]
    fn release_rejects_double_and_foreign_channels() {
        let mut ct = ChannelAllocator::new(5000, 5009);
        let c = ct.alloc();

        assert_eq!(ct.release(5005), Err(ChannelError::NotAllocated(5005)));
        assert_eq!(ct.release(42), Err(ChannelError::OutOfRange(42)));
        assert_eq!(
            ct.release(INVALID_CHANNEL),
            Err(ChannelError::OutOfRange(INVALID_CHANNEL))
        );

        ct.release(c).unwrap();
        assert_eq!(ct.release(c), Err(ChannelError::NotAllocated(c)));
        assert_eq!(ct.released(), 1);
    }

    #[test]
    fn free_is_unchecked() {
        let mut ct = ChannelAllocator::new(6000, 6000);
        assert_eq!(ct.alloc(), 6000);

        // Out of range and duplicated values are queued as-is.
        ct.free(7);
        ct.free(6000);
        ct.free(6000);
        assert_eq!(ct.released(), 3);
        assert_eq!(ct.alloc(), 7);
        assert_eq!(ct.alloc(), 6000);
        assert_eq!(ct.alloc(), 6000);
    }

    #[test]
    fn tracks_outstanding() {
        let mut ct = ChannelAllocator::new(7000, 7010);
        let a = ct.alloc();
        let _b = ct.alloc();
        assert_eq!(ct.outstanding(), 2);

        ct.release(a).unwrap();
        assert_eq!(ct.outstanding(), 1);
    }

    #[test]
    fn cursor_does_not_overflow_at_channel_max() {
        let mut ct = ChannelAllocator::new(Channel::MAX - 1, Channel::MAX);
        assert_eq!(ct.alloc(), Channel::MAX - 1);
        assert_eq!(ct.alloc(), Channel::MAX);
        assert_eq!(ct.alloc(), INVALID_CHANNEL);

        ct.release(Channel::MAX).unwrap();
        assert_eq!(ct.alloc(), Channel::MAX);
    }

    #[test]
    fn from_range_uses_bounds() {
        let range = ChannelRange::new(1_000_000, 1_000_001).unwrap();
        let ct = ChannelAllocator::from_range(range);
        assert_eq!(ct.range(), (1_000_000, 1_000_001));
    }

    #[test]
    fn shared_allocator_hands_out_unique_channels_across_threads() {
        let shared = SharedChannelAllocator::new(ChannelAllocator::new(10_000, 10_999));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || (0..250).map(|_| shared.alloc()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<Channel> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 1000);
        assert_eq!(all.first(), Some(&10_000));
        assert_eq!(all.last(), Some(&10_999));
        assert_eq!(shared.try_alloc(), Err(ChannelError::Exhausted));
        assert_eq!(shared.outstanding(), 1000);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
