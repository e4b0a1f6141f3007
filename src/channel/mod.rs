//! Bus channel addresses and the allocator that hands them out to sessions.

pub mod allocator;

pub use allocator::{ChannelAllocator, SharedChannelAllocator};

use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub type Channel = u64;

/// Sentinel returned by the allocator when nothing is available.
pub const INVALID_CHANNEL: Channel = 0;

/// Well-known bus addresses live in `1..=RESERVED_CHANNEL_MAX`.
pub const RESERVED_CHANNEL_MAX: Channel = 999;

pub fn is_reserved(channel: Channel) -> bool {
    channel != INVALID_CHANNEL && channel <= RESERVED_CHANNEL_MAX
}

// -----------------------------------------------------------------------------
// ----- ChannelRange ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    min: Channel,
    max: Channel,
}

impl ChannelRange {
    pub fn new(min: Channel, max: Channel) -> Result<Self, ChannelError> {
        check_bound("min", min)?;
        check_bound("max", max)?;

        if min > max {
            return Err(ChannelError::InvertedRange { min, max });
        }

        Ok(Self { min, max })
    }

    pub fn min(&self) -> Channel {
        self.min
    }

    pub fn max(&self) -> Channel {
        self.max
    }

    pub fn contains(&self, channel: Channel) -> bool {
        (self.min..=self.max).contains(&channel)
    }

    /// Number of channels in the range. Saturates for a range spanning all of `u64`.
    pub fn capacity(&self) -> u64 {
        (self.max - self.min).saturating_add(1)
    }
}

fn check_bound(field: &'static str, value: Channel) -> Result<(), ChannelError> {
    if value == INVALID_CHANNEL {
        return Err(ChannelError::InvalidBound { field });
    }
    if is_reserved(value) {
        return Err(ChannelError::ReservedBound { field, value });
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channels.{field} must be set to a valid channel (0 is the invalid channel)")]
    InvalidBound { field: &'static str },

    #[error(
        "channels.{field} = {value} falls in the reserved range 1..={reserved}",
        reserved = RESERVED_CHANNEL_MAX
    )]
    ReservedBound { field: &'static str, value: Channel },

    #[error("channel range is inverted: min {min} > max {max}")]
    InvertedRange { min: Channel, max: Channel },

    #[error("channel pool exhausted")]
    Exhausted,

    #[error("channel {0} is outside the allocator range")]
    OutOfRange(Channel),

    #[error("channel {0} is not currently allocated")]
    NotAllocated(Channel),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
