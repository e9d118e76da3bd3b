//! Capture-channel resource pool.
//!
//! A capture peripheral exposes a fixed number of blocks, each with a fixed
//! number of channels (state machines). Every encoder needs exactly one
//! channel for its lifetime. `CapturePool` hands channels out as
//! `ChannelLease` tokens; dropping a lease returns the channel.
//!
//! The pool is a lock-free bitmask, so clones can be shared across threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Failure to bind a capture channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    #[error("no capture block available")]
    NoCaptureBlock,
    #[error("too many encoder instances (all capture channels in use)")]
    TooManyInstances,
}

impl SetupError {
    /// Legacy integer code: -1 no block, -2 too many instances.
    pub fn code(&self) -> i32 {
        match self {
            SetupError::NoCaptureBlock => -1,
            SetupError::TooManyInstances => -2,
        }
    }
}

/// Address of one capture channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub block: u8,
    pub channel: u8,
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.block, self.channel)
    }
}

#[derive(Debug)]
struct PoolInner {
    blocks: u8,
    channels_per_block: u8,
    in_use: AtomicU32,
}

impl PoolInner {
    fn capacity(&self) -> u32 {
        u32::from(self.blocks) * u32::from(self.channels_per_block)
    }

    fn id_of(&self, bit: u32) -> ChannelId {
        let per = u32::from(self.channels_per_block.max(1));
        ChannelId {
            block: (bit / per) as u8,
            channel: (bit % per) as u8,
        }
    }
}

/// Fixed set of capture channels shared by all encoders on one peripheral.
#[derive(Debug, Clone)]
pub struct CapturePool {
    inner: Arc<PoolInner>,
}

impl CapturePool {
    /// Largest number of channels one pool can track.
    pub const MAX_CHANNELS: u32 = 32;

    /// Create a pool with `blocks * channels_per_block` channels, capped at
    /// [`Self::MAX_CHANNELS`].
    pub fn new(blocks: u8, channels_per_block: u8) -> Self {
        let mut per = channels_per_block;
        if u32::from(blocks) * u32::from(per) > Self::MAX_CHANNELS {
            per = (Self::MAX_CHANNELS / u32::from(blocks.max(1))) as u8;
        }
        Self {
            inner: Arc::new(PoolInner {
                blocks,
                channels_per_block: per,
                in_use: AtomicU32::new(0),
            }),
        }
    }

    /// Two PIO blocks with four state machines each.
    pub fn rp2040() -> Self {
        Self::new(2, 4)
    }

    pub fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    pub fn available(&self) -> u32 {
        let used = self.inner.in_use.load(Ordering::Acquire).count_ones();
        self.capacity().saturating_sub(used)
    }

    /// Lease the lowest free channel.
    pub fn acquire(&self) -> Result<ChannelLease, SetupError> {
        let cap = self.capacity();
        if cap == 0 {
            return Err(SetupError::NoCaptureBlock);
        }
        let mut cur = self.inner.in_use.load(Ordering::Acquire);
        loop {
            let free = !cur;
            let bit = free.trailing_zeros();
            if bit >= cap {
                return Err(SetupError::TooManyInstances);
            }
            let next = cur | (1 << bit);
            match self.inner.in_use.compare_exchange_weak(
                cur,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(ChannelLease {
                        pool: self.inner.clone(),
                        bit,
                        id: self.inner.id_of(bit),
                    });
                }
                Err(actual) => cur = actual,
            }
        }
    }
}

/// Exclusive ownership of one capture channel; released on drop.
#[derive(Debug)]
pub struct ChannelLease {
    pool: Arc<PoolInner>,
    bit: u32,
    id: ChannelId,
}

impl ChannelLease {
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.pool.in_use.fetch_and(!(1 << self.bit), Ordering::AcqRel);
    }
}
