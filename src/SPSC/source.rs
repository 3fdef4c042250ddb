//! Acquisition source contract and the stock sources.
//!
//! The real source is a blocking DMA read that parks the thread until a full
//! block is ready. It is modelled here by [`BlockSource`]; the pipeline never
//! needs more than "get next block".

use super::block::Buffer;
use super::cancel::CancelToken;
use crate::error::AcquireError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A blocking producer of fixed-size blocks.
pub trait BlockSource: Send {
    /// Block until the next full block is available.
    ///
    /// Any error other than [`AcquireError::Interrupted`] is terminal: the
    /// source will not be called again. A source that can wake early should
    /// watch `cancel` and return `Interrupted` once it is set.
    fn next_block(&mut self, cancel: &CancelToken) -> Result<Buffer, AcquireError>;
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn next_block(&mut self, cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        (**self).next_block(cancel)
    }
}

/// Yields a fixed list of blocks, then end-of-stream.
pub struct ScriptedSource {
    blocks: VecDeque<Buffer>,
}

impl ScriptedSource {
    pub fn new(blocks: impl IntoIterator<Item = Buffer>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
        }
    }

    /// `count` blocks filled with the markers 1, 2, 3, ...
    pub fn ascending(count: usize, block_size: usize) -> Self {
        Self::new((0..count).map(|i| Buffer::filled(block_size, (i + 1) as u8)))
    }

    pub fn remaining(&self) -> usize {
        self.blocks.len()
    }
}

impl BlockSource for ScriptedSource {
    fn next_block(&mut self, _cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        self.blocks.pop_front().ok_or(AcquireError::EndOfStream)
    }
}

/// Longest single sleep while a [`PatternSource`] waits for its next tick.
const PATTERN_WAIT_SLICE: Duration = Duration::from_millis(1);

/// Synthetic DMA stand-in: one block per `period`, each filled with a
/// wrapping marker that increments per block.
pub struct PatternSource {
    block_size: usize,
    period: Duration,
    limit: Option<u64>,
    produced: u64,
    next_due: Option<Instant>,
}

impl PatternSource {
    pub fn new(block_size: usize, period: Duration) -> Self {
        Self {
            block_size,
            period,
            limit: None,
            produced: 0,
            next_due: None,
        }
    }

    /// Report end-of-stream after `limit` blocks.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl BlockSource for PatternSource {
    fn next_block(&mut self, cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Err(AcquireError::EndOfStream);
        }

        let due = *self.next_due.get_or_insert_with(Instant::now);
        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::Interrupted);
            }
            let now = Instant::now();
            if now >= due {
                break;
            }
            std::thread::sleep(std::cmp::min(due - now, PATTERN_WAIT_SLICE));
        }

        self.next_due = Some(due + self.period);
        let marker = self.produced as u8;
        self.produced += 1;
        Ok(Buffer::filled(self.block_size, marker))
    }
}
