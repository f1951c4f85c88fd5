//! Bounded block queue between the planner and the step interrupt.
//!
//! The planner pushes at the tail from the foreground. The step ticker claims
//! the head with [`Conveyor::peek_front`] and removes it when done. Every
//! operation runs inside one short `critical_section`, so the interrupt side
//! never blocks and never observes a half-written block.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::{CriticalSection, Mutex};
use heapless::Deque;

use crate::error::{QueueError, Result};
use crate::motion::Block;

/// A copy of the head block as claimed by the step ticker.
#[derive(Debug, Clone)]
pub struct Claim {
    /// The claimed block.
    pub block: Block,
    /// Flush epoch at claim time.
    pub epoch: u32,
}

struct Queue<const N: usize> {
    blocks: Deque<Block, N>,
    /// Head block is owned by the step ticker.
    front_claimed: bool,
}

/// Fixed-capacity FIFO of planned blocks.
pub struct Conveyor<const N: usize> {
    queue: Mutex<RefCell<Queue<N>>>,
    epoch: AtomicU32,
    running: AtomicBool,
}

impl<const N: usize> Default for Conveyor<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Conveyor<N> {
    /// Create an empty, stopped conveyor.
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(Queue {
                blocks: Deque::new(),
                front_claimed: false,
            })),
            epoch: AtomicU32::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Allow the step ticker to start claiming blocks.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        debug!("conveyor started, capacity {}", N);
    }

    /// Check whether [`start`](Self::start) has been called.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append a block at the tail.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` when at capacity; the queue is left unchanged.
    pub fn push(&self, block: Block) -> Result<()> {
        critical_section::with(|cs| self.push_in(cs, block))
    }

    pub(crate) fn push_in(&self, cs: CriticalSection<'_>, block: Block) -> Result<()> {
        let mut queue = self.queue.borrow_ref_mut(cs);
        queue.blocks.push_back(block).map_err(|_| {
            debug!("conveyor full at {} blocks", N);
            QueueError::Full.into()
        })
    }

    /// Claim the head block for execution.
    ///
    /// Returns a copy along with the current flush epoch, or `None` when the
    /// queue is empty. Once claimed, the planner no longer revises the head.
    pub fn peek_front(&self) -> Option<Claim> {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            let block = queue.blocks.front()?.clone();
            queue.front_claimed = true;
            Some(Claim {
                block,
                epoch: self.epoch.load(Ordering::Relaxed),
            })
        })
    }

    /// Remove the head block.
    pub fn advance_front(&self) {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            queue.blocks.pop_front();
            queue.front_claimed = false;
        });
    }

    /// Remove the head block if no flush happened since it was claimed.
    ///
    /// Returns `false` when the claim is stale and nothing was removed.
    pub fn retire_front(&self, epoch: u32) -> bool {
        critical_section::with(|cs| {
            if self.epoch.load(Ordering::Relaxed) != epoch {
                return false;
            }
            let mut queue = self.queue.borrow_ref_mut(cs);
            queue.blocks.pop_front();
            queue.front_claimed = false;
            true
        })
    }

    /// Drop every queued block, including a claimed head.
    pub fn flush_queue(&self) {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            let dropped = queue.blocks.len();
            queue.blocks.clear();
            queue.front_claimed = false;
            // thumbv6m has no atomic read-modify-write
            let epoch = self.epoch.load(Ordering::Relaxed);
            self.epoch.store(epoch.wrapping_add(1), Ordering::Relaxed);
            debug!("conveyor flushed, {} blocks dropped", dropped);
        });
    }

    /// Foreground idle hook: true when nothing is queued or executing.
    pub fn on_idle(&self) -> bool {
        critical_section::with(|cs| {
            let queue = self.queue.borrow_ref(cs);
            queue.blocks.is_empty() && !queue.front_claimed
        })
    }

    /// Number of queued blocks, including a claimed head.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).blocks.len())
    }

    /// Check if no blocks are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a push would fail.
    pub fn is_full(&self) -> bool {
        critical_section::with(|cs| self.queue.borrow_ref(cs).blocks.is_full())
    }

    /// Maximum number of queued blocks.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Flush counter, bumped by every [`flush_queue`](Self::flush_queue).
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Run `f` over the blocks the planner may still revise, oldest first.
    ///
    /// `head` is the claimed head block, if any; it must only be read.
    pub(crate) fn with_pending<R>(
        &self,
        cs: CriticalSection<'_>,
        f: impl FnOnce(Option<&Block>, &mut [&mut Block]) -> R,
    ) -> R {
        let mut queue = self.queue.borrow_ref_mut(cs);
        let skip = usize::from(queue.front_claimed);
        let (front, back) = queue.blocks.as_mut_slices();

        let mut head = None;
        let mut pending: heapless::Vec<&mut Block, N> = heapless::Vec::new();
        for (index, block) in front.iter_mut().chain(back.iter_mut()).enumerate() {
            if index < skip {
                head = Some(&*block);
            } else {
                // Cannot overflow: at most N blocks are queued
                let _ = pending.push(block);
            }
        }

        f(head, &mut pending)
    }
}
