//! Ticket-based TX submission
//!
//! Several producers may feed one TX job queue at once. Each producer:
//!
//! 1. **acquires** a ticket for `n` consecutive slots from the phy's
//!    software write counter, waiting (bounded) for the hardware read
//!    pointer to leave room;
//! 2. **writes** its descriptors into the slots it owns, with no further
//!    synchronization;
//! 3. **submits** by waiting (bounded) for the hardware valid write pointer
//!    to reach its ticket, then advancing it past its slots.
//!
//! Descriptors therefore become visible to the controller in exactly the
//! order tickets were handed out.
//!
//! A timed-out acquire leaves the counter untouched, so `Busy` never
//! strands slots. A timed-out submit keeps the ticket: the caller either
//! retries the submit or **cancels** the ticket. A cancelled ticket has its
//! slots overwritten with no-op jobs and handed off; whoever publishes the
//! batch just before it publishes it too. Neither path takes a lock.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering, fence};

use embedded_hal::delay::DelayNs;

use crate::constants::{POLL_INTERVAL_US, SUBMIT_TIMEOUT_US, TICKET_TIMEOUT_US};
use crate::error::{ArgumentError, Error, Result};
use crate::internal::dma::ring::HardwareRing;
use crate::internal::register::tx::{TX_JOB_Q_RP, TX_JOB_Q_VALID_WP};
use crate::internal::register::{RegisterBus, RegisterWindow};
use crate::internal::trace::{dma_debug, dma_warn};

/// Exclusive claim on `count` consecutive job queue slots
///
/// Not `Clone`: exactly one producer writes and submits the slots. A
/// ticket that will never be submitted must be cancelled, or every later
/// ticket on the queue waits for it.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub struct Ticket {
    first: u64,
    count: u64,
    submitted: bool,
    cancelled: bool,
}

impl Ticket {
    const fn new(first: u64, count: u64) -> Self {
        Self {
            first,
            count,
            submitted: false,
            cancelled: false,
        }
    }

    /// Counter value of the first slot
    pub const fn first(&self) -> u64 {
        self.first
    }

    /// Number of slots
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Counter value after the last slot; the hardware job id of the batch
    pub const fn end(&self) -> u64 {
        self.first + self.count
    }

    /// Whether the batch has been handed to the controller
    pub const fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Whether the batch was replaced by no-op jobs
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    const fn is_open(&self) -> bool {
        !self.submitted && !self.cancelled
    }
}

/// Software write counter of one TX job queue
///
/// The hand-off table holds cancelled batches still waiting for their
/// turn: entry `first % capacity` is the batch end, 0 when empty. Batches
/// between the valid write pointer and the counter never span more than
/// one lap, so live entries never collide.
#[derive(Debug)]
pub(crate) struct TicketCounter {
    batched_wp: AtomicU64,
    handoff: Vec<AtomicU64>,
}

impl TicketCounter {
    /// Counter for a queue of at most `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            batched_wp: AtomicU64::new(0),
            handoff: (0..capacity.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Restart at zero, matching a freshly initialized job queue
    pub fn reset(&self) {
        self.batched_wp.store(0, Ordering::Release);
        for entry in &self.handoff {
            entry.store(0, Ordering::Release);
        }
    }

    /// Next counter value to be handed out
    pub fn current(&self) -> u64 {
        self.batched_wp.load(Ordering::Acquire)
    }

    fn handoff_entry(&self, first: u64) -> Option<&AtomicU64> {
        self.handoff
            .get((first % self.handoff.len() as u64) as usize)
    }

    /// Claim `n` slots of the queue behind `jobq`
    pub fn acquire<B, D>(
        &self,
        bus: &B,
        jobq: RegisterWindow,
        ring: &HardwareRing,
        n: u64,
        delay: &mut D,
    ) -> Result<Ticket>
    where
        B: RegisterBus + ?Sized,
        D: DelayNs,
    {
        if n == 0 || n > ring.capacity() || ring.capacity() > self.handoff.len() as u64 {
            return Err(ArgumentError::InvalidBatchSize.into());
        }

        let mut waited_us = 0u32;
        loop {
            let first = self.batched_wp.load(Ordering::Acquire);
            let read = jobq.read(bus, TX_JOB_Q_RP);
            if ring.has_room(first, read, n) {
                match self.batched_wp.compare_exchange_weak(
                    first,
                    first + n,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Ok(Ticket::new(first, n)),
                    // another producer won the slots, try again at once
                    Err(_) => continue,
                }
            }
            if waited_us >= TICKET_TIMEOUT_US {
                dma_warn!(
                    "TX job queue {:#x} full: wp {} rp {}",
                    jobq.base(),
                    first,
                    read
                );
                return Err(Error::Busy);
            }
            delay.delay_us(POLL_INTERVAL_US);
            waited_us += POLL_INTERVAL_US;
        }
    }

    /// Write entry `index` of `ticket`
    pub fn write(ring: &HardwareRing, ticket: &Ticket, index: u64, words: &[u64]) -> Result<()> {
        if index >= ticket.count || !ticket.is_open() {
            return Err(ArgumentError::InvalidBatchSize.into());
        }
        ring.write_entry(ticket.first + index, words);
        Ok(())
    }

    /// Hand the slots of `ticket` to the controller
    ///
    /// Returns the hardware job id of the last entry. Submitting an already
    /// submitted ticket is a no-op; a cancelled one is refused. `Busy`
    /// leaves the ticket open.
    pub fn submit<B, D>(
        &self,
        bus: &B,
        jobq: RegisterWindow,
        ticket: &mut Ticket,
        delay: &mut D,
    ) -> Result<u64>
    where
        B: RegisterBus + ?Sized,
        D: DelayNs,
    {
        if ticket.cancelled {
            return Err(ArgumentError::InvalidTransfer.into());
        }
        if ticket.submitted {
            return Ok(ticket.end());
        }

        let mut waited_us = 0u32;
        loop {
            let valid = jobq.read(bus, TX_JOB_Q_VALID_WP);
            if valid == ticket.first {
                ticket.submitted = true;
                self.publish(bus, jobq, ticket.end());
                return Ok(ticket.end());
            }
            if waited_us >= SUBMIT_TIMEOUT_US {
                dma_warn!(
                    "TX job queue {:#x}: ticket {} still waiting on valid wp {}",
                    jobq.base(),
                    ticket.first,
                    valid
                );
                return Err(Error::Busy);
            }
            delay.delay_us(POLL_INTERVAL_US);
            waited_us += POLL_INTERVAL_US;
        }
    }

    /// Give up on `ticket` without stalling the queue
    ///
    /// Every slot is overwritten with `noop` and the batch is handed off:
    /// it is published right away when it is next in line, otherwise by
    /// the producer publishing the batch before it.
    pub fn cancel<B>(
        &self,
        bus: &B,
        jobq: RegisterWindow,
        ring: &HardwareRing,
        ticket: &mut Ticket,
        noop: &[u64],
    ) where
        B: RegisterBus + ?Sized,
    {
        if !ticket.is_open() {
            return;
        }
        for index in 0..ticket.count {
            ring.write_entry(ticket.first + index, noop);
        }
        ticket.cancelled = true;

        let Some(entry) = self.handoff_entry(ticket.first) else {
            return;
        };
        entry.store(ticket.end(), Ordering::SeqCst);
        fence(Ordering::SeqCst);
        // the predecessor may have published before our entry was visible;
        // the swap decides which side publishes
        if jobq.read(bus, TX_JOB_Q_VALID_WP) == ticket.first
            && entry.swap(0, Ordering::AcqRel) != 0
        {
            self.publish(bus, jobq, ticket.end());
        }
        dma_debug!(
            "TX job queue {:#x}: ticket {} cancelled",
            jobq.base(),
            ticket.first
        );
    }

    /// Advance the valid write pointer to `end`, then past every cancelled
    /// batch queued right behind it
    fn publish<B: RegisterBus + ?Sized>(&self, bus: &B, jobq: RegisterWindow, end: u64) {
        let mut end = end;
        loop {
            // descriptors must land before the controller sees them
            fence(Ordering::Release);
            jobq.write(bus, TX_JOB_Q_VALID_WP, end);
            fence(Ordering::SeqCst);
            let next = self
                .handoff_entry(end)
                .map_or(0, |entry| entry.swap(0, Ordering::AcqRel));
            if next == 0 {
                return;
            }
            end = next;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
