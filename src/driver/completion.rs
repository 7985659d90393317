//! Deferred completion worker
//!
//! Interrupt handlers only mark work pending. [`DmaDevice::run_completion_task`]
//! does the rest from thread or deferred context: it compares the running
//! descriptors of every issued channel with their phy's completion counter,
//! retires the finished ones and calls their callbacks with the allocation
//! lock released.

use alloc::vec::Vec;
use core::sync::atomic::{Ordering, fence};

use super::channel::Completed;
use super::device::{DeviceState, DmaDevice, MSI_WORDS};
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::register::RegisterBus;
use crate::internal::trace::dma_debug;

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    /// Retire completed descriptors and run their callbacks
    ///
    /// Single flight: a call made while another one runs returns 0 at once
    /// and leaves its work to the running call. The running call checks
    /// the pending marks again after leaving, so work marked while it was
    /// on its way out is not lost. Returns the number of descriptors
    /// retired.
    pub fn run_completion_task(&self) -> usize {
        let mut total = 0;
        loop {
            let Some(guard) = self.worker.try_enter() else {
                return total;
            };
            while self.take_pending() {
                let done = self.state.with(|s| self.collect_completed(s));
                total += done.len();
                for completed in &done {
                    if let Some(callback) = completed.callback {
                        callback(completed.id, completed.cookie);
                    }
                }
            }
            drop(guard);
            // pairs with the mark-then-enter order of the interrupt side
            fence(Ordering::SeqCst);
            if !self.has_pending_work() {
                return total;
            }
        }
    }

    /// Whether an interrupt asked for the completion worker
    pub fn has_pending_work(&self) -> bool {
        self.pending.any() || self.fallback.load(Ordering::Acquire)
    }

    /// Clear the pending marks; true if any was set
    fn take_pending(&self) -> bool {
        let mut any = self.fallback.swap(false, Ordering::AcqRel);
        for word in 0..MSI_WORDS {
            any |= self.pending.take_word(word) != 0;
        }
        any
    }

    fn collect_completed(&self, s: &mut DeviceState) -> Vec<Completed> {
        let mut done = Vec::new();
        let DeviceState {
            channels,
            pending_channels,
            ..
        } = s;

        pending_channels.retain(|&id| {
            let Some(Some(chan)) = channels.get_mut(id.index()) else {
                return false;
            };
            let Some(binding) = chan.binding() else {
                return false;
            };
            let count = self.completion_count(&binding);
            chan.retire(count, id, &mut done);
            if chan.is_idle() {
                dma_debug!("chan {} idle", id.index());
                return false;
            }
            true
        });
        done
    }
}

// =============================================================================
// Tests
// =============================================================================
