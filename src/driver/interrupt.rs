//! Interrupt handling
//!
//! Every phy has its own MSI vector (RX phys first, then TX phys) and the
//! controller has one shared error line. The handlers here do the minimum
//! in interrupt context:
//! - a phy vector marks the phy pending for the completion worker, or
//!   calls the RX callback registered at reservation;
//! - the error line latches the decoded error vector, which the next
//!   status poll reports and clears.
//!
//! The platform wires [`DmaDevice::handle_phy_irq`] and
//! [`DmaDevice::handle_error_irq`] to its interrupt lines and runs
//! [`DmaDevice::run_completion_task`] from deferred context.

use core::sync::atomic::Ordering;

use bitflags::bitflags;

use super::device::DmaDevice;
use super::phy::PhyId;
use crate::error::Result;
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::register::global::{IT_OFFSET, IT_VECTOR_LAC, IT_VECTOR_MASK};
use crate::internal::register::{RegisterBus, RegisterWindow};
use crate::internal::trace::{dma_debug, dma_error};

// =============================================================================
// Error Vector
// =============================================================================

bitflags! {
    /// Causes reported on the error line
    ///
    /// Bits 0..=11 are RX errors, bits 16..=30 TX errors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorVector: u64 {
        /// Write to a closed RX channel
        const RX_CLOSED_CHAN = 1 << 0;
        /// RX write pointer past the buffer
        const RX_WRITE_POINTER = 1 << 1;
        /// RX buffer size not a multiple of the transfer
        const RX_BUFFER_SIZE = 1 << 2;
        /// Bad RX buffer address
        const RX_BUFFER_ADDR = 1 << 3;
        /// Double ECC error on an RX buffer write
        const RX_BUFFER_DECC = 1 << 4;
        /// Bad RX completion queue address
        const RX_COMP_QUEUE_ADDR = 1 << 5;
        /// Double ECC error on an RX completion queue write
        const RX_COMP_QUEUE_DECC = 1 << 6;
        /// Bad RX job queue address
        const RX_JOB_QUEUE_ADDR = 1 << 7;
        /// Double ECC error on an RX job queue read
        const RX_JOB_QUEUE_DECC = 1 << 8;
        /// Bad address while refilling an empty RX job cache
        const RX_JOB_CACHE_EMPTY_ADDR = 1 << 9;
        /// Double ECC error while refilling an empty RX job cache
        const RX_JOB_CACHE_EMPTY_DECC = 1 << 10;
        /// RX channel job cache fault
        const RX_CHAN_JOB_CACHE = 1 << 11;
        /// Malformed TX instruction bundle
        const TX_BUNDLE = 1 << 16;
        /// TX program not allowed for the job queue
        const TX_PGRM_PERM = 1 << 17;
        /// NoC route not allowed for the program
        const TX_NOC_PERM = 1 << 18;
        /// Completion queue not allowed for the program
        const TX_COMP_PERM = 1 << 19;
        /// Bad TX read address
        const TX_READ_ADDR = 1 << 20;
        /// Double ECC error on a TX read
        const TX_READ_DECC = 1 << 21;
        /// Bad TX write address
        const TX_WRITE_ADDR = 1 << 22;
        /// Double ECC error on a TX write
        const TX_WRITE_DECC = 1 << 23;
        /// Bad TX completion queue address
        const TX_COMP_QUEUE_ADDR = 1 << 24;
        /// Double ECC error on a TX completion queue write
        const TX_COMP_QUEUE_DECC = 1 << 25;
        /// Bad TX job queue address
        const TX_JOB_QUEUE_ADDR = 1 << 26;
        /// Double ECC error on a TX job queue read
        const TX_JOB_QUEUE_DECC = 1 << 27;
        /// TX job failed to push an RX job
        const TX_JOB_TO_RX_JOB_PUSH = 1 << 28;
        /// TX atomic add fault
        const TX_AT_ADD = 1 << 29;
        /// TX virtual channel mismatch
        const TX_VCHAN = 1 << 30;
    }
}

impl ErrorVector {
    /// Whether any RX cause is set
    pub const fn has_rx_error(&self) -> bool {
        self.bits() & 0xFFF != 0
    }

    /// Whether any TX cause is set
    pub const fn has_tx_error(&self) -> bool {
        self.bits() & 0x7FFF_0000 != 0
    }
}

// =============================================================================
// Phy Interrupts
// =============================================================================

/// What [`DmaDevice::handle_phy_irq`] did with an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqAction {
    /// Interrupts of the phy are disabled
    Ignored,
    /// Logical channels are bound; run the completion worker
    ScheduleCompletion,
    /// The RX callback of the phy was invoked
    RxCallback,
    /// Nothing claims the phy; run the completion worker as a fallback
    ScheduleFallback,
}

impl IrqAction {
    /// Whether the completion worker should run
    pub const fn needs_worker(&self) -> bool {
        matches!(self, Self::ScheduleCompletion | Self::ScheduleFallback)
    }
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    /// Unmask the vector of `phy`
    pub fn enable_irq(&self, phy: PhyId) -> Result<()> {
        phy.check()?;
        self.irq_enabled.set(phy.msi_index());
        Ok(())
    }

    /// Mask the vector of `phy`; its interrupts are then ignored
    pub fn disable_irq(&self, phy: PhyId) -> Result<()> {
        phy.check()?;
        self.irq_enabled.clear(phy.msi_index());
        Ok(())
    }

    /// Whether the vector of `phy` is unmasked
    pub fn irq_enabled(&self, phy: PhyId) -> bool {
        phy.check().is_ok() && self.irq_enabled.contains(phy.msi_index())
    }

    /// Handle MSI vector `msi_index`
    ///
    /// The RX callback runs outside the allocation lock.
    pub fn handle_phy_irq(&self, msi_index: usize) -> Result<IrqAction> {
        let phy = PhyId::from_msi_index(msi_index)?;
        if !self.irq_enabled.contains(msi_index) {
            return Ok(IrqAction::Ignored);
        }

        let (bound, callback) = self
            .state
            .with(|s| s.phy(phy).map(|p| (!p.bound.is_empty(), p.rx_callback)))?;

        if bound {
            self.pending.set(msi_index);
            return Ok(IrqAction::ScheduleCompletion);
        }
        if let Some(callback) = callback {
            callback(phy);
            return Ok(IrqAction::RxCallback);
        }
        dma_debug!("irq on phy {:?} without channel, running fallback", phy);
        self.fallback.store(true, Ordering::Release);
        Ok(IrqAction::ScheduleFallback)
    }

    /// Handle the shared error line
    ///
    /// Returns the decoded causes; an empty vector means a spurious
    /// interrupt.
    pub fn handle_error_irq(&self) -> ErrorVector {
        let raw = RegisterWindow::new(IT_OFFSET).read(&self.bus, IT_VECTOR_LAC) & IT_VECTOR_MASK;
        let vector = ErrorVector::from_bits_truncate(raw);
        if vector.is_empty() {
            dma_error!("error irq with empty vector");
            return vector;
        }

        self.err_vec.fetch_or(vector.bits(), Ordering::AcqRel);
        for (name, _) in vector.iter_names() {
            dma_error!("DMA error: {}", name);
        }
        vector
    }
}

// =============================================================================
// Tests
// =============================================================================
