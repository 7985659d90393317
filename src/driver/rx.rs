//! RX channels
//!
//! Two flavours exist:
//! - packet channels (mem2eth): buffers are offered through the RX job
//!   queue of the channel's cache, and every received packet lands in the
//!   channel's completion queue as a full descriptor;
//! - fifo channels (mem2noc): one static buffer is attached and the
//!   hardware counts completed transfers.
//!
//! Enqueue and dequeue only touch registers and queue memory; they never
//! take the allocation lock.

use core::marker::PhantomData;
use core::sync::atomic::{Ordering, fence};

use super::config::TransferType;
use super::device::DmaDevice;
use super::phy::{PhyId, RxCallback};
use crate::error::{ArgumentError, Error, Result};
use crate::internal::dma::descriptor::{RxCompletion, RxJobDescriptor};
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::dma::ring::HardwareRing;
use crate::internal::register::rx::{
    RX_CHAN_COMP_Q_LOAD_INCR_RP, RX_CHAN_COMP_Q_RP, RX_CHAN_COMP_Q_VALID_RP, RX_CHAN_COMP_Q_WP,
    RX_JOB_Q_LOAD_INCR_WP, RX_JOB_Q_RP, RX_JOB_Q_VALID_WP, RX_JOB_Q_WP,
};
use crate::internal::register::{RegisterBus, RegisterWindow};
use crate::internal::trace::{dma_debug, dma_warn};

/// Handle on a reserved RX channel
///
/// Borrowing the device keeps it alive. Hand the handle back with
/// [`DmaDevice::release_channel`].
#[derive(Debug)]
pub struct RxChannel<'d> {
    phy: PhyId,
    transfer: TransferType,
    chan: RegisterWindow,
    jobq: RegisterWindow,
    job_ring: Option<HardwareRing>,
    comp_ring: Option<HardwareRing>,
    _device: PhantomData<&'d ()>,
}

impl RxChannel<'_> {
    /// Physical channel behind this handle
    pub const fn phy(&self) -> PhyId {
        self.phy
    }

    /// RX channel index (the RX tag senders use)
    pub const fn hw_id(&self) -> usize {
        self.phy.hw_id
    }

    /// Transfer type the channel was reserved for
    pub const fn transfer(&self) -> TransferType {
        self.transfer
    }
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    // =========================================================================
    // Reservation
    // =========================================================================

    /// Reserve packet RX channel `hw_id`, fed by job cache `rx_cache_id`
    ///
    /// The first channel on a cache initializes the cache's job queue;
    /// later ones share it. `callback` runs from
    /// [`DmaDevice::handle_phy_irq`] when the channel signals.
    pub fn reserve_rx_channel(
        &self,
        hw_id: usize,
        rx_cache_id: usize,
        callback: Option<RxCallback>,
    ) -> Result<RxChannel<'_>> {
        self.reserve_rx(hw_id, rx_cache_id, TransferType::Mem2Eth, callback)
    }

    /// Reserve static-mode RX channel `hw_id`
    ///
    /// The channel stays idle until a buffer is attached with
    /// [`DmaDevice::attach_rx_buffer`].
    pub fn reserve_rx_fifo_channel(
        &self,
        hw_id: usize,
        callback: Option<RxCallback>,
    ) -> Result<RxChannel<'_>> {
        self.reserve_rx(hw_id, 0, TransferType::Mem2Noc, callback)
    }

    fn reserve_rx(
        &self,
        hw_id: usize,
        rx_cache_id: usize,
        transfer: TransferType,
        callback: Option<RxCallback>,
    ) -> Result<RxChannel<'_>> {
        let phy = PhyId::rx(hw_id);
        phy.check()?;
        self.state.with(|s| {
            self.acquire_rx_phy(s, hw_id, rx_cache_id, transfer, callback)?;
            let state = s.phy(phy)?;
            Ok(RxChannel {
                phy,
                transfer,
                chan: state.rx_channel(),
                jobq: state.rx_job_queue(),
                job_ring: state.rx_job_ring(self.size_log2),
                comp_ring: state.rx_completion_ring(self.size_log2),
                _device: PhantomData,
            })
        })
    }

    // =========================================================================
    // Fifo Channels
    // =========================================================================

    /// Attach the receive buffer of a fifo channel and start it
    pub fn attach_rx_buffer(&self, rx: &RxChannel<'_>, addr: u64, len: u64) -> Result<()> {
        if rx.transfer != TransferType::Mem2Noc {
            return Err(Error::InvalidArgument(ArgumentError::UnsupportedTransfer));
        }
        if addr == 0 || len == 0 {
            return Err(Error::InvalidArgument(ArgumentError::InvalidTransfer));
        }
        self.state.with(|s| {
            s.phy(rx.phy)
                .map(|phy| phy.attach_rx_buffer(&self.bus, addr, len))
        })
    }

    /// Transfers completed on `rx` so far
    ///
    /// For packet channels this is the completion queue write pointer.
    pub fn rx_completion_count(&self, rx: &RxChannel<'_>) -> u64 {
        rx.chan.read(&self.bus, RX_CHAN_COMP_Q_WP)
    }

    // =========================================================================
    // Packet Channels
    // =========================================================================

    /// Offer an empty buffer to the job queue of `rx`'s cache
    ///
    /// Returns `Busy` when the job queue is full.
    pub fn enqueue_rx_buffer(&self, rx: &RxChannel<'_>, addr: u64, len: u64) -> Result<()> {
        let ring = rx
            .job_ring
            .as_ref()
            .ok_or(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))?;
        if len == 0 {
            return Err(Error::InvalidArgument(ArgumentError::InvalidTransfer));
        }

        let write = rx.jobq.read(&self.bus, RX_JOB_Q_WP);
        let read = rx.jobq.read(&self.bus, RX_JOB_Q_RP);
        if !ring.has_room(write, read, 1) {
            dma_warn!("RX job queue full: wp {} rp {}", write, read);
            return Err(Error::Busy);
        }

        let ticket = rx.jobq.load_incr(&self.bus, RX_JOB_Q_LOAD_INCR_WP);
        let desc = RxJobDescriptor { base: addr, size: len };
        ring.write_entry(ticket, &desc.to_words());
        fence(Ordering::Release);
        rx.jobq.write(&self.bus, RX_JOB_Q_VALID_WP, ticket + 1);
        Ok(())
    }

    /// Pop the next completed packet of `rx`
    ///
    /// Returns `Ok(None)` when nothing is pending, and the latched error
    /// vector as `HardwareFault` if the controller reported one.
    pub fn get_completed(&self, rx: &RxChannel<'_>) -> Result<Option<RxCompletion>> {
        let ring = rx
            .comp_ring
            .as_ref()
            .ok_or(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))?;
        if let Some(vector) = self.consume_error(rx.phy) {
            return Err(Error::HardwareFault(vector));
        }

        let count = rx.chan.read(&self.bus, RX_CHAN_COMP_Q_WP);
        let read = rx.chan.read(&self.bus, RX_CHAN_COMP_Q_RP);
        if read >= count {
            return Ok(None);
        }

        let ticket = rx.chan.load_incr(&self.bus, RX_CHAN_COMP_Q_LOAD_INCR_RP);
        let completion = RxCompletion::from_words(ring.read_entry(ticket));
        fence(Ordering::Acquire);
        rx.chan.write(&self.bus, RX_CHAN_COMP_Q_VALID_RP, ticket + 1);
        Ok(Some(completion))
    }

    /// Drop every offered buffer and every unread completion of `rx`
    ///
    /// Buffers the hardware has not consumed are forgotten; the caller
    /// still owns their memory.
    pub fn flush_rx_job_queue(&self, rx: &RxChannel<'_>) {
        if rx.job_ring.is_some() {
            let valid = rx.jobq.read(&self.bus, RX_JOB_Q_VALID_WP);
            rx.jobq.write(&self.bus, RX_JOB_Q_WP, valid);
            rx.jobq.write(&self.bus, RX_JOB_Q_RP, valid);
        }
        let count = rx.chan.read(&self.bus, RX_CHAN_COMP_Q_WP);
        rx.chan.write(&self.bus, RX_CHAN_COMP_Q_RP, count);
        rx.chan.write(&self.bus, RX_CHAN_COMP_Q_VALID_RP, count);
        dma_debug!("RX phy {} flushed at {}", rx.phy.hw_id, count);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::device::tests::device;
    use crate::internal::register::rx::{
        RX_CHAN_ACTIVATED, RX_CHAN_BUF_SA, RX_CHAN_BUF_SIZE, RX_CHAN_COMP_Q_SA, RX_JOB_Q_ACTIVATE,
        RX_JOB_Q_SA, RX_JOB_Q_STOP, rx_channel, rx_job_queue,
    };

    // =========================================================================
    // Reservation Tests
    // =========================================================================

    #[test]
    fn packet_channel_starts_queues() {
        let dev = device();
        let rx = dev.reserve_rx_channel(7, 2, None).unwrap();
        assert_eq!(rx.hw_id(), 7);
        assert_eq!(rx.transfer(), TransferType::Mem2Eth);
        assert_eq!(dev.bus().get(rx_channel(7).at(RX_CHAN_ACTIVATED)), 1);
        // cache 2 uses job queue 4
        assert_eq!(dev.bus().get(rx_job_queue(4).at(RX_JOB_Q_ACTIVATE)), 1);
        dev.release_channel(rx).unwrap();
        assert_eq!(dev.bus().get(rx_channel(7).at(RX_CHAN_ACTIVATED)), 0);
    }

    #[test]
    fn shared_job_queue_is_set_up_once() {
        let dev = device();
        let jobq = rx_job_queue(2);
        let a = dev.reserve_rx_channel(1, 1, None).unwrap();
        let b = dev.reserve_rx_channel(2, 1, None).unwrap();
        assert_eq!(dev.bus().writes_to(jobq.at(RX_JOB_Q_SA)).len(), 1);

        dev.bus().clear_writes();
        dev.release_channel(a).unwrap();
        assert!(dev.bus().writes_to(jobq.at(RX_JOB_Q_STOP)).is_empty());
        dev.release_channel(b).unwrap();
        assert_eq!(dev.bus().writes_to(jobq.at(RX_JOB_Q_STOP)), [1]);
        assert_eq!(dev.allocator().outstanding(), 0);
    }

    #[test]
    fn active_channel_is_refused() {
        let dev = device();
        dev.bus().set(rx_channel(9).at(RX_CHAN_ACTIVATED), 1);
        assert!(matches!(dev.reserve_rx_channel(9, 0, None), Err(Error::AlreadyInUse)));
        assert!(matches!(
            dev.reserve_rx_channel(64, 0, None),
            Err(Error::InvalidArgument(ArgumentError::InvalidPhyId))
        ));
        assert!(matches!(
            dev.reserve_rx_channel(3, 4, None),
            Err(Error::InvalidArgument(ArgumentError::InvalidCacheId))
        ));
        assert_eq!(dev.allocator().outstanding(), 0);
    }

    // =========================================================================
    // Packet Path Tests
    // =========================================================================

    #[test]
    fn enqueue_writes_descriptor_and_publishes() {
        let dev = device();
        let rx = dev.reserve_rx_channel(0, 0, None).unwrap();
        let jobq = rx_job_queue(0);
        let sa = dev.bus().get(jobq.at(RX_JOB_Q_SA));

        dev.enqueue_rx_buffer(&rx, 0x8000, 2048).unwrap();
        dev.enqueue_rx_buffer(&rx, 0x9000, 1024).unwrap();

        assert_eq!(dev.allocator().read_word(sa), 0x8000);
        assert_eq!(dev.allocator().read_word(sa + 8), 2048);
        assert_eq!(dev.allocator().read_word(sa + 16), 0x9000);
        assert_eq!(dev.bus().get(jobq.at(RX_JOB_Q_WP)), 2);
        assert_eq!(dev.bus().writes_to(jobq.at(RX_JOB_Q_VALID_WP)), [0, 1, 2]);
        dev.release_channel(rx).unwrap();
    }

    #[test]
    fn full_job_queue_is_busy() {
        let dev = device();
        let rx = dev.reserve_rx_channel(0, 0, None).unwrap();
        let jobq = rx_job_queue(0);
        dev.bus().set(jobq.at(RX_JOB_Q_WP), dev.queue_capacity());
        assert_eq!(dev.enqueue_rx_buffer(&rx, 0x8000, 64), Err(Error::Busy));
        assert_eq!(dev.bus().get(jobq.at(RX_JOB_Q_WP)), dev.queue_capacity());

        dev.bus().set(jobq.at(RX_JOB_Q_RP), 1);
        assert_eq!(dev.enqueue_rx_buffer(&rx, 0x8000, 64), Ok(()));
        assert_eq!(dev.enqueue_rx_buffer(&rx, 0x8000, 0), Err(Error::InvalidArgument(ArgumentError::InvalidTransfer)));
        dev.release_channel(rx).unwrap();
    }

    #[test]
    fn completions_are_popped_in_order() {
        let dev = device();
        let rx = dev.reserve_rx_channel(5, 0, None).unwrap();
        let chan = rx_channel(5);
        let sa = dev.bus().get(chan.at(RX_CHAN_COMP_Q_SA));
        assert_eq!(dev.get_completed(&rx), Ok(None));

        for (i, word) in [0x8000, 2048, 60, 0xA].into_iter().enumerate() {
            dev.allocator().write_word(sa + 8 * i as u64, word);
        }
        dev.allocator().write_word(sa + 32, 0x9000);
        dev.bus().set(chan.at(RX_CHAN_COMP_Q_WP), 2);

        let first = dev.get_completed(&rx).unwrap().unwrap();
        assert_eq!(
            first,
            RxCompletion {
                base: 0x8000,
                size: 2048,
                byte_count: 60,
                notif: 0xA
            }
        );
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_COMP_Q_VALID_RP)), 1);
        assert_eq!(dev.get_completed(&rx).unwrap().unwrap().base, 0x9000);
        assert_eq!(dev.get_completed(&rx), Ok(None));
        assert_eq!(dev.rx_completion_count(&rx), 2);
        dev.release_channel(rx).unwrap();
    }

    #[test]
    fn flush_discards_pending_completions() {
        let dev = device();
        let rx = dev.reserve_rx_channel(5, 0, None).unwrap();
        let chan = rx_channel(5);
        let jobq = rx_job_queue(0);
        dev.bus().set(chan.at(RX_CHAN_COMP_Q_WP), 3);
        dev.bus().set(jobq.at(RX_JOB_Q_VALID_WP), 4);

        dev.flush_rx_job_queue(&rx);
        assert_eq!(dev.get_completed(&rx), Ok(None));
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_COMP_Q_RP)), 3);
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_COMP_Q_VALID_RP)), 3);
        assert_eq!(dev.bus().get(jobq.at(RX_JOB_Q_WP)), 4);
        assert_eq!(dev.bus().get(jobq.at(RX_JOB_Q_RP)), 4);
        dev.release_channel(rx).unwrap();
    }

    #[test]
    fn latched_error_is_reported_once() {
        let dev = device();
        let rx = dev.reserve_rx_channel(5, 0, None).unwrap();
        dev.err_vec.store(0x4, Ordering::Release);
        assert_eq!(dev.get_completed(&rx), Err(Error::HardwareFault(0x4)));
        assert_eq!(dev.latched_error(), 0);
        assert_eq!(dev.get_completed(&rx), Ok(None));
        dev.release_channel(rx).unwrap();
    }

    // =========================================================================
    // Fifo Path Tests
    // =========================================================================

    #[test]
    fn fifo_channel_waits_for_buffer() {
        let dev = device();
        let rx = dev.reserve_rx_fifo_channel(12, None).unwrap();
        let chan = rx_channel(12);
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_ACTIVATED)), 0);
        assert_eq!(dev.allocator().alloc_count(), 0);

        assert_eq!(
            dev.attach_rx_buffer(&rx, 0x4000, 0),
            Err(Error::InvalidArgument(ArgumentError::InvalidTransfer))
        );
        dev.attach_rx_buffer(&rx, 0x4000, 0x1000).unwrap();
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_BUF_SA)), 0x4000);
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_BUF_SIZE)), 0x1000);
        assert_eq!(dev.bus().get(chan.at(RX_CHAN_ACTIVATED)), 1);

        assert_eq!(
            dev.enqueue_rx_buffer(&rx, 0x4000, 64),
            Err(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))
        );
        dev.release_channel(rx).unwrap();
    }

    #[test]
    fn packet_channel_has_no_static_buffer() {
        let dev = device();
        let rx = dev.reserve_rx_channel(3, 0, None).unwrap();
        assert_eq!(
            dev.attach_rx_buffer(&rx, 0x4000, 64),
            Err(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))
        );
        dev.release_channel(rx).unwrap();
    }
}
