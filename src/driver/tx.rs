//! TX channels
//!
//! A TX channel owns nothing exclusively: it is a reference on a TX job
//! and completion queue pair plus a NoC route id. Every producer on the
//! pair goes through the phy's [`TicketCounter`], so jobs from several
//! handles on the same phy still reach the controller in ticket order.

use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;

use super::config::{Fragment, RouteParams, TransferType};
use super::device::{DeviceState, DmaDevice};
use super::phy::{PhyId, PhyState};
use super::route::{get_or_create_route, route_value};
use super::ticket::{Ticket, TicketCounter};
use crate::constants::MAX_FRAGMENTS;
use crate::error::{ArgumentError, Error, ResourceKind, Result};
use crate::internal::dma::descriptor::{TxJob, TxJobDescriptor};
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::dma::ring::HardwareRing;
use crate::internal::register::tx::TX_COMP_Q_WP;
use crate::internal::register::{RegisterBus, RegisterWindow};
use crate::internal::trace::{dma_debug, dma_warn};

/// Everything the submit path needs, copied out of the phy at bind time
#[derive(Debug, Clone, Copy)]
pub(crate) struct TxPath {
    pub hw_id: usize,
    pub transfer: TransferType,
    pub pgrm_id: u64,
    pub jobq: RegisterWindow,
    pub compq: RegisterWindow,
    pub ring: HardwareRing,
}

impl TxPath {
    pub(crate) fn new(phy: &PhyState, transfer: TransferType, pgrm_id: u8, size_log2: u32) -> Result<Self> {
        let ring = phy
            .tx_job_ring(size_log2)
            .ok_or(Error::ResourceExhausted(ResourceKind::QueueMemory))?;
        Ok(Self {
            hw_id: phy.id.hw_id,
            transfer,
            pgrm_id: pgrm_id as u64,
            jobq: phy.tx_job_queue(),
            compq: phy.tx_completion_queue(),
            ring,
        })
    }

    /// Job queue entry for `job` under this path's program
    pub(crate) fn encode(&self, job: &TxJob) -> [u64; TxJobDescriptor::WORDS] {
        let desc = match self.transfer {
            TransferType::Mem2Eth => TxJobDescriptor::packet(job, self.pgrm_id),
            TransferType::Mem2Mem | TransferType::Mem2Noc => {
                TxJobDescriptor::strided(job, self.pgrm_id)
            }
        };
        desc.to_words()
    }

    /// Entry filling a cancelled slot
    pub(crate) const fn noop(&self) -> [u64; TxJobDescriptor::WORDS] {
        TxJobDescriptor::noop(self.pgrm_id, self.hw_id as u64).to_words()
    }
}

/// Handle on a reserved TX channel
///
/// Several handles may share one phy. Hand each back with
/// [`DmaDevice::release_channel`].
#[derive(Debug)]
pub struct TxChannel<'d> {
    path: TxPath,
    route_id: u64,
    hdr_ring: Option<HardwareRing>,
    _device: PhantomData<&'d ()>,
}

impl TxChannel<'_> {
    /// Physical channel behind this handle
    pub const fn phy(&self) -> PhyId {
        PhyId::tx(self.path.hw_id)
    }

    /// TX job queue index; also the completion queue jobs report to
    pub const fn hw_id(&self) -> usize {
        self.path.hw_id
    }

    /// Transfer type the channel was reserved for
    pub const fn transfer(&self) -> TransferType {
        self.path.transfer
    }

    /// NoC route table entry set up at reservation
    pub const fn route_id(&self) -> u64 {
        self.route_id
    }

    /// Microcode program used to encode jobs
    pub const fn program_id(&self) -> u64 {
        self.path.pgrm_id
    }
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    // =========================================================================
    // Reservation
    // =========================================================================

    /// Reserve TX queue pair `hw_id` for `transfer` towards `route`
    ///
    /// The program for `transfer` must be loaded. The first reservation
    /// programs the queues; later ones only take a reference and must ask
    /// for the same transfer type. A route table that cannot take `route`
    /// undoes the reservation.
    pub fn reserve_tx_channel(
        &self,
        hw_id: usize,
        transfer: TransferType,
        route: &RouteParams,
    ) -> Result<TxChannel<'_>> {
        self.state.with(|s| {
            let (path, route_id) = self.bind_tx(s, hw_id, transfer, route)?;
            let hdr_ring = s.phy(PhyId::tx(hw_id))?.tx_header_ring(self.size_log2);
            Ok(TxChannel {
                path,
                route_id,
                hdr_ring,
                _device: PhantomData,
            })
        })
    }

    /// Take a reference on TX phy `hw_id` and install `route`
    pub(super) fn bind_tx(
        &self,
        s: &mut DeviceState,
        hw_id: usize,
        transfer: TransferType,
        route: &RouteParams,
    ) -> Result<(TxPath, u64)> {
        let phy = PhyId::tx(hw_id);
        phy.check()?;
        let pgrm_id = s
            .ucode
            .program(transfer)
            .ok_or(Error::InvalidArgument(ArgumentError::ProgramNotLoaded))?;
        self.acquire_tx_phy(s, hw_id, transfer)?;

        let value = route_value(route, self.config.asn, self.vchan);
        let route_id = match get_or_create_route(&self.bus, self.config.noc_route_ids, value) {
            Ok(id) => id,
            Err(e) => {
                self.release_phy(s, phy)?;
                return Err(e);
            }
        };

        let path = TxPath::new(s.phy(phy)?, transfer, pgrm_id, self.size_log2)?;
        dma_debug!("TX phy {} route {} program {}", hw_id, route_id, pgrm_id);
        Ok((path, route_id))
    }

    // =========================================================================
    // Path Level Submission
    // =========================================================================

    fn ticket_counter(&self, hw_id: usize) -> Result<&TicketCounter> {
        self.tickets
            .get(hw_id)
            .ok_or(Error::InvalidArgument(ArgumentError::InvalidPhyId))
    }

    pub(super) fn acquire_on<D: DelayNs>(
        &self,
        path: &TxPath,
        n: u64,
        delay: &mut D,
    ) -> Result<Ticket> {
        self.ticket_counter(path.hw_id)?
            .acquire(&self.bus, path.jobq, &path.ring, n, delay)
    }

    pub(super) fn submit_on<D: DelayNs>(
        &self,
        path: &TxPath,
        ticket: &mut Ticket,
        delay: &mut D,
    ) -> Result<u64> {
        self.ticket_counter(path.hw_id)?
            .submit(&self.bus, path.jobq, ticket, delay)
    }

    pub(super) fn cancel_on(&self, path: &TxPath, ticket: &mut Ticket) -> Result<()> {
        self.ticket_counter(path.hw_id)?
            .cancel(&self.bus, path.jobq, &path.ring, ticket, &path.noop());
        Ok(())
    }

    /// Write `jobs` into fresh slots and publish them; returns the job id
    /// of the last one
    ///
    /// Every wait is bounded. When the publish times out the slots are
    /// cancelled, so `Busy` means none of `jobs` will run and later
    /// producers are not held up.
    pub(super) fn post_on<D: DelayNs>(
        &self,
        path: &TxPath,
        jobs: &[TxJob],
        delay: &mut D,
    ) -> Result<u64> {
        let mut ticket = self.acquire_on(path, jobs.len() as u64, delay)?;
        let result = jobs
            .iter()
            .enumerate()
            .try_for_each(|(i, job)| {
                TicketCounter::write(&path.ring, &ticket, i as u64, &path.encode(job))
            })
            .and_then(|()| self.submit_on(path, &mut ticket, delay));
        if result.is_err() {
            dma_warn!(
                "TX queue {}: cancelling ticket {}",
                path.hw_id,
                ticket.first()
            );
            self.cancel_on(path, &mut ticket)?;
        }
        result
    }

    /// Push one job and publish it; returns its hardware job id
    pub(super) fn push_on<D: DelayNs>(
        &self,
        path: &TxPath,
        job: &TxJob,
        delay: &mut D,
    ) -> Result<u64> {
        self.post_on(path, core::slice::from_ref(job), delay)
    }

    // =========================================================================
    // Public Submission
    // =========================================================================

    /// Send one packet made of `fragments`
    ///
    /// Returns the hardware job id of the last fragment: the packet is
    /// sent once [`DmaDevice::tx_completion_count`] reaches it. On `Busy`
    /// nothing of the packet is sent.
    pub fn submit_packet<D: DelayNs>(
        &self,
        tx: &TxChannel<'_>,
        fragments: &[Fragment],
        route_id: u64,
        delay: &mut D,
    ) -> Result<u64> {
        if tx.path.transfer != TransferType::Mem2Eth {
            return Err(ArgumentError::UnsupportedTransfer.into());
        }
        if fragments.is_empty() || fragments.len() > MAX_FRAGMENTS {
            return Err(ArgumentError::InvalidBatchSize.into());
        }
        if fragments.iter().any(|f| f.len == 0) {
            return Err(ArgumentError::InvalidTransfer.into());
        }

        let path = &tx.path;
        let last = fragments.len() - 1;
        let mut jobs = [TxJob::default(); MAX_FRAGMENTS];
        for ((i, frag), slot) in fragments.iter().enumerate().zip(jobs.iter_mut()) {
            *slot = TxJob {
                comp_q_id: path.hw_id as u64,
                route_id,
                eot: i == last,
                ..TxJob::linear(frag.addr, 0, frag.len)
            };
        }
        self.post_on(path, &jobs[..fragments.len()], delay)
    }

    /// Push one job exactly as given; returns its hardware job id
    ///
    /// On `Busy` the job is not sent and may be pushed again.
    pub fn push_job<D: DelayNs>(&self, tx: &TxChannel<'_>, job: &TxJob, delay: &mut D) -> Result<u64> {
        self.push_on(&tx.path, job, delay)
    }

    /// Claim `n` consecutive job slots of `tx`'s queue
    ///
    /// Fill them with [`DmaDevice::write_job`], then hand them over with
    /// [`DmaDevice::submit_jobs`]. On `Busy` from the submit, retry the
    /// submit with the same ticket or give it up with
    /// [`DmaDevice::cancel_jobs`]; a ticket left open holds up every later
    /// job on the queue.
    pub fn acquire_jobs<D: DelayNs>(&self, tx: &TxChannel<'_>, n: u64, delay: &mut D) -> Result<Ticket> {
        self.acquire_on(&tx.path, n, delay)
    }

    /// Encode `job` into slot `index` of `ticket`
    pub fn write_job(&self, tx: &TxChannel<'_>, ticket: &Ticket, index: u64, job: &TxJob) -> Result<()> {
        TicketCounter::write(&tx.path.ring, ticket, index, &tx.path.encode(job))
    }

    /// Publish the slots of `ticket` once every earlier ticket is published
    pub fn submit_jobs<D: DelayNs>(
        &self,
        tx: &TxChannel<'_>,
        ticket: &mut Ticket,
        delay: &mut D,
    ) -> Result<u64> {
        self.submit_on(&tx.path, ticket, delay)
    }

    /// Replace the slots of `ticket` with no-op jobs and release them
    ///
    /// The no-ops still count on the completion queue. Cancelling a
    /// submitted ticket does nothing.
    pub fn cancel_jobs(&self, tx: &TxChannel<'_>, ticket: &mut Ticket) -> Result<()> {
        self.cancel_on(&tx.path, ticket)
    }

    /// Jobs completed on `tx`'s queue so far
    pub fn tx_completion_count(&self, tx: &TxChannel<'_>) -> u64 {
        tx.path.compq.read(&self.bus, TX_COMP_Q_WP)
    }

    // =========================================================================
    // Header Queue
    // =========================================================================

    /// Device address of the packet header slot for job `job_idx`
    ///
    /// Only phys first reserved for mem2eth have a header queue.
    pub fn tx_header_addr(&self, tx: &TxChannel<'_>, job_idx: u64) -> Option<u64> {
        tx.hdr_ring.as_ref().map(|ring| ring.entry_dma_addr(job_idx))
    }

    /// Fill the packet header slot for job `job_idx`
    pub fn write_tx_header(&self, tx: &TxChannel<'_>, job_idx: u64, header: [u64; 2]) -> Result<()> {
        let ring = tx
            .hdr_ring
            .as_ref()
            .ok_or(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))?;
        ring.write_entry(job_idx, &header);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUBMIT_TIMEOUT_US;
    use crate::driver::config::{DeviceConfig, IdRange};
    use crate::driver::device::tests::{device, route};
    use crate::internal::register::tx::{TX_JOB_Q_SA, TX_JOB_Q_VALID_WP, tx_job_queue};
    use crate::test_utils::{MockDelay, MockDmaAllocator, MockFirmware, MockRegisters};

    const ENTRY_WORDS: u64 = TxJobDescriptor::WORDS as u64;

    fn word(dev: &crate::driver::device::tests::TestDevice, hw_id: usize, slot: u64, idx: u64) -> u64 {
        let sa = dev.bus().get(tx_job_queue(hw_id).at(TX_JOB_Q_SA));
        dev.allocator().read_word(sa + (slot * ENTRY_WORDS + idx) * 8)
    }

    fn frags(n: usize) -> alloc::vec::Vec<Fragment> {
        (0..n as u64)
            .map(|i| Fragment {
                addr: 0x1000 * (i + 1),
                len: 64 + i,
            })
            .collect()
    }

    // =========================================================================
    // Packet Tests
    // =========================================================================

    #[test]
    fn three_fragment_packet() {
        let config = DeviceConfig::new().with_vchan(0).with_dma_requests(128);
        let dev = DmaDevice::new(MockRegisters::new(), MockDmaAllocator::new(), config).unwrap();
        dev.load_default_ucodes(&MockFirmware::with_defaults(1)).unwrap();
        assert_eq!(dev.queue_capacity(), 128);

        let tx = dev.reserve_tx_channel(0, TransferType::Mem2Eth, &route()).unwrap();
        let mut delay = MockDelay::new();
        let job_id = dev.submit_packet(&tx, &frags(3), tx.route_id(), &mut delay).unwrap();
        assert_eq!(job_id, 3);

        // src, len, then eot in param 4
        for slot in 0..3 {
            assert_eq!(word(&dev, 0, slot, 0), 0x1000 * (slot + 1));
            assert_eq!(word(&dev, 0, slot, 1), 64 + slot);
            assert_eq!(word(&dev, 0, slot, 4), (slot == 2) as u64);
        }
        let config_word = TxJobDescriptor::config_word(false, tx.program_id(), tx.route_id(), 0);
        assert_eq!(word(&dev, 0, 2, 8), config_word);
        assert_eq!(dev.bus().writes_to(tx_job_queue(0).at(TX_JOB_Q_VALID_WP)), [0, 3]);

        assert_eq!(dev.tx_completion_count(&tx), 0);
        dev.bus().complete_tx(0, 3);
        assert!(dev.tx_completion_count(&tx) >= job_id);
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn packet_batch_limits() {
        let dev = device();
        let tx = dev.reserve_tx_channel(0, TransferType::Mem2Eth, &route()).unwrap();
        let mut delay = MockDelay::new();
        assert_eq!(
            dev.submit_packet(&tx, &[], 0, &mut delay),
            Err(Error::InvalidArgument(ArgumentError::InvalidBatchSize))
        );
        assert_eq!(
            dev.submit_packet(&tx, &frags(9), 0, &mut delay),
            Err(Error::InvalidArgument(ArgumentError::InvalidBatchSize))
        );
        let empty = [Fragment { addr: 0x1000, len: 0 }];
        assert_eq!(
            dev.submit_packet(&tx, &empty, 0, &mut delay),
            Err(Error::InvalidArgument(ArgumentError::InvalidTransfer))
        );
        assert_eq!(dev.submit_packet(&tx, &frags(8), 0, &mut delay), Ok(8));
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn packets_need_packet_channel() {
        let dev = device();
        let tx = dev.reserve_tx_channel(0, TransferType::Mem2Noc, &route()).unwrap();
        assert_eq!(
            dev.submit_packet(&tx, &frags(1), 0, &mut MockDelay::new()),
            Err(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))
        );
        dev.release_channel(tx).unwrap();
    }

    // =========================================================================
    // Job Tests
    // =========================================================================

    #[test]
    fn push_job_encodes_strided_copy() {
        let dev = device();
        let tx = dev.reserve_tx_channel(4, TransferType::Mem2Mem, &route()).unwrap();
        let job = TxJob {
            comp_q_id: 4,
            route_id: tx.route_id(),
            fence_after: true,
            ..TxJob::linear(0x1000, 0x2000, 100)
        };
        let mut delay = MockDelay::new();
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Ok(1));
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Ok(2));

        assert_eq!(word(&dev, 4, 1, 0), 0x1000);
        assert_eq!(word(&dev, 4, 1, 1), 0x2000);
        assert_eq!(word(&dev, 4, 1, 2), 6);
        assert_eq!(word(&dev, 4, 1, 3), 4);
        assert_eq!(word(&dev, 4, 1, 4), 1);
        assert_eq!(
            word(&dev, 4, 1, 8),
            TxJobDescriptor::config_word(true, tx.program_id(), tx.route_id(), 4)
        );
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn full_queue_is_busy_without_losing_slots() {
        let dev = device();
        let tx = dev.reserve_tx_channel(1, TransferType::Mem2Mem, &route()).unwrap();
        let job = TxJob::linear(0x1000, 0x2000, 8);
        let mut delay = MockDelay::new();
        for _ in 0..dev.queue_capacity() {
            dev.push_job(&tx, &job, &mut delay).unwrap();
        }
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Err(Error::Busy));
        assert!(delay.total_us() > 0);

        dev.bus().complete_tx(1, 1);
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Ok(dev.queue_capacity() + 1));
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn tickets_commit_in_order() {
        let dev = device();
        let tx = dev.reserve_tx_channel(2, TransferType::Mem2Noc, &route()).unwrap();
        let mut delay = MockDelay::new();
        let job = TxJob::linear(0x1000, 0x40, 16);

        let mut first = dev.acquire_jobs(&tx, 2, &mut delay).unwrap();
        let mut second = dev.acquire_jobs(&tx, 1, &mut delay).unwrap();
        assert_eq!((first.first(), second.first()), (0, 2));

        dev.write_job(&tx, &second, 0, &job).unwrap();
        assert_eq!(dev.submit_jobs(&tx, &mut second, &mut delay), Err(Error::Busy));

        dev.write_job(&tx, &first, 0, &job).unwrap();
        dev.write_job(&tx, &first, 1, &job).unwrap();
        assert_eq!(
            dev.write_job(&tx, &first, 2, &job),
            Err(Error::InvalidArgument(ArgumentError::InvalidBatchSize))
        );
        assert_eq!(dev.submit_jobs(&tx, &mut first, &mut delay), Ok(2));
        assert_eq!(dev.submit_jobs(&tx, &mut second, &mut delay), Ok(3));
        assert_eq!(dev.bus().writes_to(tx_job_queue(2).at(TX_JOB_Q_VALID_WP)), [0, 2, 3]);
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn handles_on_one_phy_share_the_counter() {
        let dev = device();
        let a = dev.reserve_tx_channel(6, TransferType::Mem2Mem, &route()).unwrap();
        let b = dev.reserve_tx_channel(6, TransferType::Mem2Mem, &route()).unwrap();
        let job = TxJob::linear(0x1000, 0x2000, 8);
        let mut delay = MockDelay::new();
        assert_eq!(dev.push_job(&a, &job, &mut delay), Ok(1));
        assert_eq!(dev.push_job(&b, &job, &mut delay), Ok(2));
        assert_eq!(dev.push_job(&a, &job, &mut delay), Ok(3));
        dev.release_channel(a).unwrap();
        dev.release_channel(b).unwrap();
    }

    // =========================================================================
    // Cancel Tests
    // =========================================================================

    #[test]
    fn push_behind_open_ticket_is_bounded() {
        let dev = device();
        let tx = dev.reserve_tx_channel(4, TransferType::Mem2Mem, &route()).unwrap();
        let job = TxJob::linear(0x1000, 0x2000, 8);
        let mut delay = MockDelay::new();

        let mut held = dev.acquire_jobs(&tx, 1, &mut delay).unwrap();
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Err(Error::Busy));
        assert_eq!(delay.total_us(), SUBMIT_TIMEOUT_US as u64);
        // the refused job became a no-op that still reports completion
        assert_eq!(
            word(&dev, 4, 1, 8),
            TxJobDescriptor::config_word(false, tx.program_id(), 0, 4)
        );

        dev.write_job(&tx, &held, 0, &job).unwrap();
        assert_eq!(dev.submit_jobs(&tx, &mut held, &mut delay), Ok(1));
        assert_eq!(dev.bus().writes_to(tx_job_queue(4).at(TX_JOB_Q_VALID_WP)), [0, 1, 2]);
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Ok(3));
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn refused_packet_is_skipped_not_stalled() {
        let dev = device();
        let tx = dev.reserve_tx_channel(3, TransferType::Mem2Eth, &route()).unwrap();
        let mut delay = MockDelay::new();

        let mut held = dev.acquire_jobs(&tx, 1, &mut delay).unwrap();
        assert_eq!(
            dev.submit_packet(&tx, &frags(2), tx.route_id(), &mut delay),
            Err(Error::Busy)
        );
        dev.cancel_jobs(&tx, &mut held).unwrap();
        assert!(held.is_cancelled());
        assert_eq!(dev.bus().writes_to(tx_job_queue(3).at(TX_JOB_Q_VALID_WP)), [0, 1, 3]);
        assert_eq!(dev.submit_packet(&tx, &frags(1), tx.route_id(), &mut delay), Ok(4));
        dev.release_channel(tx).unwrap();
    }

    #[test]
    fn cancel_jobs_releases_the_queue() {
        let dev = device();
        let tx = dev.reserve_tx_channel(2, TransferType::Mem2Noc, &route()).unwrap();
        let job = TxJob::linear(0x1000, 0x40, 16);
        let mut delay = MockDelay::new();

        let mut ticket = dev.acquire_jobs(&tx, 2, &mut delay).unwrap();
        dev.write_job(&tx, &ticket, 0, &job).unwrap();
        dev.cancel_jobs(&tx, &mut ticket).unwrap();
        assert_eq!(dev.bus().writes_to(tx_job_queue(2).at(TX_JOB_Q_VALID_WP)), [0, 2]);
        assert_eq!(word(&dev, 2, 0, 0), 0);
        assert_eq!(
            dev.submit_jobs(&tx, &mut ticket, &mut delay),
            Err(Error::InvalidArgument(ArgumentError::InvalidTransfer))
        );
        assert_eq!(
            dev.write_job(&tx, &ticket, 1, &job),
            Err(Error::InvalidArgument(ArgumentError::InvalidBatchSize))
        );
        // cancelling twice changes nothing
        dev.cancel_jobs(&tx, &mut ticket).unwrap();
        assert_eq!(dev.push_job(&tx, &job, &mut delay), Ok(3));
        assert_eq!(delay.total_us(), 0);
        dev.release_channel(tx).unwrap();
    }

    // =========================================================================
    // Reservation Tests
    // =========================================================================

    #[test]
    fn missing_program_is_refused_before_allocation() {
        let config = DeviceConfig::new().with_vchan(0);
        let dev = DmaDevice::new(MockRegisters::new(), MockDmaAllocator::new(), config).unwrap();
        assert!(matches!(
            dev.reserve_tx_channel(0, TransferType::Mem2Mem, &route()),
            Err(Error::InvalidArgument(ArgumentError::ProgramNotLoaded))
        ));
        assert_eq!(dev.allocator().alloc_count(), 0);
    }

    #[test]
    fn full_route_table_undoes_reservation() {
        let config = DeviceConfig::new()
            .with_vchan(0)
            .with_dma_requests(8)
            .with_noc_route_ids(IdRange::new(0, 1));
        let dev = DmaDevice::new(MockRegisters::new(), MockDmaAllocator::new(), config).unwrap();
        dev.load_default_ucodes(&MockFirmware::with_defaults(1)).unwrap();

        let a = dev.reserve_tx_channel(0, TransferType::Mem2Mem, &route()).unwrap();
        let other = RouteParams {
            noc_route: 0x99,
            ..route()
        };
        assert!(matches!(
            dev.reserve_tx_channel(1, TransferType::Mem2Mem, &other),
            Err(Error::ResourceExhausted(ResourceKind::RouteTable))
        ));
        assert_eq!(dev.phy_refcount(PhyId::tx(1)), 0);
        assert_eq!(dev.allocator().outstanding(), 1);
        dev.release_channel(a).unwrap();
    }

    // =========================================================================
    // Header Queue Tests
    // =========================================================================

    #[test]
    fn header_queue_follows_first_reservation() {
        let dev = device();
        let eth = dev.reserve_tx_channel(3, TransferType::Mem2Eth, &route()).unwrap();
        let base = dev.tx_header_addr(&eth, 0).unwrap();
        assert_eq!(dev.tx_header_addr(&eth, 1), Some(base + 16));
        assert_eq!(dev.tx_header_addr(&eth, dev.queue_capacity()), Some(base));

        dev.write_tx_header(&eth, 1, [0xAA, 0xBB]).unwrap();
        assert_eq!(dev.allocator().read_word(base + 16), 0xAA);
        assert_eq!(dev.allocator().read_word(base + 24), 0xBB);

        let copy = dev.reserve_tx_channel(5, TransferType::Mem2Mem, &route()).unwrap();
        assert_eq!(dev.tx_header_addr(&copy, 0), None);
        assert_eq!(
            dev.write_tx_header(&copy, 0, [0, 0]),
            Err(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))
        );
        dev.release_channel(eth).unwrap();
        dev.release_channel(copy).unwrap();
    }
}
