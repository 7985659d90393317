//! Logical channels
//!
//! A DMA-engine style front end on top of the physical channels. A logical
//! channel is requested from the device, optionally configured, then fed
//! descriptors with `prep_*`. Descriptors stay queued until
//! [`DmaDevice::issue_pending`] hands them to the hardware; the completion
//! worker retires them and calls the channel callback.
//!
//! The first `prep_*` binds the channel to a phy: TX channels take a
//! reference on TX queue pair `rx_tag`, RX channels reserve RX channel
//! `rx_tag` in fifo mode. The binding lasts until [`DmaDevice::free_channel`].
//!
//! # Example
//!
//! ```ignore
//! let id = dev.request_channel()?;
//! dev.set_channel_callback(id, Some(on_done))?;
//! let cookie = dev.prep_memcpy(id, dst, src, 4096)?;
//! dev.issue_pending(id, &mut delay)?;
//! // later, from the interrupt path
//! if dev.handle_phy_irq(vector)?.needs_worker() {
//!     dev.run_completion_task();
//! }
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::config::{ChannelConfig, Direction, Fragment, TransferType};
use super::device::{DeviceState, DmaDevice};
use super::phy::PhyId;
use super::tx::TxPath;
use crate::constants::MAX_FRAGMENTS;
use crate::error::{ArgumentError, Error, ResourceKind, Result};
use crate::internal::dma::descriptor::TxJob;
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::register::RegisterBus;
use crate::internal::register::rx::{RX_CHAN_COMP_Q_WP, rx_channel};
use crate::internal::register::tx::TX_COMP_Q_WP;
use crate::internal::trace::{dma_debug, dma_error, dma_warn};

/// Completion callback of a logical channel
pub type ChannelCallback = fn(ChannelId, Cookie);

// =============================================================================
// Identifiers
// =============================================================================

/// Logical channel slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub(crate) usize);

impl ChannelId {
    /// Slot index
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Identifies one prepared descriptor of a channel; never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cookie(u32);

impl Cookie {
    /// Raw value
    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// State of a descriptor as reported by [`DmaDevice::tx_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Retired by the completion worker
    Complete,
    /// Queued or running; `residue` bytes are left
    InProgress {
        /// Bytes of the descriptor not yet transferred
        residue: u64,
    },
    /// The controller reported an error while the descriptor was pending
    Error,
}

// =============================================================================
// Channel State
// =============================================================================

#[derive(Debug)]
struct Descriptor {
    cookie: Cookie,
    jobs: Vec<TxJob>,
    size: u64,
    /// Jobs already pushed (mem2mem / mem2noc)
    pushed: usize,
    last_job_id: u64,
    err: Option<u64>,
}

/// Phy a channel is bound to
#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding {
    pub phy: PhyId,
    pub route_id: u64,
    /// TX submit path; `None` for RX fifo channels
    pub path: Option<TxPath>,
}

#[derive(Debug)]
pub(crate) struct LogicalChannel {
    config: Option<ChannelConfig>,
    callback: Option<ChannelCallback>,
    binding: Option<Binding>,
    next_cookie: u32,
    queued: VecDeque<Descriptor>,
    running: VecDeque<Descriptor>,
    /// Set while `issue_pending` works outside the lock
    issuing: bool,
}

impl LogicalChannel {
    fn new() -> Self {
        Self {
            config: None,
            callback: None,
            binding: None,
            next_cookie: 1,
            queued: VecDeque::new(),
            running: VecDeque::new(),
            issuing: false,
        }
    }

    fn push(&mut self, jobs: Vec<TxJob>, size: u64) -> Cookie {
        let cookie = Cookie(self.next_cookie);
        self.next_cookie += 1;
        self.queued.push_back(Descriptor {
            cookie,
            jobs,
            size,
            pushed: 0,
            last_job_id: 0,
            err: None,
        });
        cookie
    }

    fn find_mut(&mut self, cookie: Cookie) -> Option<&mut Descriptor> {
        self.queued
            .iter_mut()
            .chain(self.running.iter_mut())
            .find(|d| d.cookie == cookie)
    }

    /// Whether the completion worker still has something to look at
    fn is_active(&self) -> bool {
        self.issuing || !self.running.is_empty()
    }

    /// Pop running descriptors whose last job is counted
    pub(crate) fn retire(&mut self, count: u64, id: ChannelId, done: &mut Vec<Completed>) {
        while self.running.front().is_some_and(|d| d.last_job_id <= count) {
            if let Some(desc) = self.running.pop_front() {
                dma_debug!("chan {} cookie {} complete", id.0, desc.cookie.0);
                done.push(Completed {
                    callback: self.callback,
                    id,
                    cookie: desc.cookie,
                });
            }
        }
    }

    pub(crate) const fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub(crate) fn is_idle(&self) -> bool {
        !self.is_active()
    }
}

/// Retired descriptor waiting for its callback
#[derive(Debug, Clone, Copy)]
pub(crate) struct Completed {
    pub callback: Option<ChannelCallback>,
    pub id: ChannelId,
    pub cookie: Cookie,
}

/// Work copied out of a queued descriptor for `issue_pending`
struct Issue {
    jobs: Vec<TxJob>,
    pushed: usize,
    started: Option<u64>,
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    // =========================================================================
    // Channel Slots
    // =========================================================================

    /// Take the first free logical channel
    pub fn request_channel(&self) -> Result<ChannelId> {
        self.state.with(|s| {
            let (index, slot) = s
                .channels
                .iter_mut()
                .enumerate()
                .find(|(_, slot)| slot.is_none())
                .ok_or(Error::ResourceExhausted(ResourceKind::LogicalChannel))?;
            *slot = Some(LogicalChannel::new());
            dma_debug!("logical channel {} allocated", index);
            Ok(ChannelId(index))
        })
    }

    /// Set the configuration used when the channel binds
    ///
    /// Refused once the channel is bound to a phy.
    pub fn configure_channel(&self, id: ChannelId, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        self.state.with(|s| {
            let chan = s.channel_mut(id)?;
            if chan.binding.is_some() {
                dma_error!("chan {}: attempt to reset configuration", id.0);
                return Err(ArgumentError::AlreadyConfigured.into());
            }
            chan.config = Some(config);
            Ok(())
        })
    }

    /// Set or clear the completion callback of `id`
    pub fn set_channel_callback(&self, id: ChannelId, callback: Option<ChannelCallback>) -> Result<()> {
        self.state.with(|s| {
            s.channel_mut(id)?.callback = callback;
            Ok(())
        })
    }

    /// Unbind `id`, release its phy and free the slot
    ///
    /// Descriptors still queued or running are dropped. The channel never
    /// holds job slots between calls, so nothing is left to unwind on the
    /// queue.
    pub fn free_channel(&self, id: ChannelId) -> Result<()> {
        self.state.with(|s| {
            let chan = s.channel(id)?;
            if chan.issuing {
                return Err(Error::Busy);
            }
            if !chan.running.is_empty() {
                dma_warn!("freeing chan {} with pending descriptors", id.0);
            }
            let binding = chan.binding;

            s.pending_channels.retain(|c| *c != id);
            if let Some(binding) = binding {
                s.phy_mut(binding.phy)?.bound.retain(|c| *c != id);
                self.release_phy(s, binding.phy)?;
            }
            if let Some(slot) = s.channels.get_mut(id.0) {
                *slot = None;
            }
            Ok(())
        })
    }

    // =========================================================================
    // Binding
    // =========================================================================

    fn bind(&self, s: &mut DeviceState, id: ChannelId, config: &ChannelConfig) -> Result<Binding> {
        let hw_id = config.rx_tag as usize;
        let binding = match config.direction {
            Direction::Tx => {
                let (path, route_id) = self.bind_tx(s, hw_id, config.transfer, &config.route())?;
                Binding {
                    phy: PhyId::tx(hw_id),
                    route_id,
                    path: Some(path),
                }
            }
            Direction::Rx => {
                if config.transfer != TransferType::Mem2Noc {
                    dma_error!("RX {:?} not supported on logical channels", config.transfer);
                    return Err(ArgumentError::UnsupportedTransfer.into());
                }
                let phy = PhyId::rx(hw_id);
                phy.check()?;
                self.acquire_rx_phy(s, hw_id, config.rx_cache_id, config.transfer, None)?;
                Binding {
                    phy,
                    route_id: 0,
                    path: None,
                }
            }
        };
        s.phy_mut(binding.phy)?.bound.push(id);
        Ok(binding)
    }

    /// Binding of `id`, created from `config` on first use
    fn ensure_bound(&self, s: &mut DeviceState, id: ChannelId, config: ChannelConfig) -> Result<Binding> {
        if let Some(binding) = s.channel(id)?.binding {
            return Ok(binding);
        }
        let binding = self.bind(s, id, &config)?;
        let chan = s.channel_mut(id)?;
        chan.config = Some(config);
        chan.binding = Some(binding);
        Ok(binding)
    }

    // =========================================================================
    // Descriptor Preparation
    // =========================================================================

    /// Queue a copy of `len` bytes from `src` to `dst`
    ///
    /// An unbound channel becomes a TX mem2mem channel on queue pair
    /// `rx_tag` with a local route.
    pub fn prep_memcpy(&self, id: ChannelId, dst: u64, src: u64, len: u64) -> Result<Cookie> {
        if src == 0 || dst == 0 {
            dma_error!("memcpy requires both src and dst");
            return Err(ArgumentError::InvalidTransfer.into());
        }
        if len == 0 {
            dma_error!("memcpy length must be > 0");
            return Err(ArgumentError::InvalidTransfer.into());
        }

        self.state.with(|s| {
            let base = s.channel(id)?.config.unwrap_or_default();
            let config = base
                .with_direction(Direction::Tx)
                .with_transfer(TransferType::Mem2Mem)
                .with_noc_route(0)
                .with_qos_id(0);
            let binding = self.ensure_bound(s, id, config)?;
            let path = binding
                .path
                .filter(|p| p.transfer == TransferType::Mem2Mem)
                .ok_or(Error::InvalidArgument(ArgumentError::UnsupportedTransfer))?;

            let job = TxJob {
                comp_q_id: path.hw_id as u64,
                route_id: binding.route_id,
                fence_after: true,
                ..TxJob::linear(src, dst, len)
            };
            let mut jobs = Vec::with_capacity(1);
            jobs.push(job);
            Ok(s.channel_mut(id)?.push(jobs, len))
        })
    }

    /// Queue a scatter list on a configured channel
    ///
    /// TX channels get one job per fragment. RX channels only support
    /// mem2noc with a single fragment, which becomes the channel's static
    /// receive buffer.
    pub fn prep_slave_sg(
        &self,
        id: ChannelId,
        fragments: &[Fragment],
        direction: Direction,
    ) -> Result<Cookie> {
        if fragments.is_empty() || fragments.len() > MAX_FRAGMENTS {
            dma_error!("{} fragments requested (limit {})", fragments.len(), MAX_FRAGMENTS);
            return Err(ArgumentError::InvalidBatchSize.into());
        }
        if fragments.iter().any(|f| f.addr == 0 || f.len == 0) {
            return Err(ArgumentError::InvalidTransfer.into());
        }

        self.state.with(|s| {
            let config = s
                .channel(id)?
                .config
                .ok_or(Error::InvalidArgument(ArgumentError::NotConfigured))?;
            if config.direction != direction {
                dma_error!("chan {}: {:?} prep on {:?} channel", id.0, direction, config.direction);
                return Err(ArgumentError::DirectionMismatch.into());
            }
            if direction == Direction::Rx {
                if config.transfer != TransferType::Mem2Noc {
                    dma_error!("RX {:?} not supported on logical channels", config.transfer);
                    return Err(ArgumentError::UnsupportedTransfer.into());
                }
                if fragments.len() > 1 {
                    return Err(ArgumentError::InvalidBatchSize.into());
                }
            }

            let binding = self.ensure_bound(s, id, config)?;
            let size = fragments.iter().map(|f| f.len).sum();
            let Some(path) = binding.path else {
                let frag = &fragments[0];
                s.phy(binding.phy)?.attach_rx_buffer(&self.bus, frag.addr, frag.len);
                return Ok(s.channel_mut(id)?.push(Vec::new(), size));
            };

            let last = fragments.len() - 1;
            let jobs = fragments
                .iter()
                .enumerate()
                .map(|(i, f)| TxJob {
                    comp_q_id: path.hw_id as u64,
                    route_id: binding.route_id,
                    eot: path.transfer == TransferType::Mem2Eth && i == last,
                    ..TxJob::linear(f.addr, 0, f.len)
                })
                .collect();
            Ok(s.channel_mut(id)?.push(jobs, size))
        })
    }

    // =========================================================================
    // Issue
    // =========================================================================

    /// Hand queued descriptors of `id` to the hardware, in order
    ///
    /// Stops at the first descriptor the hardware refuses; it and the
    /// ones after it stay queued for the next call. Returns the number of
    /// descriptors started, or the error when none could be.
    pub fn issue_pending<D: DelayNs>(&self, id: ChannelId, delay: &mut D) -> Result<usize> {
        let (binding, mut work) = self.state.with(|s| {
            let chan = s.channel_mut(id)?;
            if chan.issuing {
                return Err(Error::Busy);
            }
            let binding = chan
                .binding
                .ok_or(Error::InvalidArgument(ArgumentError::NotConfigured))?;
            let work: Vec<Issue> = chan
                .queued
                .iter_mut()
                .map(|d| Issue {
                    jobs: d.jobs.clone(),
                    pushed: d.pushed,
                    started: None,
                })
                .collect();
            if !work.is_empty() {
                chan.issuing = true;
                if !s.pending_channels.contains(&id) {
                    s.pending_channels.push(id);
                }
            }
            Ok((binding, work))
        })?;
        if work.is_empty() {
            return Ok(0);
        }

        let mut failure = None;
        for issue in work.iter_mut() {
            match self.start(&binding, issue, delay) {
                Ok(last_job_id) => issue.started = Some(last_job_id),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let started = self.state.with(|s| {
            let chan = s.channel_mut(id)?;
            let mut still_queued = VecDeque::new();
            let mut started = 0;
            for issue in work {
                let Some(mut desc) = chan.queued.pop_front() else {
                    break;
                };
                desc.pushed = issue.pushed;
                match issue.started {
                    Some(last_job_id) => {
                        desc.last_job_id = last_job_id;
                        chan.running.push_back(desc);
                        started += 1;
                    }
                    None => still_queued.push_back(desc),
                }
            }
            still_queued.append(&mut chan.queued);
            chan.queued = still_queued;
            chan.issuing = false;
            Ok::<_, Error>(started)
        })?;

        match failure {
            Some(e) if started == 0 => Err(e),
            Some(e) => {
                dma_warn!("chan {}: issue stopped: {:?}", id.0, e);
                Ok(started)
            }
            None => Ok(started),
        }
    }

    /// Start one descriptor; returns the job id that completes it
    fn start<D: DelayNs>(&self, binding: &Binding, issue: &mut Issue, delay: &mut D) -> Result<u64> {
        let Some(path) = binding.path else {
            let count = rx_channel(binding.phy.hw_id).read(&self.bus, RX_CHAN_COMP_Q_WP);
            return Ok(count + 1);
        };

        // a packet goes out whole or not at all
        if path.transfer == TransferType::Mem2Eth {
            return self.post_on(&path, &issue.jobs, delay);
        }

        let mut last_job_id = 0;
        while let Some(job) = issue.jobs.get(issue.pushed) {
            last_job_id = self.push_on(&path, job, delay)?;
            issue.pushed += 1;
        }
        Ok(last_job_id)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// State of descriptor `cookie` of channel `id`
    ///
    /// A latched hardware error is charged to the first pending descriptor
    /// polled after it was raised; the latch is cleared and the queue
    /// status logged.
    pub fn tx_status(&self, id: ChannelId, cookie: Cookie) -> Result<TransferStatus> {
        self.state.with(|s| {
            let chan = s.channel_mut(id)?;
            if cookie.0 == 0 || cookie.0 >= chan.next_cookie {
                return Err(ArgumentError::InvalidCookie.into());
            }
            let binding = chan.binding;
            let Some(desc) = chan.find_mut(cookie) else {
                return Ok(TransferStatus::Complete);
            };
            if desc.err.is_some() {
                return Ok(TransferStatus::Error);
            }

            if let Some(binding) = binding {
                if self.latched_error() != 0 {
                    let count = self.completion_count(&binding);
                    dma_error!(
                        "phy {:?} completion count {} size {}",
                        binding.phy,
                        count,
                        desc.size
                    );
                    if let Some(vector) = self.consume_error(binding.phy) {
                        desc.err = Some(vector);
                        return Ok(TransferStatus::Error);
                    }
                }
            }
            Ok(TransferStatus::InProgress { residue: desc.size })
        })
    }

    /// Completion counter of the phy behind `binding`
    pub(super) fn completion_count(&self, binding: &Binding) -> u64 {
        match binding.path {
            Some(path) => path.compq.read(&self.bus, TX_COMP_Q_WP),
            None => rx_channel(binding.phy.hw_id).read(&self.bus, RX_CHAN_COMP_Q_WP),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
