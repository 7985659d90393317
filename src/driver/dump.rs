//! Status reports and register dumps
//!
//! Read-only views over the controller, used when an error is latched and
//! by diagnostics. Nothing here writes a register or reads a
//! load-and-increment alias.

use alloc::vec::Vec;

use super::config::Direction;
use super::device::DmaDevice;
use super::phy::PhyId;
use crate::constants::{RX_CACHE_COUNT, TX_THREAD_ID};
use crate::error::Result;
use crate::internal::dma::memory::DmaAllocator;
use crate::internal::dma::pool::QueuePool;
use crate::internal::register::global::{
    ERROR_OFFSET, ERROR_RX_CHAN_STATUS, ERROR_RX_JOB_STATUS, ERROR_TX_COMP_STATUS,
    ERROR_TX_JOB_STATUS, ERROR_TX_THREAD_STATUS,
};
use crate::internal::register::rx::{self, rx_channel, rx_job_queue};
use crate::internal::register::tx::{
    self, TX_MON_OFFSET, TX_MON_OUTSTANDING_FIFO_LEVEL, TX_MON_QUEUES_OUTSTANDING_FIFO_LEVEL,
    TX_MON_THREAD_OUTSTANDING_READ_CNT, TX_MON_THREAD_OUTSTANDING_READ_CNT_ELEM_SIZE,
    TX_MON_VCHAN_OUTSTANDING_READ_CNT, TX_THREAD_ERROR, tx_completion_queue, tx_job_queue,
    tx_thread,
};
use crate::internal::register::{RegisterBus, RegisterWindow};
use crate::internal::trace::dma_error;

/// One register of a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterValue {
    /// Register name
    pub name: &'static str,
    /// Absolute offset in the register window
    pub offset: usize,
    /// Value read
    pub value: u64,
}

/// Error context gathered for one phy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusReport {
    /// RX channels in error (RX phys only)
    pub rx_chan_errors: u64,
    /// RX job queues in error (RX phys only)
    pub rx_job_errors: u64,
    /// TX job queues in error (TX phys only)
    pub tx_job_errors: u64,
    /// TX threads in error (TX phys only)
    pub tx_thread_errors: u64,
    /// TX completion queues in error (TX phys only)
    pub tx_comp_errors: u64,
    /// First TX job queue in error and its STATUS register
    pub tx_job_queue_status: Option<(usize, u64)>,
    /// First TX completion queue in error and its STATUS register
    pub tx_completion_queue_status: Option<(usize, u64)>,
    /// ERROR register of the TX thread serving the job queues
    pub thread_error: u64,
    /// Outstanding reads of that thread
    pub thread_outstanding_reads: u64,
    /// Outstanding reads on the virtual channel
    pub vchan_outstanding_reads: u64,
    /// Outstanding fifo level
    pub outstanding_fifo_level: u64,
    /// Queues outstanding fifo level
    pub queues_outstanding_fifo_level: u64,
}

impl StatusReport {
    /// Whether no error status bit was set
    pub const fn is_clean(&self) -> bool {
        (self.rx_chan_errors
            | self.rx_job_errors
            | self.tx_job_errors
            | self.tx_thread_errors
            | self.tx_comp_errors
            | self.thread_error)
            == 0
    }
}

/// Read and log the error context of `phy`
pub(crate) fn read_status<B: RegisterBus + ?Sized>(bus: &B, phy: PhyId) -> StatusReport {
    let errors = RegisterWindow::new(ERROR_OFFSET);
    let mut report = StatusReport::default();

    match phy.dir {
        Direction::Tx => {
            report.tx_job_errors = errors.read(bus, ERROR_TX_JOB_STATUS);
            if report.tx_job_errors != 0 {
                let idx = report.tx_job_errors.trailing_zeros() as usize;
                let status = tx_job_queue(idx).read(bus, tx::TX_JOB_Q_STATUS);
                dma_error!("TX job queue[{}] status: {:#x}", idx, status);
                report.tx_job_queue_status = Some((idx, status));
            }
            report.tx_thread_errors = errors.read(bus, ERROR_TX_THREAD_STATUS);
            if report.tx_thread_errors != 0 {
                dma_error!("TX thread in error: {:#x}", report.tx_thread_errors);
            }
            report.tx_comp_errors = errors.read(bus, ERROR_TX_COMP_STATUS);
            if report.tx_comp_errors != 0 {
                dma_error!("TX comp in error: {:#x}", report.tx_comp_errors);
                let idx = report.tx_comp_errors.trailing_zeros() as usize;
                let status = tx_completion_queue(idx).read(bus, tx::TX_COMP_Q_STATUS);
                dma_error!("TX comp queue[{}] status: {:#x}", idx, status);
                report.tx_completion_queue_status = Some((idx, status));
            }
        }
        Direction::Rx => {
            report.rx_chan_errors = errors.read(bus, ERROR_RX_CHAN_STATUS);
            if report.rx_chan_errors != 0 {
                dma_error!("RX chan in error: {:#x}", report.rx_chan_errors);
            }
            report.rx_job_errors = errors.read(bus, ERROR_RX_JOB_STATUS);
            if report.rx_job_errors != 0 {
                dma_error!("RX job queue in error: {:#x}", report.rx_job_errors);
            }
        }
    }

    let thread = TX_THREAD_ID as usize;
    report.thread_error = tx_thread(thread).read(bus, TX_THREAD_ERROR);
    if report.thread_error != 0 {
        dma_error!("TX thread[{}] error: {:#x}", thread, report.thread_error);
    }

    let mon = RegisterWindow::new(TX_MON_OFFSET);
    report.thread_outstanding_reads = mon.read(
        bus,
        TX_MON_THREAD_OUTSTANDING_READ_CNT + TX_MON_THREAD_OUTSTANDING_READ_CNT_ELEM_SIZE * thread,
    );
    report.vchan_outstanding_reads = mon.read(bus, TX_MON_VCHAN_OUTSTANDING_READ_CNT);
    report.outstanding_fifo_level = mon.read(bus, TX_MON_OUTSTANDING_FIFO_LEVEL);
    report.queues_outstanding_fifo_level = mon.read(bus, TX_MON_QUEUES_OUTSTANDING_FIFO_LEVEL);
    for (what, value) in [
        ("outstanding read_cnt", report.thread_outstanding_reads),
        ("outstanding vchan read_cnt", report.vchan_outstanding_reads),
        ("outstanding fifo[0] level", report.outstanding_fifo_level),
        ("outstanding fifo level", report.queues_outstanding_fifo_level),
    ] {
        if value != 0 {
            dma_error!("TX thread[{}] {}: {:#x}", thread, what, value);
        }
    }

    report
}

const RX_CHANNEL_REGS: [(&str, usize); 19] = [
    ("BUF_SA", rx::RX_CHAN_BUF_SA),
    ("BUF_SIZE", rx::RX_CHAN_BUF_SIZE),
    ("BUF_EN", rx::RX_CHAN_BUF_EN),
    ("CUR", rx::RX_CHAN_CUR),
    ("JOB_Q_CFG", rx::RX_CHAN_JOB_Q_CFG),
    ("ACTIVATED", rx::RX_CHAN_ACTIVATED),
    ("BYTE_CNT", rx::RX_CHAN_BYTE_CNT),
    ("NOTIF_CNT", rx::RX_CHAN_NOTIF_CNT),
    ("CNT_CLEAR_MODE", rx::RX_CHAN_CNT_CLEAR_MODE),
    ("COMP_Q_CFG", rx::RX_CHAN_COMP_Q_CFG),
    ("COMP_Q_MODE", rx::RX_CHAN_COMP_Q_MODE),
    ("COMP_Q_SA", rx::RX_CHAN_COMP_Q_SA),
    ("COMP_Q_SLOT_NB_LOG2", rx::RX_CHAN_COMP_Q_SLOT_NB_LOG2),
    ("COMP_Q_WP", rx::RX_CHAN_COMP_Q_WP),
    ("COMP_Q_RP", rx::RX_CHAN_COMP_Q_RP),
    ("COMP_Q_VALID_RP", rx::RX_CHAN_COMP_Q_VALID_RP),
    ("COMP_Q_NOTIF_ADDR", rx::RX_CHAN_COMP_Q_NOTIF_ADDR),
    ("COMP_Q_NOTIF_ARG", rx::RX_CHAN_COMP_Q_NOTIF_ARG),
    ("COMP_Q_ASN", rx::RX_CHAN_COMP_Q_ASN),
];

const RX_JOB_QUEUE_REGS: [(&str, usize); 12] = [
    ("JOB_Q_SA", rx::RX_JOB_Q_SA),
    ("JOB_Q_NB_LOG2", rx::RX_JOB_Q_NB_LOG2),
    ("JOB_Q_WP", rx::RX_JOB_Q_WP),
    ("JOB_Q_VALID_WP", rx::RX_JOB_Q_VALID_WP),
    ("JOB_Q_RP", rx::RX_JOB_Q_RP),
    ("JOB_Q_NOTIF_ADDR", rx::RX_JOB_Q_NOTIF_ADDR),
    ("JOB_Q_NOTIF_ARG", rx::RX_JOB_Q_NOTIF_ARG),
    ("JOB_Q_NOTIF_MODE", rx::RX_JOB_Q_NOTIF_MODE),
    ("JOB_Q_ACTIVATE", rx::RX_JOB_Q_ACTIVATE),
    ("JOB_Q_STATUS", rx::RX_JOB_Q_STATUS),
    ("JOB_Q_CACHE_ID", rx::RX_JOB_Q_CACHE_ID),
    ("JOB_Q_ASN", rx::RX_JOB_Q_ASN),
];

const TX_JOB_QUEUE_REGS: [(&str, usize); 11] = [
    ("JOB_Q_SA", tx::TX_JOB_Q_SA),
    ("JOB_Q_NB_LOG2", tx::TX_JOB_Q_NB_LOG2),
    ("JOB_Q_WP", tx::TX_JOB_Q_WP),
    ("JOB_Q_VALID_WP", tx::TX_JOB_Q_VALID_WP),
    ("JOB_Q_RP", tx::TX_JOB_Q_RP),
    ("JOB_Q_NOTIF_ADDR", tx::TX_JOB_Q_NOTIF_ADDR),
    ("JOB_Q_NOTIF_ARG", tx::TX_JOB_Q_NOTIF_ARG),
    ("JOB_Q_ASN", tx::TX_JOB_Q_ASN),
    ("JOB_Q_STATUS", tx::TX_JOB_Q_STATUS),
    ("JOB_Q_ACTIVATE", tx::TX_JOB_Q_ACTIVATE),
    ("JOB_Q_THREAD_ID", tx::TX_JOB_Q_THREAD_ID),
];

const TX_COMP_QUEUE_REGS: [(&str, usize); 13] = [
    ("COMP_Q_MODE", tx::TX_COMP_Q_MODE),
    ("COMP_Q_SA", tx::TX_COMP_Q_SA),
    ("COMP_Q_NB_LOG2", tx::TX_COMP_Q_NB_LOG2),
    ("COMP_Q_GLOBAL", tx::TX_COMP_Q_GLOBAL),
    ("COMP_Q_ASN", tx::TX_COMP_Q_ASN),
    ("COMP_Q_FIELD_EN", tx::TX_COMP_Q_FIELD_EN),
    ("COMP_Q_WP", tx::TX_COMP_Q_WP),
    ("COMP_Q_RP", tx::TX_COMP_Q_RP),
    ("COMP_Q_VALID_RP", tx::TX_COMP_Q_VALID_RP),
    ("COMP_Q_NOTIF_ADDR", tx::TX_COMP_Q_NOTIF_ADDR),
    ("COMP_Q_NOTIF_ARG", tx::TX_COMP_Q_NOTIF_ARG),
    ("COMP_Q_ACTIVATE", tx::TX_COMP_Q_ACTIVATE),
    ("COMP_Q_STATUS", tx::TX_COMP_Q_STATUS),
];

fn snapshot<B: RegisterBus + ?Sized>(
    bus: &B,
    window: RegisterWindow,
    regs: &[(&'static str, usize)],
    out: &mut Vec<RegisterValue>,
) {
    out.extend(regs.iter().map(|&(name, reg)| RegisterValue {
        name,
        offset: window.at(reg),
        value: window.read(bus, reg),
    }));
}

impl<B: RegisterBus, A: DmaAllocator> DmaDevice<B, A> {
    /// Read and log the error context of `phy`
    pub fn read_status(&self, phy: PhyId) -> Result<StatusReport> {
        phy.check()?;
        Ok(read_status(&self.bus, phy))
    }

    /// Snapshot of the queue registers behind `phy`
    ///
    /// TX phys list their job and completion queues. RX phys list their
    /// channel and, when the phy is reserved, the job queue of its cache.
    pub fn dump_queue_registers(&self, phy: PhyId) -> Result<Vec<RegisterValue>> {
        phy.check()?;
        let mut out = Vec::new();
        match phy.dir {
            Direction::Tx => {
                snapshot(&self.bus, tx_job_queue(phy.hw_id), &TX_JOB_QUEUE_REGS, &mut out);
                snapshot(&self.bus, tx_completion_queue(phy.hw_id), &TX_COMP_QUEUE_REGS, &mut out);
            }
            Direction::Rx => {
                snapshot(&self.bus, rx_channel(phy.hw_id), &RX_CHANNEL_REGS, &mut out);
                let cache = self.state.with(|s| {
                    s.phy(phy)
                        .ok()
                        .filter(|p| !p.is_unused() && p.has_job_queue())
                        .map(|p| p.rx_cache_id)
                });
                if let Some(cache) = cache.filter(|&c| c < RX_CACHE_COUNT) {
                    let jobq = rx_job_queue(QueuePool::rx_job_queue_index(cache));
                    snapshot(&self.bus, jobq, &RX_JOB_QUEUE_REGS, &mut out);
                }
            }
        }
        Ok(out)
    }

    /// Take the latched error vector, logging it with the context of `phy`
    pub(super) fn consume_error(&self, phy: PhyId) -> Option<u64> {
        let vector = self.err_vec.swap(0, core::sync::atomic::Ordering::AcqRel);
        if vector == 0 {
            return None;
        }
        dma_error!("phy {:?}: hardware error vector {:#x}", phy, vector);
        read_status(&self.bus, phy);
        Some(vector)
    }
}
