//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the DMA engine
//! on the host without hardware access.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::RefCell;
use core::ptr::NonNull;
use std::boxed::Box;
use std::collections::HashMap;
use std::string::String;
use std::sync::Mutex;
use std::vec;
use std::vec::Vec;

use crate::driver::FirmwareLoader;
use crate::internal::dma::memory::{DmaAllocator, DmaRegion};
use crate::internal::register::RegisterBus;
use crate::internal::register::{rx, tx};

// =============================================================================
// Mock Register File
// =============================================================================

/// In-process register file standing in for the DMA register window
///
/// Unwritten registers read as zero. A few hardware behaviors are emulated
/// so the engine's setup and hot paths can run unmodified:
///
/// - load-and-increment aliases return the counter and bump it
/// - TX job and completion queues report `Running` after ACTIVATE and
///   `Stopped` after STOP
/// - an RX job queue STOP clears its ACTIVATE register
///
/// # Example
///
/// ```ignore
/// let regs = MockRegisters::new();
/// regs.set(0x8_0030, 5); // TX job queue 0 read pointer
/// assert_eq!(regs.get(0x8_0030), 5);
/// ```
#[derive(Debug, Default)]
pub struct MockRegisters {
    /// Register values: offset -> value
    values: Mutex<HashMap<usize, u64>>,
    /// Record of writes: (offset, value)
    write_log: Mutex<Vec<(usize, u64)>>,
}

/// Block an absolute offset falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    RxChannel,
    RxJobQueue,
    TxJobQueue,
    TxCompletionQueue,
    Other,
}

fn block_of(offset: usize) -> Block {
    match offset {
        o if o < rx::RX_JOB_Q_OFFSET => Block::RxChannel,
        o if o < rx::RX_JOB_Q_OFFSET + 8 * rx::RX_JOB_Q_ELEM_SIZE => Block::RxJobQueue,
        o if (tx::TX_JOB_Q_OFFSET..tx::TX_COMP_Q_OFFSET).contains(&o) => Block::TxJobQueue,
        o if o >= tx::TX_COMP_Q_OFFSET => Block::TxCompletionQueue,
        _ => Block::Other,
    }
}

impl MockRegisters {
    /// Create an empty register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register value without logging a write
    pub fn set(&self, offset: usize, value: u64) {
        self.values.lock().unwrap().insert(offset, value);
    }

    /// Current value of a register
    pub fn get(&self, offset: usize) -> u64 {
        self.values
            .lock()
            .unwrap()
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    /// All writes made so far
    pub fn writes(&self) -> Vec<(usize, u64)> {
        self.write_log.lock().unwrap().clone()
    }

    /// Values written to one register, oldest first
    pub fn writes_to(&self, offset: usize) -> Vec<u64> {
        self.write_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Clear the write log
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Simulate the controller completing `count` jobs of TX queue `hw_id`
    ///
    /// Advances both the job queue read pointer and the completion count.
    pub fn complete_tx(&self, hw_id: usize, count: u64) {
        let jobq = tx::tx_job_queue(hw_id);
        let compq = tx::tx_completion_queue(hw_id);
        let mut values = self.values.lock().unwrap();
        *values.entry(jobq.at(tx::TX_JOB_Q_RP)).or_insert(0) += count;
        *values.entry(compq.at(tx::TX_COMP_Q_WP)).or_insert(0) += count;
    }

    /// Counter register backing a load-and-increment alias
    fn alias_target(offset: usize) -> Option<usize> {
        let base = offset & !0xFFF;
        let reg = offset & 0xFFF;
        let target = match (block_of(offset), reg) {
            (Block::RxChannel, rx::RX_CHAN_COMP_Q_LOAD_INCR_RP) => rx::RX_CHAN_COMP_Q_RP,
            (Block::RxJobQueue, rx::RX_JOB_Q_LOAD_INCR_WP) => rx::RX_JOB_Q_WP,
            (Block::RxJobQueue, rx::RX_JOB_Q_LOAD_INCR_VALID_WP) => rx::RX_JOB_Q_VALID_WP,
            (Block::TxJobQueue, tx::TX_JOB_Q_LOAD_INCR_WP) => tx::TX_JOB_Q_WP,
            (Block::TxCompletionQueue, tx::TX_COMP_Q_LOAD_INCR_RP) => tx::TX_COMP_Q_RP,
            _ => return None,
        };
        Some(base + target)
    }

    /// Side effects of a write on other registers
    fn emulate(values: &mut HashMap<usize, u64>, offset: usize, value: u64) {
        let base = offset & !0xFFF;
        let reg = offset & 0xFFF;
        match (block_of(offset), reg) {
            (Block::TxJobQueue, tx::TX_JOB_Q_ACTIVATE) if value & 1 != 0 => {
                values.insert(base + tx::TX_JOB_Q_STATUS, 1);
            }
            (Block::TxJobQueue, tx::TX_JOB_Q_STOP) if value & 1 != 0 => {
                values.insert(base + tx::TX_JOB_Q_STATUS, 0);
            }
            (Block::TxCompletionQueue, tx::TX_COMP_Q_ACTIVATE) if value & 1 != 0 => {
                values.insert(base + tx::TX_COMP_Q_STATUS, 1);
            }
            (Block::TxCompletionQueue, tx::TX_COMP_Q_STOP) if value & 1 != 0 => {
                values.insert(base + tx::TX_COMP_Q_STATUS, 0);
            }
            (Block::RxJobQueue, rx::RX_JOB_Q_STOP) if value & 1 != 0 => {
                values.insert(base + rx::RX_JOB_Q_ACTIVATE, 0);
            }
            _ => {}
        }
    }
}

impl RegisterBus for MockRegisters {
    fn read(&self, offset: usize) -> u64 {
        self.get(offset)
    }

    fn write(&self, offset: usize, value: u64) {
        let mut values = self.values.lock().unwrap();
        values.insert(offset, value);
        Self::emulate(&mut values, offset, value);
        self.write_log.lock().unwrap().push((offset, value));
    }

    fn load_incr(&self, offset: usize) -> u64 {
        let Some(target) = Self::alias_target(offset) else {
            return self.get(offset);
        };
        let mut values = self.values.lock().unwrap();
        let counter = values.entry(target).or_insert(0);
        let old = *counter;
        *counter += 1;
        old
    }
}

// =============================================================================
// Mock DMA Allocator
// =============================================================================

#[derive(Debug, Default)]
struct AllocState {
    /// Live regions: device address -> length in words
    live: HashMap<u64, usize>,
    allocs: usize,
    frees: usize,
    fail_next: usize,
    fail_countdown: Option<usize>,
}

/// Heap-backed DMA allocator with identity CPU/device mapping
///
/// Each region's device address is its host address, so tests can poke
/// queue memory using the addresses the engine programs into registers.
#[derive(Debug, Default)]
pub struct MockDmaAllocator {
    state: Mutex<AllocState>,
}

impl MockDmaAllocator {
    /// Create an allocator with no outstanding regions
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful allocations
    pub fn alloc_count(&self) -> usize {
        self.state.lock().unwrap().allocs
    }

    /// Number of regions returned
    pub fn free_count(&self) -> usize {
        self.state.lock().unwrap().frees
    }

    /// Number of regions currently allocated
    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Make the next `count` allocations fail
    pub fn fail_next_allocs(&self, count: usize) {
        self.state.lock().unwrap().fail_next = count;
    }

    /// Let `skip` more allocations succeed, then fail one
    pub fn fail_alloc_after(&self, skip: usize) {
        self.state.lock().unwrap().fail_countdown = Some(skip);
    }

    /// Whether `addr` lies inside a live region
    fn is_live(&self, addr: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .live
            .iter()
            .any(|(&start, &words)| addr >= start && addr + 8 <= start + (words * 8) as u64)
    }

    /// Read the word at device address `addr`
    pub fn read_word(&self, addr: u64) -> u64 {
        assert!(self.is_live(addr), "read outside live DMA memory: {addr:#x}");
        // SAFETY: the address lies in a live, aligned heap region.
        unsafe { core::ptr::read_volatile(addr as *const u64) }
    }

    /// Write the word at device address `addr`
    pub fn write_word(&self, addr: u64, value: u64) {
        assert!(self.is_live(addr), "write outside live DMA memory: {addr:#x}");
        // SAFETY: the address lies in a live, aligned heap region.
        unsafe { core::ptr::write_volatile(addr as *mut u64, value) }
    }
}

impl DmaAllocator for MockDmaAllocator {
    fn alloc(&self, size: usize) -> Option<DmaRegion> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return None;
        }
        match state.fail_countdown {
            Some(0) => {
                state.fail_countdown = None;
                return None;
            }
            Some(n) => state.fail_countdown = Some(n - 1),
            None => {}
        }
        let words = size.div_ceil(8).max(1);
        let buf: Box<[u64]> = vec![0u64; words].into_boxed_slice();
        let ptr = Box::into_raw(buf).cast::<u64>();
        let addr = ptr as u64;
        state.live.insert(addr, words);
        state.allocs += 1;
        // SAFETY: the buffer is a leaked, aligned, zeroed heap block of at
        // least `size` bytes, kept alive until `free` or drop.
        Some(unsafe { DmaRegion::from_raw_parts(NonNull::new(ptr.cast::<u8>())?, addr, size) })
    }

    fn free(&self, region: DmaRegion) {
        let mut state = self.state.lock().unwrap();
        let addr = region.dma_addr();
        if let Some(words) = state.live.remove(&addr) {
            state.frees += 1;
            // SAFETY: `addr` came from `Box::into_raw` with this length.
            unsafe {
                drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                    addr as *mut u64,
                    words,
                )));
            }
        }
    }
}

impl Drop for MockDmaAllocator {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        for (addr, words) in state.live.drain() {
            // SAFETY: see `free`.
            unsafe {
                drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                    addr as *mut u64,
                    words,
                )));
            }
        }
    }
}

// =============================================================================
// Mock Firmware
// =============================================================================

/// Named firmware images held in memory
#[derive(Debug, Default)]
pub struct MockFirmware {
    images: HashMap<String, Vec<u8>>,
}

impl MockFirmware {
    /// Create an empty image set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image
    #[must_use]
    pub fn with(mut self, name: &str, image: Vec<u8>) -> Self {
        self.images.insert(String::from(name), image);
        self
    }

    /// Image set holding the three default programs, `words` words each
    pub fn with_defaults(words: usize) -> Self {
        use crate::constants::{MEM2ETH_UCODE_NAME, MEM2MEM_UCODE_NAME, MEM2NOC_UCODE_NAME};
        Self::new()
            .with(MEM2MEM_UCODE_NAME, Self::image(words, 0x10))
            .with(MEM2NOC_UCODE_NAME, Self::image(words, 0x20))
            .with(MEM2ETH_UCODE_NAME, Self::image(words, 0x30))
    }

    /// Image of `words` little-endian words `tag + i`
    pub fn image(words: usize, tag: u64) -> Vec<u8> {
        (0..words as u64)
            .flat_map(|i| (tag + i).to_le_bytes())
            .collect()
    }
}

impl FirmwareLoader for MockFirmware {
    fn load(&self, name: &str) -> Option<&[u8]> {
        self.images.get(name).map(Vec::as_slice)
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay implementation for testing
///
/// Records the total requested delay instead of sleeping, so bounded
/// waits time out instantly.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total nanoseconds delayed
    total_ns: RefCell<u64>,
}

impl MockDelay {
    /// Create a new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        *self.total_ns.borrow()
    }

    /// Get total microseconds that were "delayed"
    pub fn total_us(&self) -> u64 {
        self.total_ns() / 1_000
    }

    /// Reset the delay counter
    pub fn reset(&self) {
        *self.total_ns.borrow_mut() = 0;
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.borrow_mut() += ns as u64;
    }
}

/// Delay that yields the thread, for multi-threaded tests
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldDelay;

impl embedded_hal::delay::DelayNs for YieldDelay {
    fn delay_ns(&mut self, _ns: u32) {
        std::thread::yield_now();
    }
}

// =============================================================================
// Tests for Mock Implementations
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_default_to_zero() {
        let regs = MockRegisters::new();
        assert_eq!(regs.read(0x1234), 0);
        regs.write(0x1234, 7);
        assert_eq!(regs.read(0x1234), 7);
        assert_eq!(regs.writes(), vec![(0x1234, 7)]);
    }

    #[test]
    fn load_incr_alias_bumps_counter() {
        let regs = MockRegisters::new();
        let jobq = tx::tx_job_queue(3);
        assert_eq!(regs.load_incr(jobq.at(tx::TX_JOB_Q_LOAD_INCR_WP)), 0);
        assert_eq!(regs.load_incr(jobq.at(tx::TX_JOB_Q_LOAD_INCR_WP)), 1);
        assert_eq!(regs.get(jobq.at(tx::TX_JOB_Q_WP)), 2);

        let chan = rx::rx_channel(5);
        regs.set(chan.at(rx::RX_CHAN_COMP_Q_RP), 9);
        assert_eq!(regs.load_incr(chan.at(rx::RX_CHAN_COMP_Q_LOAD_INCR_RP)), 9);
        assert_eq!(regs.get(chan.at(rx::RX_CHAN_COMP_Q_RP)), 10);
    }

    #[test]
    fn queue_status_follows_activate_and_stop() {
        let regs = MockRegisters::new();
        let compq = tx::tx_completion_queue(1);
        regs.write(compq.at(tx::TX_COMP_Q_ACTIVATE), 1);
        assert_eq!(regs.get(compq.at(tx::TX_COMP_Q_STATUS)), 1);
        regs.write(compq.at(tx::TX_COMP_Q_STOP), 1);
        assert_eq!(regs.get(compq.at(tx::TX_COMP_Q_STATUS)), 0);

        let rxq = rx::rx_job_queue(2);
        regs.write(rxq.at(rx::RX_JOB_Q_ACTIVATE), 1);
        regs.write(rxq.at(rx::RX_JOB_Q_STOP), 1);
        assert_eq!(regs.get(rxq.at(rx::RX_JOB_Q_ACTIVATE)), 0);
    }

    #[test]
    fn allocator_tracks_regions() {
        let alloc = MockDmaAllocator::new();
        let region = alloc.alloc(32).unwrap();
        assert_eq!(alloc.outstanding(), 1);

        alloc.write_word(region.dma_addr() + 8, 0xAB);
        assert_eq!(alloc.read_word(region.dma_addr() + 8), 0xAB);

        alloc.free(region);
        assert_eq!(alloc.outstanding(), 0);
        assert_eq!(alloc.alloc_count(), 1);
        assert_eq!(alloc.free_count(), 1);
    }

    #[test]
    fn allocator_failure_injection() {
        let alloc = MockDmaAllocator::new();
        alloc.fail_next_allocs(1);
        assert!(alloc.alloc(8).is_none());
        let region = alloc.alloc(8).unwrap();
        alloc.free(region);
    }

    #[test]
    fn firmware_images_are_word_packed() {
        let fw = MockFirmware::new().with("a.bin", MockFirmware::image(2, 0x40));
        let image = fw.load("a.bin").unwrap();
        assert_eq!(image.len(), 16);
        assert_eq!(image[0], 0x40);
        assert_eq!(image[8], 0x41);
        assert!(fw.load("b.bin").is_none());
    }

    #[test]
    fn test_mock_delay() {
        let mut delay = MockDelay::new();

        embedded_hal::delay::DelayNs::delay_ns(&mut delay, 1000);
        embedded_hal::delay::DelayNs::delay_us(&mut delay, 2);

        assert_eq!(delay.total_ns(), 3000);
        assert_eq!(delay.total_us(), 3);

        delay.reset();
        assert_eq!(delay.total_ns(), 0);
    }
}
