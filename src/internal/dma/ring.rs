//! Hardware ring geometry
//!
//! Every hardware queue is a power-of-two array of fixed-size entries in
//! DMA memory. Read and write positions are free-running 64-bit counters
//! kept by the controller; the slot for a counter value is `value & mask`.

use super::memory::DmaView;

/// Largest power-of-two exponent not exceeding `requests`
///
/// Returns `None` for zero.
pub const fn capacity_log2(requests: usize) -> Option<u32> {
    if requests == 0 {
        None
    } else {
        Some(requests.ilog2())
    }
}

/// Circular queue of fixed-size entries over DMA memory
#[derive(Debug, Clone, Copy)]
pub(crate) struct HardwareRing {
    mem: DmaView,
    size_log2: u32,
    entry_words: usize,
}

impl HardwareRing {
    /// Create a ring of `1 << size_log2` entries of `entry_size` bytes
    pub const fn new(mem: DmaView, size_log2: u32, entry_size: usize) -> Self {
        Self {
            mem,
            size_log2,
            entry_words: entry_size / 8,
        }
    }

    /// Number of slots
    #[inline(always)]
    pub const fn capacity(&self) -> u64 {
        1 << self.size_log2
    }

    /// Slot mask
    #[inline(always)]
    pub const fn mask(&self) -> u64 {
        self.capacity() - 1
    }

    /// Device address of the ring
    #[inline(always)]
    pub const fn dma_addr(&self) -> u64 {
        self.mem.dma_addr()
    }

    /// Slot index for a free-running counter value
    #[inline(always)]
    pub const fn slot(&self, counter: u64) -> usize {
        (counter & self.mask()) as usize
    }

    /// Whether `n` more entries fit given the write and read counters
    #[inline(always)]
    pub const fn has_room(&self, write: u64, read: u64, n: u64) -> bool {
        write + n <= read + self.capacity()
    }

    /// Device address of the entry for `counter`
    pub const fn entry_dma_addr(&self, counter: u64) -> u64 {
        self.dma_addr() + (self.slot(counter) * self.entry_words * 8) as u64
    }

    /// Write the leading words of the entry for `counter`
    pub fn write_entry(&self, counter: u64, words: &[u64]) {
        let first = self.slot(counter) * self.entry_words;
        for (i, &word) in words.iter().take(self.entry_words).enumerate() {
            self.mem.write(first + i, word);
        }
    }

    /// Read the leading `N` words of the entry for `counter`
    pub fn read_entry<const N: usize>(&self, counter: u64) -> [u64; N] {
        let first = self.slot(counter) * self.entry_words;
        let mut out = [0u64; N];
        for (i, word) in out.iter_mut().enumerate().take(self.entry_words) {
            *word = self.mem.read(first + i);
        }
        out
    }
}

// =============================================================================
// Tests
// =============================================================================
