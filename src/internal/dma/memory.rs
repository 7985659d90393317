//! DMA-coherent memory
//!
//! Queue backing buffers are provided by the platform through
//! [`DmaAllocator`]. The engine keeps the returned [`DmaRegion`] for the
//! lifetime of the queue and hands it back on release; hot-path code only
//! sees a copyable [`DmaView`] over the same memory.

use core::ptr::NonNull;

// =============================================================================
// Allocator Trait
// =============================================================================

/// Provider of DMA-coherent memory
///
/// Called only from setup and teardown, under the device allocation lock.
pub trait DmaAllocator {
    /// Allocate `size` bytes of zeroed, 8-byte aligned, device-visible memory
    fn alloc(&self, size: usize) -> Option<DmaRegion>;

    /// Return a region previously obtained from [`DmaAllocator::alloc`]
    fn free(&self, region: DmaRegion);
}

impl<A: DmaAllocator + ?Sized> DmaAllocator for &A {
    fn alloc(&self, size: usize) -> Option<DmaRegion> {
        (**self).alloc(size)
    }

    fn free(&self, region: DmaRegion) {
        (**self).free(region);
    }
}

// =============================================================================
// DMA Region
// =============================================================================

/// An owned block of DMA-coherent memory
///
/// Not `Clone`: exactly one owner returns it to the allocator.
#[derive(Debug)]
pub struct DmaRegion {
    cpu: NonNull<u64>,
    dma_addr: u64,
    size: usize,
}

impl DmaRegion {
    /// Wrap memory obtained from a platform allocator
    ///
    /// # Safety
    ///
    /// `cpu` must be 8-byte aligned and valid for reads and writes of `size`
    /// bytes until the region is handed back to its allocator. `dma_addr`
    /// must be the address at which the DMA controller sees the same memory,
    /// and the mapping must be coherent with CPU accesses.
    pub const unsafe fn from_raw_parts(cpu: NonNull<u8>, dma_addr: u64, size: usize) -> Self {
        Self {
            cpu: cpu.cast(),
            dma_addr,
            size,
        }
    }

    /// CPU address of the region
    pub const fn cpu_ptr(&self) -> NonNull<u8> {
        self.cpu.cast()
    }

    /// Device address of the region
    pub const fn dma_addr(&self) -> u64 {
        self.dma_addr
    }

    /// Size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Borrow-free view used by the hot path
    pub(crate) const fn view(&self) -> DmaView {
        DmaView {
            cpu: self.cpu,
            dma_addr: self.dma_addr,
            words: self.size / 8,
        }
    }
}

// SAFETY: the region is a plain handle to device memory; all accesses go
// through volatile operations on disjoint slots owned by the caller.
unsafe impl Send for DmaRegion {}
// SAFETY: see `Send`.
unsafe impl Sync for DmaRegion {}

// =============================================================================
// DMA View
// =============================================================================

/// Copyable word-level view of a [`DmaRegion`]
///
/// A view stays valid while its region is owned by the queue pool or the
/// physical channel that allocated it. Release paths quiesce the hardware
/// and drop every handle holding a view before freeing the region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DmaView {
    cpu: NonNull<u64>,
    dma_addr: u64,
    words: usize,
}

impl DmaView {
    /// Device address of the first word
    pub const fn dma_addr(&self) -> u64 {
        self.dma_addr
    }

    /// Number of 64-bit words
    pub const fn words(&self) -> usize {
        self.words
    }

    /// Volatile read of word `index`
    #[inline(always)]
    pub fn read(&self, index: usize) -> u64 {
        debug_assert!(index < self.words);
        // SAFETY: `index` is in bounds of the region this view was made from.
        unsafe { core::ptr::read_volatile(self.cpu.as_ptr().add(index)) }
    }

    /// Volatile write of word `index`
    #[inline(always)]
    pub fn write(&self, index: usize, value: u64) {
        debug_assert!(index < self.words);
        // SAFETY: `index` is in bounds of the region this view was made from.
        unsafe { core::ptr::write_volatile(self.cpu.as_ptr().add(index), value) }
    }
}

// SAFETY: see `DmaRegion`.
unsafe impl Send for DmaView {}
// SAFETY: see `DmaRegion`.
unsafe impl Sync for DmaView {}
