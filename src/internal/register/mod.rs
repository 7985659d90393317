//! Register access for the kvx DMA controller
//!
//! All controller registers are 64 bits wide and addressed by byte offset
//! from the start of the DMA register window. Access goes through the
//! [`RegisterBus`] trait so the engine can run against memory-mapped
//! hardware ([`MmioBus`]) or an in-process register file in tests.
//!
//! Block layouts live in the submodules:
//! - [`rx`]: RX channels and RX job queues
//! - [`tx`]: TX job queues, completion queues, threads, monitor, programs
//! - [`global`]: interrupt vector, error status, NoC route table

pub mod global;
pub mod rx;
pub mod tx;

// =============================================================================
// Register Bus Trait
// =============================================================================

/// 64-bit register access to the DMA register window
///
/// Implementations must be usable from several contexts at once: queue
/// pointers are hardware-maintained counters and the engine relies on the
/// device to serialize concurrent accesses to them.
pub trait RegisterBus {
    /// Read the register at `offset`
    fn read(&self, offset: usize) -> u64;

    /// Write `value` to the register at `offset`
    fn write(&self, offset: usize, value: u64);

    /// Read a load-and-increment alias register
    ///
    /// Returns the value of the underlying counter before the hardware
    /// increments it. On real hardware this is a plain read of the alias.
    fn load_incr(&self, offset: usize) -> u64 {
        self.read(offset)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read(&self, offset: usize) -> u64 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u64) {
        (**self).write(offset, value);
    }

    fn load_incr(&self, offset: usize) -> u64 {
        (**self).load_incr(offset)
    }
}

// =============================================================================
// Memory-Mapped Bus
// =============================================================================

/// Size of the DMA register window in bytes
pub const REGISTER_WINDOW_SIZE: usize = 0x10_0000;

/// Volatile access to a memory-mapped DMA register window
#[derive(Debug)]
pub struct MmioBus {
    base: usize,
}

impl MmioBus {
    /// Create a bus over the register window starting at `base`
    ///
    /// # Safety
    ///
    /// `base` must be the virtual address of the DMA controller register
    /// window, 8-byte aligned, mapped as device memory for
    /// [`REGISTER_WINDOW_SIZE`] bytes, and stay mapped for the lifetime of
    /// the bus.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the register window
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl RegisterBus for MmioBus {
    #[inline(always)]
    fn read(&self, offset: usize) -> u64 {
        debug_assert!(offset < REGISTER_WINDOW_SIZE);
        // SAFETY: `new` guarantees the window is mapped and aligned.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u64) }
    }

    #[inline(always)]
    fn write(&self, offset: usize, value: u64) {
        debug_assert!(offset < REGISTER_WINDOW_SIZE);
        // SAFETY: `new` guarantees the window is mapped and aligned.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u64, value) }
    }
}

// SAFETY: device registers are shared by design; the controller serializes
// concurrent accesses and the bus holds no CPU-side state.
unsafe impl Send for MmioBus {}
// SAFETY: see `Send`.
unsafe impl Sync for MmioBus {}

// =============================================================================
// Register Window
// =============================================================================

/// A block of registers at a fixed offset in the DMA window
///
/// Queue and channel blocks are replicated per id; a window pins one
/// instance so register offsets can be expressed relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterWindow {
    base: usize,
}

impl RegisterWindow {
    /// Window starting at `base`
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    /// Window offset within the DMA register space
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Absolute offset of the register at `offset` within this window
    pub const fn at(&self, offset: usize) -> usize {
        self.base + offset
    }

    /// Read a register of this window
    #[inline]
    pub fn read<B: RegisterBus + ?Sized>(&self, bus: &B, offset: usize) -> u64 {
        bus.read(self.at(offset))
    }

    /// Write a register of this window
    #[inline]
    pub fn write<B: RegisterBus + ?Sized>(&self, bus: &B, offset: usize, value: u64) {
        bus.write(self.at(offset), value);
    }

    /// Read a load-and-increment alias of this window
    #[inline]
    pub fn load_incr<B: RegisterBus + ?Sized>(&self, bus: &B, offset: usize) -> u64 {
        bus.load_incr(self.at(offset))
    }
}

/// Hardware queue run state, as reported by queue STATUS registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QueueStatus {
    /// Queue is stopped and may be reprogrammed
    Stopped = 0,
    /// Queue is processing jobs
    Running = 1,
    /// Queue is draining after a stop request
    SwitchOff = 2,
}

impl QueueStatus {
    /// Decode a raw STATUS value (low two bits)
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match raw & 0x3 {
            0 => Some(Self::Stopped),
            1 => Some(Self::Running),
            2 => Some(Self::SwitchOff),
            _ => None,
        }
    }
}
