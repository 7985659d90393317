//! TX microcode loader
//!
//! TX jobs are executed by small programs held in the controller's program
//! memory. Loading a program copies its image at the current program
//! memory offset, then publishes a program table entry pointing at it.
//! Program ids come from the configured [`IdRange`]; the offset only grows.

use super::config::{DeviceConfig, IdRange, TransferMode, TransferType};
use crate::constants::{
    ASN_MASK, MEM2ETH_UCODE_NAME, MEM2MEM_UCODE_NAME, MEM2NOC_UCODE_NAME, PROGRAM_TABLE_SIZE,
};
use crate::error::{ArgumentError, Error, ResourceKind, Result};
use crate::internal::register::RegisterBus;
use crate::internal::register::tx::{
    PGRM_TAB_ASN_SHIFT, PGRM_TAB_GLOBAL_SHIFT, PGRM_TAB_MODE_SHIFT, PGRM_TAB_PM_START_MASK,
    PGRM_TAB_VALID_SHIFT, TX_PGRM_MEM_OFFSET, program_table_entry, to_program_word,
};
use crate::internal::trace::{dma_debug, dma_error, dma_warn};

/// Source of firmware images, looked up by file name
///
/// Images are raw little-endian 64-bit words.
pub trait FirmwareLoader {
    /// Image of the program called `name`, if available
    fn load(&self, name: &str) -> Option<&[u8]>;
}

/// Programs loaded by [`DmaDevice::load_default_ucodes`](super::DmaDevice::load_default_ucodes)
pub(crate) const DEFAULT_PROGRAMS: [(TransferType, &str, TransferMode); 3] = [
    (TransferType::Mem2Mem, MEM2MEM_UCODE_NAME, TransferMode::Axi),
    (TransferType::Mem2Noc, MEM2NOC_UCODE_NAME, TransferMode::Noc),
    (TransferType::Mem2Eth, MEM2ETH_UCODE_NAME, TransferMode::Noc),
];

// =============================================================================
// Loader State
// =============================================================================

/// Program id pool and program memory cursor
#[derive(Debug)]
pub(crate) struct UcodeState {
    /// Bit `n` set when id `ids.start + n` is taken
    used: u64,
    /// Next free byte in program memory
    next_addr: usize,
    /// Default program per transfer type
    programs: [Option<u8>; 3],
}

impl UcodeState {
    pub const fn new(start: usize) -> Self {
        Self {
            used: 0,
            next_addr: start,
            programs: [None; 3],
        }
    }

    pub const fn next_addr(&self) -> usize {
        self.next_addr
    }

    pub const fn program(&self, transfer: TransferType) -> Option<u8> {
        self.programs[transfer.index()]
    }

    pub fn set_program(&mut self, transfer: TransferType, id: u8) {
        self.programs[transfer.index()] = Some(id);
    }

    fn alloc_id(&mut self, ids: IdRange) -> Option<usize> {
        let free = (0..ids.nb.min(64)).find(|bit| self.used & (1 << bit) == 0)?;
        self.used |= 1 << free;
        Some(ids.start + free)
    }

    fn free_id(&mut self, ids: IdRange, id: usize) {
        if ids.contains(id) {
            self.used &= !(1 << (id - ids.start));
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load firmware `name` and publish it under a fresh program id
///
/// Must run under the device allocation lock. Any failure after the id was
/// taken gives it back.
pub(crate) fn load_program<B, L>(
    bus: &B,
    config: &DeviceConfig,
    ucode: &mut UcodeState,
    loader: &L,
    name: &str,
    mode: TransferMode,
) -> Result<u8>
where
    B: RegisterBus + ?Sized,
    L: FirmwareLoader + ?Sized,
{
    if ucode.next_addr % 8 != 0 {
        dma_error!("program memory offset {:#x} is not aligned", ucode.next_addr);
        return Err(ArgumentError::MisalignedFirmware.into());
    }
    let Some(id) = ucode.alloc_id(config.ucode_ids) else {
        dma_error!("no program id left for {}", name);
        return Err(ResourceKind::ProgramId.into());
    };

    let result = write_program(bus, config, ucode, loader, name, mode, id);
    if result.is_err() {
        ucode.free_id(config.ucode_ids, id);
    }
    result
}

fn write_program<B, L>(
    bus: &B,
    config: &DeviceConfig,
    ucode: &mut UcodeState,
    loader: &L,
    name: &str,
    mode: TransferMode,
    id: usize,
) -> Result<u8>
where
    B: RegisterBus + ?Sized,
    L: FirmwareLoader + ?Sized,
{
    let Some(image) = loader.load(name) else {
        dma_error!("failed to fetch firmware {}", name);
        return Err(ArgumentError::FirmwareNotFound.into());
    };
    if id >= PROGRAM_TABLE_SIZE {
        dma_error!("program id {} beyond program table", id);
        return Err(ArgumentError::InvalidProgramId.into());
    }
    if image.is_empty() || image.len() % 8 != 0 {
        dma_error!("firmware {} size {} is not word aligned", name, image.len());
        return Err(ArgumentError::MisalignedFirmware.into());
    }
    if (ucode.next_addr + image.len()) / 8 > config.program_memory.size {
        dma_error!(
            "firmware {} ({} bytes) does not fit at {:#x}",
            name,
            image.len(),
            ucode.next_addr
        );
        return Err(ArgumentError::FirmwareTooLarge.into());
    }

    let entry = program_table_entry(id);
    if (bus.read(entry) >> PGRM_TAB_VALID_SHIFT) & 1 != 0 {
        if !config.ucode_reload {
            dma_error!("program id {} already holds a valid program", id);
            return Err(Error::AlreadyInUse);
        }
        dma_warn!("overriding valid program table entry {}", id);
    }

    for (i, chunk) in image.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        bus.write(
            TX_PGRM_MEM_OFFSET + ucode.next_addr + i * 8,
            u64::from_le_bytes(word),
        );
    }

    let value = (to_program_word(ucode.next_addr) & PGRM_TAB_PM_START_MASK)
        | ((mode as u64) << PGRM_TAB_MODE_SHIFT)
        | (1 << PGRM_TAB_GLOBAL_SHIFT)
        | (((config.asn & ASN_MASK) as u64) << PGRM_TAB_ASN_SHIFT)
        | (1 << PGRM_TAB_VALID_SHIFT);
    bus.write(entry, value);
    dma_debug!(
        "loaded {} as program {} at {:#x}: {:#x}",
        name,
        id,
        ucode.next_addr,
        value
    );

    ucode.next_addr += image.len();
    Ok(id as u8)
}

// =============================================================================
// Tests
// =============================================================================
