//! Error types for the kvx DMA engine
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ResourceKind`]: which hardware or software pool ran dry
//! - [`ArgumentError`]: which caller-supplied value was rejected
//!
//! The unified [`Error`] enum wraps both and adds the protocol-level
//! conditions (`Busy`, `AlreadyInUse`) plus latched hardware faults.

// =============================================================================
// Resource Kinds
// =============================================================================

/// Resource pools that can be exhausted
///
/// Returned inside [`Error::ResourceExhausted`] when an allocation cannot
/// be satisfied. The allocation is rolled back before the error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceKind {
    /// No free logical channel slot
    LogicalChannel,
    /// No free physical channel matching the request
    PhysicalChannel,
    /// DMA-coherent memory for a queue could not be allocated
    QueueMemory,
    /// NoC route table is full
    RouteTable,
    /// No free microcode program id
    ProgramId,
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResourceKind {
    /// Returns a human-readable description of the resource
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LogicalChannel => "logical channel",
            ResourceKind::PhysicalChannel => "physical channel",
            ResourceKind::QueueMemory => "queue memory",
            ResourceKind::RouteTable => "NoC route table",
            ResourceKind::ProgramId => "program id",
        }
    }
}

// =============================================================================
// Argument Errors
// =============================================================================

/// Invalid caller-supplied arguments
///
/// These are detected before any hardware or allocation state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArgumentError {
    /// Physical channel id outside the hardware range
    InvalidPhyId,
    /// RX cache id outside the hardware range
    InvalidCacheId,
    /// Logical channel id unknown or not allocated
    InvalidChannelId,
    /// MSI vector index does not map to a physical channel
    InvalidMsiIndex,
    /// Zero or too many fragments in a batch
    InvalidBatchSize,
    /// Zero length, address or stride in a transfer
    InvalidTransfer,
    /// Transfer type not supported for this direction
    UnsupportedTransfer,
    /// Requested direction does not match the channel configuration
    DirectionMismatch,
    /// Channel has no configuration yet
    NotConfigured,
    /// Channel is already initialized and cannot be reconfigured
    AlreadyConfigured,
    /// Firmware blob not found by the loader
    FirmwareNotFound,
    /// Firmware size or load address is not 8-byte aligned, or empty
    MisalignedFirmware,
    /// Firmware does not fit in the remaining program memory
    FirmwareTooLarge,
    /// Program id beyond the hardware program table
    InvalidProgramId,
    /// Required microcode program has not been loaded
    ProgramNotLoaded,
    /// Device configuration failed validation
    InvalidConfig,
    /// Unknown transfer cookie
    InvalidCookie,
}

impl core::fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ArgumentError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArgumentError::InvalidPhyId => "invalid physical channel id",
            ArgumentError::InvalidCacheId => "invalid RX cache id",
            ArgumentError::InvalidChannelId => "invalid logical channel id",
            ArgumentError::InvalidMsiIndex => "invalid MSI index",
            ArgumentError::InvalidBatchSize => "invalid batch size",
            ArgumentError::InvalidTransfer => "invalid transfer parameters",
            ArgumentError::UnsupportedTransfer => "unsupported transfer type",
            ArgumentError::DirectionMismatch => "direction mismatch",
            ArgumentError::NotConfigured => "channel not configured",
            ArgumentError::AlreadyConfigured => "channel already configured",
            ArgumentError::FirmwareNotFound => "firmware not found",
            ArgumentError::MisalignedFirmware => "misaligned firmware",
            ArgumentError::FirmwareTooLarge => "firmware too large for program memory",
            ArgumentError::InvalidProgramId => "invalid program id",
            ArgumentError::ProgramNotLoaded => "program not loaded",
            ArgumentError::InvalidConfig => "invalid configuration",
            ArgumentError::InvalidCookie => "invalid cookie",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all error conditions reported by the engine.
///
/// Match on the variant for specific handling:
/// ```ignore
/// match dev.submit_packet(&tx, &frags, route, &mut delay) {
///     Err(Error::Busy) => { /* retry later */ }
///     Err(Error::InvalidArgument(ArgumentError::InvalidBatchSize)) => { /* ... */ }
///     Err(Error::HardwareFault(vector)) => { /* inspect the decoded vector */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A resource pool is exhausted
    ResourceExhausted(ResourceKind),
    /// Queue full or bounded wait timed out
    Busy,
    /// Invalid argument
    InvalidArgument(ArgumentError),
    /// Resource is reserved by someone else
    AlreadyInUse,
    /// Hardware reported an asynchronous error (raw error vector)
    HardwareFault(u64),
}

impl Error {
    /// Whether the failed operation may succeed if simply retried
    ///
    /// Only `Busy` is retryable. For the ticket protocol the caller retries
    /// the submit step with its ticket, or cancels the ticket.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ResourceExhausted(kind) => write!(f, "exhausted: {}", kind.as_str()),
            Error::Busy => f.write_str("busy"),
            Error::InvalidArgument(e) => write!(f, "invalid argument: {}", e.as_str()),
            Error::AlreadyInUse => f.write_str("already in use"),
            Error::HardwareFault(vector) => write!(f, "hardware fault: {vector:#x}"),
        }
    }
}

// From impls for automatic conversion
impl From<ResourceKind> for Error {
    fn from(kind: ResourceKind) -> Self {
        Error::ResourceExhausted(kind)
    }
}

impl From<ArgumentError> for Error {
    fn from(e: ArgumentError) -> Self {
        Error::InvalidArgument(e)
    }
}

/// Result type alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;
    use std::string::ToString;

    use super::*;

    // =========================================================================
    // ResourceKind Tests
    // =========================================================================

    #[test]
    fn resource_kind_as_str_non_empty() {
        let variants = [
            ResourceKind::LogicalChannel,
            ResourceKind::PhysicalChannel,
            ResourceKind::QueueMemory,
            ResourceKind::RouteTable,
            ResourceKind::ProgramId,
        ];
        for v in variants {
            assert!(!v.as_str().is_empty());
        }
    }

    #[test]
    fn resource_kind_display_matches_as_str() {
        assert_eq!(ResourceKind::RouteTable.to_string(), "NoC route table");
    }

    // =========================================================================
    // ArgumentError Tests
    // =========================================================================

    #[test]
    fn argument_error_as_str_distinct() {
        let variants = [
            ArgumentError::InvalidPhyId,
            ArgumentError::InvalidCacheId,
            ArgumentError::InvalidChannelId,
            ArgumentError::InvalidMsiIndex,
            ArgumentError::InvalidBatchSize,
            ArgumentError::InvalidTransfer,
            ArgumentError::UnsupportedTransfer,
            ArgumentError::DirectionMismatch,
            ArgumentError::NotConfigured,
            ArgumentError::AlreadyConfigured,
            ArgumentError::FirmwareNotFound,
            ArgumentError::MisalignedFirmware,
            ArgumentError::FirmwareTooLarge,
            ArgumentError::InvalidProgramId,
            ArgumentError::ProgramNotLoaded,
            ArgumentError::InvalidConfig,
            ArgumentError::InvalidCookie,
        ];
        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }

    // =========================================================================
    // Unified Error Tests
    // =========================================================================

    #[test]
    fn error_from_conversions() {
        let e: Error = ResourceKind::ProgramId.into();
        assert_eq!(e, Error::ResourceExhausted(ResourceKind::ProgramId));

        let e: Error = ArgumentError::MisalignedFirmware.into();
        assert_eq!(e, Error::InvalidArgument(ArgumentError::MisalignedFirmware));
    }

    #[test]
    fn only_busy_is_retryable() {
        assert!(Error::Busy.is_retryable());
        assert!(!Error::AlreadyInUse.is_retryable());
        assert!(!Error::HardwareFault(1).is_retryable());
        assert!(!Error::ResourceExhausted(ResourceKind::RouteTable).is_retryable());
        assert!(!Error::InvalidArgument(ArgumentError::InvalidPhyId).is_retryable());
    }

    #[test]
    fn error_display_formats() {
        assert_eq!(format!("{}", Error::Busy), "busy");
        assert_eq!(
            format!("{}", Error::ResourceExhausted(ResourceKind::RouteTable)),
            "exhausted: NoC route table"
        );
        assert_eq!(
            format!("{}", Error::InvalidArgument(ArgumentError::InvalidMsiIndex)),
            "invalid argument: invalid MSI index"
        );
        assert_eq!(format!("{}", Error::HardwareFault(0x10)), "hardware fault: 0x10");
    }
}
