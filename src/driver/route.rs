//! NoC route table
//!
//! Every TX job names a route table entry describing where its writes go.
//! Entries are deduplicated by exact value: identical routes share one id.
//! The table only grows; there is no deletion path.

use super::config::{IdRange, RouteParams};
use crate::error::{ResourceKind, Result};
use crate::internal::register::RegisterBus;
use crate::internal::register::global::{
    NOC_ROUTE_ASN_SHIFT, NOC_ROUTE_GLOBAL_SHIFT, NOC_ROUTE_MASK, NOC_ROUTE_QOS_ID_SHIFT,
    NOC_ROUTE_RX_TAG_MASK, NOC_ROUTE_RX_TAG_SHIFT, NOC_ROUTE_VALID_SHIFT, NOC_ROUTE_VCHAN_SHIFT,
    route_table_entry,
};
use crate::constants::{ASN_GLOBAL_BIT, ASN_MASK};
use crate::internal::trace::{dma_debug, dma_error};

/// Encode a route table entry
///
/// `asn` carries the global flag in bit 31; only the low 9 bits are the
/// address space number proper.
pub const fn route_value(params: &RouteParams, asn: u32, vchan: u32) -> u64 {
    let global = (asn >> ASN_GLOBAL_BIT) as u64 & 1;
    (params.noc_route & NOC_ROUTE_MASK)
        | ((params.rx_tag as u64 & NOC_ROUTE_RX_TAG_MASK) << NOC_ROUTE_RX_TAG_SHIFT)
        | ((params.qos_id as u64 & 0xF) << NOC_ROUTE_QOS_ID_SHIFT)
        | (global << NOC_ROUTE_GLOBAL_SHIFT)
        | (((asn & ASN_MASK) as u64) << NOC_ROUTE_ASN_SHIFT)
        | ((vchan as u64 & 1) << NOC_ROUTE_VCHAN_SHIFT)
        | (1 << NOC_ROUTE_VALID_SHIFT)
}

/// Find `route` in the table slots of `ids`, or claim the first free one
///
/// Must run under the device allocation lock. A full table leaves every
/// entry untouched.
pub(crate) fn get_or_create_route<B: RegisterBus + ?Sized>(
    bus: &B,
    ids: IdRange,
    route: u64,
) -> Result<u64> {
    for id in ids.start..ids.end() {
        let entry = bus.read(route_table_entry(id));
        if (entry >> NOC_ROUTE_VALID_SHIFT) & 1 == 0 {
            bus.write(route_table_entry(id), route);
            dma_debug!("new route[{}]: {:#x}", id, route);
            return Ok(id as u64);
        }
        if entry == route {
            return Ok(id as u64);
        }
    }
    dma_error!("no NoC route entry left for {:#x}", route);
    Err(ResourceKind::RouteTable.into())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;
    use crate::constants::{DEFAULT_ASN, NOC_ROUTE_TABLE_SIZE};
    use crate::error::Error;
    use crate::test_utils::MockRegisters;

    fn params(noc_route: u64) -> RouteParams {
        RouteParams {
            noc_route,
            rx_tag: 5,
            qos_id: 2,
        }
    }

    // =========================================================================
    // Encoding Tests
    // =========================================================================

    #[test]
    fn route_fields_are_packed() {
        let v = route_value(&params(0x12_3456_789A), DEFAULT_ASN | 3, 1);
        assert_eq!(v & NOC_ROUTE_MASK, 0x12_3456_789A);
        assert_eq!((v >> 40) & 0x3F, 5);
        assert_eq!((v >> 46) & 0xF, 2);
        assert_eq!((v >> 50) & 1, 1);
        assert_eq!((v >> 51) & 0x1FF, 3);
        assert_eq!((v >> 60) & 1, 1);
        assert_eq!((v >> 61) & 1, 1);
    }

    #[test]
    fn oversized_fields_are_masked() {
        let p = RouteParams {
            noc_route: 1 << 45,
            rx_tag: 0xFF,
            qos_id: 0xFF,
        };
        let v = route_value(&p, 0, 0);
        assert_eq!(v & NOC_ROUTE_MASK, 0);
        assert_eq!((v >> 40) & 0x3F, 0x3F);
        assert_eq!((v >> 46) & 0xF, 0xF);
        assert_eq!((v >> 50) & 1, 0);
    }

    // =========================================================================
    // Table Tests
    // =========================================================================

    #[test]
    fn identical_routes_share_an_entry() {
        let regs = MockRegisters::new();
        let ids = IdRange::new(0, NOC_ROUTE_TABLE_SIZE);
        let a = route_value(&params(1), DEFAULT_ASN, 0);
        let b = route_value(&params(2), DEFAULT_ASN, 0);

        assert_eq!(get_or_create_route(&regs, ids, a), Ok(0));
        assert_eq!(get_or_create_route(&regs, ids, b), Ok(1));
        assert_eq!(get_or_create_route(&regs, ids, a), Ok(0));
        assert_eq!(regs.writes().len(), 2);
    }

    #[test]
    fn scan_is_confined_to_range() {
        let regs = MockRegisters::new();
        let ids = IdRange::new(100, 2);
        let r = route_value(&params(7), DEFAULT_ASN, 0);
        assert_eq!(get_or_create_route(&regs, ids, r), Ok(100));
        assert_eq!(regs.get(route_table_entry(100)), r);
    }

    #[test]
    fn full_table_is_exhausted_and_intact() {
        let regs = MockRegisters::new();
        let ids = IdRange::new(0, NOC_ROUTE_TABLE_SIZE);
        for i in 0..NOC_ROUTE_TABLE_SIZE as u64 {
            let r = route_value(&params(i + 1), DEFAULT_ASN, 0);
            assert_eq!(get_or_create_route(&regs, ids, r), Ok(i));
        }
        regs.clear_writes();

        let extra = route_value(&params(0xFFFF), DEFAULT_ASN, 0);
        assert_eq!(
            get_or_create_route(&regs, ids, extra),
            Err(Error::ResourceExhausted(ResourceKind::RouteTable))
        );
        assert!(regs.writes().is_empty());
        for i in 0..NOC_ROUTE_TABLE_SIZE {
            assert_eq!(
                regs.get(route_table_entry(i)),
                route_value(&params(i as u64 + 1), DEFAULT_ASN, 0)
            );
        }
    }
}
