// SPDX-License-Identifier: Apache-2.0

//! IPv4 address and netmask primitives: dotted-quad/prefix-length
//! interconversion and longest-prefix matching helpers, built on
//! [`ipnet::Ipv4Net`] — the teacher's own ambient dependency for
//! interconvertible dotted-netmask/prefix-length representations (see
//! DESIGN.md). Only `sibling_bit`, the aggregation-specific bit query
//! `ipnet` has no equivalent for, touches a prefix's bits directly.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::RouterError;

/// Returns the prefix length (0..=32) encoded by `netmask`.
///
/// A netmask is valid iff its binary form is a contiguous run of 1-bits
/// followed by 0-bits; `Ipv4Net::with_netmask` is `ipnet`'s own contiguity
/// check, paired here with the unspecified address since only the
/// resulting prefix length is wanted.
pub fn prefix_length(netmask: Ipv4Addr) -> Result<u8, RouterError> {
    Ipv4Net::with_netmask(Ipv4Addr::UNSPECIFIED, netmask)
        .map(|net| net.prefix_len())
        .map_err(|_| RouterError::MalformedNetmask(netmask))
}

/// The netmask that encodes the given prefix length.
pub fn netmask_of(length: u8) -> Ipv4Addr {
    assert!(length <= 32, "prefix length out of range: {length}");
    Ipv4Net::new(Ipv4Addr::UNSPECIFIED, length)
        .expect("length already validated <= 32")
        .netmask()
}

/// True iff the leading `prefix_length(netmask)` bits of `addr` and `network`
/// agree. A non-contiguous `netmask` can never match (§7: such a route
/// should have been rejected at ingest, not reached here).
pub fn matches(addr: Ipv4Addr, network: Ipv4Addr, netmask: Ipv4Addr) -> bool {
    let Ok(length) = prefix_length(netmask) else {
        return false;
    };
    Ipv4Net::new(network, length)
        .map(|net| net.contains(&addr))
        .unwrap_or(false)
}

/// The value of the bit at 0-indexed position `length - 1` of `network`
/// (counting from the most significant bit). This is the bit that
/// distinguishes the two halves of an `(length - 1)`-length block.
pub fn sibling_bit(network: Ipv4Addr, length: u8) -> bool {
    assert!(length >= 1 && length <= 32, "length out of range: {length}");
    let shift = 32 - length;
    (u32::from(network) >> shift) & 1 == 1
}
