// SPDX-License-Identifier: Apache-2.0

//! Announcement-propagation policy (§4.4): which neighbors receive a
//! re-announced update or withdraw, based on the commercial relationship
//! matrix.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::route::Relationship;

/// The neighbors (excluding `src` itself) that an update or withdraw learned
/// from `src` must be propagated to.
///
/// Routes learned from a customer are announced to everyone; routes learned
/// from a peer or provider are announced only to customers (valley-free
/// export).
pub fn propagate_targets(
    src: Ipv4Addr,
    relationships: &HashMap<Ipv4Addr, Relationship>,
) -> Vec<Ipv4Addr> {
    let src_is_customer = relationships.get(&src) == Some(&Relationship::Customer);
    relationships
        .keys()
        .filter(|&&neighbor| neighbor != src)
        .filter(|&&neighbor| {
            src_is_customer || relationships.get(&neighbor) == Some(&Relationship::Customer)
        })
        .copied()
        .collect()
}
