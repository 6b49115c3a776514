// SPDX-License-Identifier: Apache-2.0

//! The forwarding table: the set of currently-known top-level routes, kept
//! maximally aggregated by the fixpoint coalescing discipline of §4.2, and
//! disaggregated exactly in reverse on a matching withdraw.

use std::net::Ipv4Addr;

use itertools::Itertools;

use crate::ip;
use crate::route::RouteRecord;

/// The router's forwarding table.
///
/// Only top-level routes live in `routes`; a record that has been folded
/// into an aggregate is reachable solely through its parent's `child0`/
/// `child1`, never directly in this vector.
#[derive(Debug, Default)]
pub struct Table {
    routes: Vec<RouteRecord>,
}

impl Table {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// All top-level routes, in no particular order.
    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// A `dump`-ready snapshot: every top-level route with its children
    /// stripped (§4.5).
    pub fn dump(&self) -> Vec<RouteRecord> {
        self.routes.iter().map(RouteRecord::without_children).collect()
    }

    /// Insert a freshly-learned leaf and run coalescing to fixpoint.
    pub fn insert(&mut self, route: RouteRecord) {
        self.routes.push(route);
        self.coalesce();
    }

    /// Repeatedly merge any mergeable pair of top-level routes until none
    /// remain (T2). Each round scans for one mergeable pair, merges it, and
    /// restarts; this is quadratic but the table sizes this router deals
    /// with are small.
    fn coalesce(&mut self) {
        loop {
            let Some((i, j)) = self.find_mergeable_pair() else {
                break;
            };
            // Remove the higher index first so the lower index stays valid.
            let (hi, lo) = (i.max(j), i.min(j));
            let r1 = self.routes.remove(hi);
            let r2 = self.routes.remove(lo);
            self.routes.push(aggregate(r1, r2));
        }
    }

    fn find_mergeable_pair(&self) -> Option<(usize, usize)> {
        self.routes
            .iter()
            .enumerate()
            .tuple_combinations()
            .find(|((_, r1), (_, r2))| mergeable(r1, r2))
            .map(|((i, _), (j, _))| (i, j))
    }

    /// Apply a single withdraw descriptor: remove the matching leaf,
    /// disaggregating ancestors as needed to re-expose its siblings (§4.2).
    /// Returns `true` iff a matching leaf was found and removed.
    pub fn withdraw(&mut self, network: Ipv4Addr, netmask: Ipv4Addr, peer: Ipv4Addr) -> bool {
        for idx in 0..self.routes.len() {
            match find_and_remove(self.routes[idx].clone(), network, netmask, peer) {
                Removal::Matched(resurfaced) => {
                    self.routes.remove(idx);
                    self.routes.extend(resurfaced);
                    return true;
                }
                Removal::NotMatched => continue,
            }
        }
        false
    }
}

/// Two top-level records are mergeable iff their netmasks, and every
/// non-prefix attribute, are equal, and their networks are the two halves
/// of a single `(L-1)`-length block (§4.2 condition 1-3).
fn mergeable(r1: &RouteRecord, r2: &RouteRecord) -> bool {
    if r1.netmask != r2.netmask || !r1.attrs_eq(r2) {
        return false;
    }
    let Ok(length) = ip::prefix_length(r1.netmask) else {
        return false;
    };
    if length == 0 {
        return false;
    }
    let a = u32::from(r1.network);
    let b = u32::from(r2.network);
    if length == 1 {
        // No bits above the differing one to compare; any two halves of the
        // whole address space qualify.
        return a != b;
    }
    let shift = 32 - (length - 1);
    let common_a = a >> shift;
    let common_b = b >> shift;
    common_a == common_b && ip::sibling_bit(r1.network, length) != ip::sibling_bit(r2.network, length)
}

/// Combine two mergeable records into their aggregate (§4.2).
fn aggregate(r1: RouteRecord, r2: RouteRecord) -> RouteRecord {
    let length = ip::prefix_length(r1.netmask).expect("mergeable implies valid netmask");
    let (smaller, larger) = if u32::from(r1.network) <= u32::from(r2.network) {
        (r1, r2)
    } else {
        (r2, r1)
    };
    RouteRecord {
        network: smaller.network,
        netmask: ip::netmask_of(length - 1),
        peer: smaller.peer,
        localpref: smaller.localpref,
        self_origin: smaller.self_origin,
        as_path: smaller.as_path.clone(),
        origin: smaller.origin,
        child0: Some(Box::new(smaller)),
        child1: Some(Box::new(larger)),
    }
}

enum Removal {
    /// The leaf matched somewhere inside this subtree. Carries every sibling
    /// subtree, along the path from the match up to here, that an ancestor
    /// aggregate's destruction re-surfaces at the top level.
    Matched(Vec<RouteRecord>),
    NotMatched,
}

/// Recursively search `route` for the leaf identified by
/// `(network, netmask, peer)` (§4.2). Consumes `route` by value since the
/// matched branch is discarded; each ancestor along the match path
/// contributes its other child to the resurfaced list.
fn find_and_remove(
    route: RouteRecord,
    network: Ipv4Addr,
    netmask: Ipv4Addr,
    peer: Ipv4Addr,
) -> Removal {
    if !route.is_aggregate() {
        if route.network == network && route.netmask == netmask && route.peer == peer {
            return Removal::Matched(Vec::new());
        }
        return Removal::NotMatched;
    }

    let RouteRecord { child0, child1, .. } = route;
    let child0 = *child0.expect("aggregate has child0");
    let child1 = *child1.expect("aggregate has child1");
    let child0_copy = child0.clone();
    let child1_copy = child1.clone();

    match find_and_remove(child0, network, netmask, peer) {
        Removal::Matched(mut resurfaced) => {
            resurfaced.push(child1_copy);
            return Removal::Matched(resurfaced);
        }
        Removal::NotMatched => {}
    }

    match find_and_remove(child1, network, netmask, peer) {
        Removal::Matched(mut resurfaced) => {
            resurfaced.push(child0_copy);
            Removal::Matched(resurfaced)
        }
        Removal::NotMatched => Removal::NotMatched,
    }
}
