// SPDX-License-Identifier: Apache-2.0

//! Best-path selection (§4.3): longest-prefix match over the top-level
//! table, a deterministic tie-break cascade, and the valley-free policy
//! filter that the final choice must still pass.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::ip;
use crate::route::{Relationship, RouteRecord};

/// Select the best route in `routes` for `dst`, as seen from `srcif`.
///
/// Returns `None` if no route matches, or if the sole surviving candidate
/// fails the valley-free policy check (§4.3 step 4).
pub fn decide<'a>(
    routes: &'a [RouteRecord],
    srcif: Ipv4Addr,
    dst: Ipv4Addr,
    relationships: &HashMap<Ipv4Addr, Relationship>,
) -> Option<&'a RouteRecord> {
    // Step 1 + 2: candidates tied for the longest matching prefix.
    let mut best_length: Option<u8> = None;
    let mut candidates: Vec<&RouteRecord> = Vec::new();
    for route in routes {
        if !ip::matches(dst, route.network, route.netmask) {
            continue;
        }
        // A malformed netmask should have been rejected at ingest (§7); if
        // one somehow reaches here, skip just this candidate rather than
        // discarding every other candidate already found.
        let Ok(length) = ip::prefix_length(route.netmask) else {
            continue;
        };
        match best_length {
            Some(current) if length < current => continue,
            Some(current) if length == current => candidates.push(route),
            _ => {
                best_length = Some(length);
                candidates = vec![route];
            }
        }
    }
    if candidates.is_empty() {
        return None;
    }

    // Step 3: tie-break cascade, one criterion at a time.
    narrow(&mut candidates, |r| r.localpref);
    narrow(&mut candidates, |r| r.self_origin);
    narrow(&mut candidates, |r| std::cmp::Reverse(r.as_path.len()));
    narrow(&mut candidates, |r| r.origin);
    narrow(&mut candidates, |r| std::cmp::Reverse(r.peer));

    let selected = candidates[0];

    // Step 4: valley-free policy filter.
    let srcif_relationship = relationships.get(&srcif).copied();
    let peer_relationship = relationships.get(&selected.peer).copied();
    if srcif_relationship != Some(Relationship::Customer)
        && peer_relationship != Some(Relationship::Customer)
    {
        return None;
    }

    Some(selected)
}

/// Keep only the candidates whose `key` is maximal, in place.
fn narrow<K: Ord + Copy>(candidates: &mut Vec<&RouteRecord>, key: impl Fn(&RouteRecord) -> K) {
    if candidates.len() <= 1 {
        return;
    }
    let best = candidates.iter().map(|r| key(r)).max().unwrap();
    candidates.retain(|r| key(r) == best);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Origin;

    fn route(network: &str, netmask: &str, peer: &str, localpref: u32) -> RouteRecord {
        RouteRecord {
            network: network.parse().unwrap(),
            netmask: netmask.parse().unwrap(),
            peer: peer.parse().unwrap(),
            localpref,
            self_origin: false,
            as_path: vec![2],
            origin: Origin::Igp,
            child0: None,
            child1: None,
        }
    }

    fn relationships(pairs: &[(&str, Relationship)]) -> HashMap<Ipv4Addr, Relationship> {
        pairs.iter().map(|(a, r)| (a.parse().unwrap(), *r)).collect()
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = vec![
            route("10.0.0.0", "255.0.0.0", "192.168.0.2", 100),
            route("10.1.0.0", "255.255.0.0", "192.168.0.3", 100),
        ];
        let rels = relationships(&[
            ("192.168.0.2", Relationship::Customer),
            ("192.168.0.3", Relationship::Customer),
        ]);
        let result = decide(&routes, "192.168.0.2".parse().unwrap(), "10.1.2.3".parse().unwrap(), &rels);
        assert_eq!(result.unwrap().peer, "192.168.0.3".parse::<Ipv4Addr>().unwrap());

        let result = decide(&routes, "192.168.0.2".parse().unwrap(), "10.2.0.1".parse().unwrap(), &rels);
        assert_eq!(result.unwrap().peer, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn localpref_breaks_ties() {
        let routes = vec![
            route("192.168.1.0", "255.255.255.0", "192.168.0.2", 100),
            route("192.168.1.0", "255.255.255.0", "192.168.0.3", 200),
        ];
        let rels = relationships(&[
            ("192.168.0.2", Relationship::Customer),
            ("192.168.0.3", Relationship::Customer),
        ]);
        let result = decide(&routes, "192.168.0.2".parse().unwrap(), "192.168.1.5".parse().unwrap(), &rels);
        assert_eq!(result.unwrap().localpref, 200);
    }

    #[test]
    fn valley_free_blocks_provider_to_provider() {
        let routes = vec![route("9.9.0.0", "255.255.0.0", "192.168.0.9", 100)];
        let rels = relationships(&[
            ("192.168.0.9", Relationship::Provider),
            ("192.168.0.5", Relationship::Provider),
        ]);
        let result = decide(&routes, "192.168.0.5".parse().unwrap(), "9.9.1.1".parse().unwrap(), &rels);
        assert!(result.is_none());
    }

    #[test]
    fn malformed_netmask_candidate_does_not_blackhole_other_routes() {
        // A non-contiguous netmask should never reach the table in
        // practice (handle_update rejects it at ingest), but `decide`
        // still must not let one poison the whole candidate scan.
        let mut bad = route("192.168.1.0", "255.255.255.0", "192.168.0.9", 500);
        bad.netmask = "255.0.255.0".parse().unwrap();
        let good = route("192.168.1.0", "255.255.255.0", "192.168.0.2", 100);
        let routes = vec![bad, good];
        let rels = relationships(&[
            ("192.168.0.9", Relationship::Customer),
            ("192.168.0.2", Relationship::Customer),
        ]);
        let result = decide(&routes, "192.168.0.2".parse().unwrap(), "192.168.1.5".parse().unwrap(), &rels);
        assert_eq!(result.unwrap().peer, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn no_route_on_empty_table() {
        let routes: Vec<RouteRecord> = vec![];
        let rels = relationships(&[("192.168.0.2", Relationship::Customer)]);
        assert!(decide(&routes, "192.168.0.2".parse().unwrap(), "8.8.8.8".parse().unwrap(), &rels).is_none());
    }
}
