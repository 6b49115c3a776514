// SPDX-License-Identifier: Apache-2.0

//! The route record: the forwarding table's unit of storage, and the two
//! small enums (`Origin`, `Relationship`) that hang off it.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Commercial relationship to a neighbor, assigned once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// The neighbor is a customer: routes learned from it are announced
    /// everywhere, and it may reach every route in the table.
    Customer,
    /// The neighbor is a settlement-free peer.
    Peer,
    /// The neighbor is a transit provider.
    Provider,
}

impl std::str::FromStr for Relationship {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cust" => Ok(Self::Customer),
            "peer" => Ok(Self::Peer),
            "prov" => Ok(Self::Provider),
            _ => Err(()),
        }
    }
}

/// A route's provenance class. Preference order is `Igp > Egp > Unk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    /// Least preferred: unknown origin.
    #[default]
    Unk,
    /// Learned via an exterior gateway protocol.
    Egp,
    /// Most preferred: originated by an interior gateway protocol.
    Igp,
}

/// A forwarding-table entry.
///
/// A record is either a *leaf* (`child0`/`child1` both absent, `peer` the
/// neighbor that announced it directly) or an *aggregate* (both children
/// present, summarizing the two leaves — or sub-aggregates — that were
/// combined to produce it). See §4.2 for the aggregation discipline that
/// maintains this invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// The advertised network prefix.
    pub network: Ipv4Addr,
    /// The advertised netmask.
    pub netmask: Ipv4Addr,
    /// The neighbor that announced this route (authoritative only on leaves).
    pub peer: Ipv4Addr,
    /// Local preference; higher wins.
    pub localpref: u32,
    /// Whether this AS originated the route itself.
    #[serde(rename = "selfOrigin")]
    pub self_origin: bool,
    /// AS path, left-most (index 0) is the most recent hop.
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    /// Provenance class.
    pub origin: Origin,
    /// The smaller-network child, present iff this record is an aggregate.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub child0: Option<Box<RouteRecord>>,
    /// The larger-network child, present iff this record is an aggregate.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub child1: Option<Box<RouteRecord>>,
}

impl RouteRecord {
    /// True iff this record summarizes two children rather than being a leaf
    /// learned directly from a neighbor.
    pub fn is_aggregate(&self) -> bool {
        self.child0.is_some()
    }

    /// A copy of `self` with `child0`/`child1` stripped, suitable for a
    /// `dump`/`table` reply (§4.5).
    pub fn without_children(&self) -> RouteRecord {
        RouteRecord {
            child0: None,
            child1: None,
            ..self.clone()
        }
    }

    /// The subset of attributes that must agree for two routes to be
    /// mergeable (everything but `network`/`netmask`/`peer`/children).
    pub(crate) fn attrs_eq(&self, other: &RouteRecord) -> bool {
        self.localpref == other.localpref
            && self.self_origin == other.self_origin
            && self.as_path == other.as_path
            && self.origin == other.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_preference_order() {
        assert!(Origin::Igp > Origin::Egp);
        assert!(Origin::Egp > Origin::Unk);
    }

    #[test]
    fn relationship_parses_wire_tags() {
        assert_eq!("cust".parse(), Ok(Relationship::Customer));
        assert_eq!("peer".parse(), Ok(Relationship::Peer));
        assert_eq!("prov".parse(), Ok(Relationship::Provider));
        assert!("bogus".parse::<Relationship>().is_err());
    }
}
