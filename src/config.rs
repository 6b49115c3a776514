// SPDX-License-Identifier: Apache-2.0

//! Command-line connection spec parsing (§6): `PORT-NEIGHBOR-RELATIONSHIP`,
//! e.g. `7002-192.168.0.2-cust`. Not a clap-native shape — clap hands us
//! the raw strings and we split each by hand, same as the original
//! implementation's `relationship.split("-")`.

use std::net::Ipv4Addr;

use crate::error::ConfigError;
use crate::route::Relationship;

/// One parsed neighbor connection: the port this router dials to reach it,
/// its address, and the commercial relationship it was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSpec {
    pub port: u16,
    pub neighbor: Ipv4Addr,
    pub relationship: Relationship,
}

/// Parse a single `PORT-NEIGHBOR-RELATIONSHIP` spec.
pub fn parse_spec(spec: &str) -> Result<NeighborSpec, ConfigError> {
    let parts: Vec<&str> = spec.split('-').collect();
    let [port, neighbor, relation] = parts.as_slice() else {
        return Err(ConfigError::MalformedSpec(spec.to_string()));
    };

    let port: u16 = port
        .parse()
        .map_err(|e| ConfigError::InvalidPort(spec.to_string(), e))?;
    let neighbor: Ipv4Addr = neighbor
        .parse()
        .map_err(|e| ConfigError::InvalidNeighbor(spec.to_string(), e))?;
    let relationship: Relationship = relation
        .parse()
        .map_err(|_| ConfigError::InvalidRelationship(relation.to_string(), spec.to_string()))?;

    Ok(NeighborSpec {
        port,
        neighbor,
        relationship,
    })
}

/// Parse every connection spec given on the command line.
pub fn parse_specs(specs: &[String]) -> Result<Vec<NeighborSpec>, ConfigError> {
    specs.iter().map(|s| parse_spec(s)).collect()
}
