// SPDX-License-Identifier: Apache-2.0

//! Error types for the route server, per the error-handling design:
//! a single `thiserror`-derived enum, propagated with `?` and handled
//! one datagram at a time by the event loop — no inbound error is fatal.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors that can arise while decoding or handling a single inbound datagram,
/// or while sending to a neighbor.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The datagram could not be decoded, or was missing a required field.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
    /// `src` did not match any configured neighbor.
    #[error("unknown neighbor: {0}")]
    UnknownNeighbor(Ipv4Addr),
    /// A netmask's binary form is not a contiguous run of 1-bits.
    #[error("malformed netmask: {0}")]
    MalformedNetmask(Ipv4Addr),
    /// Sending a datagram to a neighbor failed.
    #[error("transport failure sending to {neighbor}: {source}")]
    TransportFailure {
        /// The neighbor the send was addressed to.
        neighbor: Ipv4Addr,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised while parsing the command line.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A connection spec was not of the form `PORT-NEIGHBOR-RELATIONSHIP`.
    #[error("malformed connection spec `{0}`: expected PORT-NEIGHBOR-RELATIONSHIP")]
    MalformedSpec(String),
    /// The port segment of a connection spec did not parse as a `u16`.
    #[error("invalid port in connection spec `{0}`: {1}")]
    InvalidPort(String, std::num::ParseIntError),
    /// The neighbor segment of a connection spec did not parse as an IPv4 address.
    #[error("invalid neighbor address in connection spec `{0}`: {1}")]
    InvalidNeighbor(String, std::net::AddrParseError),
    /// The relationship segment was not one of `cust`, `peer`, `prov`.
    #[error("invalid relationship `{0}` in connection spec `{1}` (expected cust, peer, or prov)")]
    InvalidRelationship(String, String),
}
