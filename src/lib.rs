// SPDX-License-Identifier: Apache-2.0

//! A simplified BGP-style inter-domain route server: sessions with a fixed
//! set of neighbor routers, a forwarding table kept maximally aggregated,
//! BGP-style best-path selection, and relationship-based announcement
//! propagation. See `DESIGN.md` for how each module is grounded.

pub mod config;
pub mod decision;
pub mod error;
pub mod ip;
pub mod message;
pub mod policy;
pub mod route;
pub mod router;
pub mod table;
pub mod transport;
