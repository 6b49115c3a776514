// SPDX-License-Identifier: Apache-2.0

//! The message dispatcher and session state (§4.5, §4.6): the state
//! machine that consumes a decoded inbound message, mutates the table,
//! and returns the outbound messages it must now send. `Router` is
//! transport-agnostic — it never touches a socket — so the whole
//! update/withdraw/data/dump state machine is testable without tokio.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::decision;
use crate::error::RouterError;
use crate::ip;
use crate::message::{
    ForwardedUpdate, InboundBody, InboundMessage, OutboundBody, OutboundMessage, UpdateAnnouncement,
    WithdrawDescriptor,
};
use crate::policy;
use crate::route::{Relationship, RouteRecord};
use crate::table::Table;

/// A neighbor's session state: no per-neighbor BGP FSM is modeled, since
/// sessions are implicitly established by the startup handshake (§4.6).
/// The transport endpoint itself lives in `transport.rs`, not here.
#[derive(Debug, Clone, Copy)]
pub struct NeighborSession {
    pub relationship: Relationship,
}

/// One entry of the append-only update log (§3): every `update` and
/// `withdraw` message received, verbatim, regardless of routing outcome.
#[derive(Debug, Clone)]
pub enum LoggedMessage {
    Update { src: Ipv4Addr, payload: UpdateAnnouncement },
    Withdraw { src: Ipv4Addr, descriptors: Vec<WithdrawDescriptor> },
}

/// The routing engine: forwarding table, session state, and update log for
/// a single AS.
pub struct Router {
    asn: u32,
    neighbors: HashMap<Ipv4Addr, NeighborSession>,
    table: Table,
    updates: Vec<LoggedMessage>,
}

impl Router {
    /// Construct a router for `asn` with the given neighbor relationships.
    pub fn new(asn: u32, neighbors: impl IntoIterator<Item = (Ipv4Addr, Relationship)>) -> Self {
        info!("Router at AS {asn} starting up");
        Self {
            asn,
            neighbors: neighbors
                .into_iter()
                .map(|(addr, relationship)| (addr, NeighborSession { relationship }))
                .collect(),
            table: Table::new(),
            updates: Vec::new(),
        }
    }

    /// This router's own AS number.
    pub fn asn(&self) -> u32 {
        self.asn
    }

    /// The set of configured neighbor addresses.
    pub fn neighbor_addrs(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.neighbors.keys().copied()
    }

    /// This router's interface address toward `neighbor`: the neighbor's
    /// address with the last octet replaced by `1` (§3).
    pub fn our_addr(neighbor: Ipv4Addr) -> Ipv4Addr {
        let octets = neighbor.octets();
        Ipv4Addr::new(octets[0], octets[1], octets[2], 1)
    }

    /// The relationship configured for `neighbor`, if it is a known peer.
    fn relationship(&self, neighbor: Ipv4Addr) -> Option<Relationship> {
        self.neighbors.get(&neighbor).map(|s| s.relationship)
    }

    /// The update log, for diagnostics/dump (§3: not consulted for routing).
    pub fn update_log(&self) -> &[LoggedMessage] {
        &self.updates
    }

    /// All top-level table routes, for diagnostics.
    pub fn routes(&self) -> &[RouteRecord] {
        self.table.routes()
    }

    /// The `handshake` record sent to every configured neighbor at startup
    /// (§6).
    pub fn handshakes(&self) -> Vec<OutboundMessage> {
        self.neighbors
            .keys()
            .map(|&neighbor| OutboundMessage {
                neighbor,
                src: Self::our_addr(neighbor),
                dst: neighbor,
                body: OutboundBody::Handshake,
            })
            .collect()
    }

    /// Dispatch one decoded inbound message, mutating the table and update
    /// log as needed, and returning every outbound message it produces
    /// (§4.5). No inbound error is fatal to the router — the caller logs
    /// and moves on to the next datagram (§7).
    pub fn handle(&mut self, inbound: InboundMessage) -> Result<Vec<OutboundMessage>, RouterError> {
        let srcif = inbound.src;
        if self.relationship(srcif).is_none() {
            return Err(RouterError::UnknownNeighbor(srcif));
        }

        match inbound.body {
            InboundBody::Handshake => Ok(Vec::new()),
            InboundBody::Update(payload) => Ok(self.handle_update(srcif, payload)),
            InboundBody::Withdraw(descriptors) => Ok(self.handle_withdraw(srcif, descriptors)),
            InboundBody::Data(msg) => Ok(self.handle_data(srcif, inbound.dst, msg)),
            InboundBody::Dump => Ok(self.handle_dump(srcif, inbound.dst)),
        }
    }

    fn handle_update(&mut self, srcif: Ipv4Addr, payload: UpdateAnnouncement) -> Vec<OutboundMessage> {
        // §3/§7: the update log records every received update regardless of
        // whether it is ultimately accepted into the table.
        self.updates.push(LoggedMessage::Update {
            src: srcif,
            payload: payload.clone(),
        });

        // §7 MalformedNetmask: a non-contiguous netmask is dropped here, at
        // ingest, before it can ever reach the table or the decision engine.
        if let Err(err) = ip::prefix_length(payload.netmask) {
            log_dropped(&err);
            return Vec::new();
        }

        let leaf = RouteRecord {
            network: payload.network,
            netmask: payload.netmask,
            peer: srcif,
            localpref: payload.localpref,
            self_origin: payload.self_origin,
            as_path: payload.as_path.clone(),
            origin: payload.origin,
            child0: None,
            child1: None,
        };
        self.table.insert(leaf);

        // §4.4: forwarded updates carry only network/netmask/ASPath, with
        // this AS prepended; localpref/selfOrigin/origin are recomputed by
        // the receiver and not propagated, so the wire record must not
        // carry those fields at all.
        let mut forwarded_path = vec![self.asn];
        forwarded_path.extend(payload.as_path.iter().copied());

        self.propagate(srcif, |neighbor| OutboundMessage {
            neighbor,
            src: Self::our_addr(neighbor),
            dst: neighbor,
            body: OutboundBody::Update(ForwardedUpdate {
                network: payload.network,
                netmask: payload.netmask,
                as_path: forwarded_path.clone(),
            }),
        })
    }

    fn handle_withdraw(
        &mut self,
        srcif: Ipv4Addr,
        descriptors: Vec<WithdrawDescriptor>,
    ) -> Vec<OutboundMessage> {
        self.updates.push(LoggedMessage::Withdraw {
            src: srcif,
            descriptors: descriptors.clone(),
        });

        for d in &descriptors {
            self.table.withdraw(d.network, d.netmask, srcif);
        }

        self.propagate(srcif, |neighbor| OutboundMessage {
            neighbor,
            src: Self::our_addr(neighbor),
            dst: neighbor,
            body: OutboundBody::Withdraw(descriptors.clone()),
        })
    }

    /// Send `build` to every neighbor the valley-free export policy (§4.4)
    /// permits, given that the triggering message arrived from `srcif`.
    fn propagate(
        &self,
        srcif: Ipv4Addr,
        build: impl Fn(Ipv4Addr) -> OutboundMessage,
    ) -> Vec<OutboundMessage> {
        let relationships: HashMap<Ipv4Addr, Relationship> = self
            .neighbors
            .iter()
            .map(|(addr, session)| (*addr, session.relationship))
            .collect();
        policy::propagate_targets(srcif, &relationships)
            .into_iter()
            .map(build)
            .collect()
    }

    /// Handle a `data` message (§4.5): unlike every other message type, a
    /// data record's envelope `src`/`dst` are the packet's actual endpoint
    /// addresses, not neighbor-hop addresses, and a relayed record is sent
    /// on completely unchanged — no field is rewritten, matching the
    /// original implementation's `self.send(route["peer"], json.dumps(msg))`.
    fn handle_data(
        &self,
        srcif: Ipv4Addr,
        dst: Ipv4Addr,
        msg: serde_json::Value,
    ) -> Vec<OutboundMessage> {
        let relationships: HashMap<Ipv4Addr, Relationship> = self
            .neighbors
            .iter()
            .map(|(addr, session)| (*addr, session.relationship))
            .collect();

        match decision::decide(self.table.routes(), srcif, dst, &relationships) {
            Some(route) => vec![OutboundMessage {
                neighbor: route.peer,
                src: srcif,
                dst,
                body: OutboundBody::Data(msg),
            }],
            None => {
                debug!("no route to {dst} from {srcif}");
                vec![OutboundMessage {
                    neighbor: srcif,
                    src: Self::our_addr(srcif),
                    dst: srcif,
                    body: OutboundBody::NoRoute,
                }]
            }
        }
    }

    fn handle_dump(&self, srcif: Ipv4Addr, our_dst: Ipv4Addr) -> Vec<OutboundMessage> {
        vec![OutboundMessage {
            neighbor: srcif,
            src: our_dst,
            dst: srcif,
            body: OutboundBody::Table(self.table.dump()),
        }]
    }
}

/// Log a router error at the severity the error-handling design assigns it
/// (§7): nothing here is fatal to the event loop.
pub fn log_dropped(err: &RouterError) {
    warn!("dropping datagram: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InboundBody;
    use crate::route::Origin;

    fn update(network: &str, netmask: &str, localpref: u32, self_origin: bool) -> UpdateAnnouncement {
        UpdateAnnouncement {
            network: network.parse().unwrap(),
            netmask: netmask.parse().unwrap(),
            localpref,
            self_origin,
            as_path: vec![2],
            origin: Origin::Igp,
        }
    }

    fn inbound(src: &str, dst: &str, body: InboundBody) -> InboundMessage {
        InboundMessage {
            src: src.parse().unwrap(),
            dst: dst.parse().unwrap(),
            body,
        }
    }

    #[test]
    fn s1_aggregation_on_two_adjacent_slash24s() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.0.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.1.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();

        let dump = router.table.dump();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].network, "192.168.0.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(dump[0].netmask, "255.255.254.0".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn s2_disaggregation_on_withdraw() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.0.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.1.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Withdraw(vec![WithdrawDescriptor {
                    network: "192.168.1.0".parse().unwrap(),
                    netmask: "255.255.255.0".parse().unwrap(),
                }]),
            ))
            .unwrap();

        let dump = router.table.dump();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].network, "192.168.0.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(dump[0].netmask, "255.255.255.0".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn t4_withdraw_reversibility_empties_table() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.0.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.1.0", "255.255.255.0", 100, true)),
            ))
            .unwrap();
        router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Withdraw(vec![
                    WithdrawDescriptor { network: "192.168.0.0".parse().unwrap(), netmask: "255.255.255.0".parse().unwrap() },
                    WithdrawDescriptor { network: "192.168.1.0".parse().unwrap(), netmask: "255.255.255.0".parse().unwrap() },
                ]),
            ))
            .unwrap();

        assert!(router.table.dump().is_empty());
    }

    #[test]
    fn malformed_netmask_update_is_dropped_not_inserted() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        let out = router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("192.168.0.0", "255.0.255.0", 100, true)),
            ))
            .unwrap();
        assert!(out.is_empty());
        assert!(router.table.dump().is_empty());
        assert_eq!(router.update_log().len(), 1, "the raw update is still logged (§7)");
    }

    #[test]
    fn s6_no_route_reply_on_empty_table() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        let out = router
            .handle(inbound(
                "192.168.0.2",
                "8.8.8.8",
                InboundBody::Data(serde_json::json!({"payload": true})),
            ))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].body, OutboundBody::NoRoute));
        assert_eq!(out[0].neighbor, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
        assert_eq!(out[0].dst, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn t5_propagation_from_noncustomer_reaches_only_customers() {
        let mut router = Router::new(
            1,
            [
                ("192.168.0.2".parse().unwrap(), Relationship::Provider),
                ("192.168.0.3".parse().unwrap(), Relationship::Customer),
                ("192.168.0.4".parse().unwrap(), Relationship::Peer),
            ],
        );
        let out = router
            .handle(inbound(
                "192.168.0.2",
                "192.168.0.1",
                InboundBody::Update(update("10.0.0.0", "255.0.0.0", 100, false)),
            ))
            .unwrap();
        let targets: Vec<Ipv4Addr> = out.iter().map(|m| m.dst).collect();
        assert_eq!(targets, vec!["192.168.0.3".parse::<Ipv4Addr>().unwrap()]);
    }

    #[test]
    fn unknown_neighbor_is_rejected() {
        let mut router = Router::new(1, [("192.168.0.2".parse().unwrap(), Relationship::Customer)]);
        let err = router
            .handle(inbound(
                "10.10.10.10",
                "192.168.0.1",
                InboundBody::Dump,
            ))
            .unwrap_err();
        assert!(matches!(err, RouterError::UnknownNeighbor(_)));
    }
}
