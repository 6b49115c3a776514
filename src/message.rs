// SPDX-License-Identifier: Apache-2.0

//! The wire codec: spec.md treats message serialization as out of scope
//! ("the core operates on already-decoded records"), but a standalone
//! binary has no one else to decode for it. This module is the boundary —
//! everything past it deals in `InboundMessage`/`OutboundMessage`, never
//! raw JSON.
//!
//! The `msg` field's shape depends on `type`, so it cannot be a single
//! internally-tagged enum derive. It is decoded in two passes: first into
//! an envelope of `{type, src, dst, msg: Value}`, then `msg` is
//! `serde_json::from_value`d into the type-specific payload.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RouterError;
use crate::route::{Origin, RouteRecord};

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    msg: Value,
}

/// The `update` payload as *received* (§6). `localpref`/`self_origin`/
/// `origin` default to the conventional BGP externally-learned values so
/// that an inbound `[ForwardedUpdate]`-shaped announcement — which is all
/// any neighbor in this network ever actually sends, per §4.4 — still
/// decodes; the receiver always recomputes these fields for itself rather
/// than trusting the sender's, since a propagated update never carries
/// them on the wire in the first place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAnnouncement {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(default = "default_localpref")]
    pub localpref: u32,
    #[serde(rename = "selfOrigin", default)]
    pub self_origin: bool,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    #[serde(default)]
    pub origin: Origin,
}

fn default_localpref() -> u32 {
    100
}

/// The `update` payload as *propagated* (§4.4): "contains only `{network,
/// netmask, ASPath}`" is a literal wire contract — `localpref`, `selfOrigin`,
/// and `origin` must be genuinely absent from the encoded record, not just
/// defaulted, since the receiver recomputes its own view of them. Kept as a
/// distinct type from [`UpdateAnnouncement`] rather than an
/// `Option`/`skip_serializing_if`-guarded subset of it, so that encoding a
/// propagated update can never accidentally leak those three fields onto
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedUpdate {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
}

/// One entry of a `withdraw` message's descriptor list (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WithdrawDescriptor {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// A decoded inbound datagram, with its envelope fields and type-specific
/// payload.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub body: InboundBody,
}

/// The `msg` field, decoded per `type` (§4.5, §6).
#[derive(Debug, Clone)]
pub enum InboundBody {
    Handshake,
    Update(UpdateAnnouncement),
    Withdraw(Vec<WithdrawDescriptor>),
    Data(Value),
    Dump,
}

/// Decode a raw UTF-8 datagram into an [`InboundMessage`].
pub fn decode(bytes: &[u8]) -> Result<InboundMessage, RouterError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    let body = match envelope.kind.as_str() {
        "handshake" => InboundBody::Handshake,
        "update" => InboundBody::Update(serde_json::from_value(envelope.msg)?),
        "withdraw" => InboundBody::Withdraw(serde_json::from_value(envelope.msg)?),
        "data" => InboundBody::Data(envelope.msg),
        "dump" => InboundBody::Dump,
        other => {
            use serde::de::Error as _;
            return Err(RouterError::MalformedMessage(
                serde_json::Error::custom(format!("unrecognized message type `{other}`")),
            ));
        }
    };
    Ok(InboundMessage {
        src: envelope.src,
        dst: envelope.dst,
        body,
    })
}

/// A fully-addressed outbound datagram: `neighbor` is the transport target
/// (which socket to send through), which for `no route` replies differs
/// from the envelope's `dst` (the original requester, not necessarily the
/// immediate neighbor the data message must go back through... in this
/// router they coincide, but the fields are kept distinct on principle —
/// see [`OutboundBody`]).
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub neighbor: Ipv4Addr,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub body: OutboundBody,
}

/// The outbound counterpart of [`InboundBody`], plus the two reply-only
/// variants (`NoRoute`, `Table`) and the `Data` relay variant. `Update`
/// carries a [`ForwardedUpdate`], not an [`UpdateAnnouncement`] — this
/// router never re-announces its own `localpref`/`selfOrigin`/`origin`,
/// only ever a propagated one (§4.4).
#[derive(Debug, Clone)]
pub enum OutboundBody {
    Handshake,
    Update(ForwardedUpdate),
    Withdraw(Vec<WithdrawDescriptor>),
    Data(Value),
    NoRoute,
    Table(Vec<RouteRecord>),
}

/// Encode an [`OutboundMessage`] as the UTF-8 wire record it represents.
pub fn encode(message: &OutboundMessage) -> Result<Vec<u8>, RouterError> {
    let (kind, msg) = match &message.body {
        OutboundBody::Handshake => ("handshake", Value::Object(Default::default())),
        OutboundBody::Update(payload) => ("update", serde_json::to_value(payload)?),
        OutboundBody::Withdraw(descriptors) => ("withdraw", serde_json::to_value(descriptors)?),
        OutboundBody::Data(value) => ("data", value.clone()),
        OutboundBody::NoRoute => ("no route", Value::Object(Default::default())),
        OutboundBody::Table(routes) => ("table", serde_json::to_value(routes)?),
    };
    let envelope = Envelope {
        kind: kind.to_string(),
        src: message.src,
        dst: message.dst,
        msg,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_update_with_defaults_applied() {
        let raw = br#"{"type":"update","src":"192.168.0.2","dst":"192.168.0.1","msg":{"network":"192.168.0.0","netmask":"255.255.255.0","ASPath":[2]}}"#;
        let decoded = decode(raw).unwrap();
        match decoded.body {
            InboundBody::Update(u) => {
                assert_eq!(u.localpref, 100);
                assert!(!u.self_origin);
                assert_eq!(u.origin, Origin::Unk);
                assert_eq!(u.as_path, vec![2]);
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn decodes_withdraw_descriptor_list() {
        let raw = br#"{"type":"withdraw","src":"192.168.0.2","dst":"192.168.0.1","msg":[{"network":"192.168.1.0","netmask":"255.255.255.0"}]}"#;
        let decoded = decode(raw).unwrap();
        match decoded.body {
            InboundBody::Withdraw(list) => assert_eq!(list.len(), 1),
            _ => panic!("expected withdraw"),
        }
    }

    #[test]
    fn rejects_unrecognized_type() {
        let raw = br#"{"type":"bogus","src":"192.168.0.2","dst":"192.168.0.1","msg":{}}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn forwarded_update_omits_localpref_selforigin_origin() {
        let message = OutboundMessage {
            neighbor: "192.168.0.2".parse().unwrap(),
            src: "192.168.0.1".parse().unwrap(),
            dst: "192.168.0.2".parse().unwrap(),
            body: OutboundBody::Update(ForwardedUpdate {
                network: "192.168.0.0".parse().unwrap(),
                netmask: "255.255.255.0".parse().unwrap(),
                as_path: vec![1, 2],
            }),
        };
        let bytes = encode(&message).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let msg = &value["msg"];
        assert!(msg.get("localpref").is_none());
        assert!(msg.get("selfOrigin").is_none());
        assert!(msg.get("origin").is_none());
        assert_eq!(msg["ASPath"], serde_json::json!([1, 2]));
    }

    #[test]
    fn roundtrips_no_route_reply() {
        let message = OutboundMessage {
            neighbor: "192.168.0.2".parse().unwrap(),
            src: "192.168.0.1".parse().unwrap(),
            dst: "192.168.0.9".parse().unwrap(),
            body: OutboundBody::NoRoute,
        };
        let bytes = encode(&message).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.kind, "no route");
    }
}
