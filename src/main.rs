// SPDX-License-Identifier: Apache-2.0

//! CLI entry point: parse the AS number and connection specs, bind a
//! socket per neighbor, send the startup handshake, and run the
//! single-threaded cooperative event loop (§5, §6).

use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};

use bgp_router::config::{self, NeighborSpec};
use bgp_router::message::{self, InboundMessage};
use bgp_router::route::Relationship;
use bgp_router::router::{self as dispatcher, Router};
use bgp_router::transport::Transport;

/// A simplified BGP-style inter-domain route server.
#[derive(Parser, Debug)]
#[command(name = "bgp-router")]
struct Cli {
    /// This router's AS number.
    asn: u32,
    /// Neighbor connection specs, each `PORT-NEIGHBOR_ADDR-RELATIONSHIP`
    /// (e.g. `7002-192.168.0.2-cust`).
    connections: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let specs = match config::parse_specs(&cli.connections) {
        Ok(specs) => specs,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.asn, specs).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(asn: u32, specs: Vec<NeighborSpec>) -> Result<(), bgp_router::error::RouterError> {
    let mut router = Router::new(
        asn,
        specs
            .iter()
            .map(|s| (s.neighbor, s.relationship))
            .collect::<Vec<(_, Relationship)>>(),
    );
    let transport = Transport::bind(&specs).await?;

    for handshake in router.handshakes() {
        send(&transport, &handshake).await;
    }

    loop {
        let Some((neighbor, bytes)) = transport.poll().await else {
            continue;
        };

        let decoded = match message::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                dispatcher::log_dropped(&e);
                continue;
            }
        };

        if decoded.src != neighbor {
            warn!("datagram from socket {neighbor} claimed src {}; dropping", decoded.src);
            continue;
        }

        for outbound in dispatch(&mut router, decoded) {
            send(&transport, &outbound).await;
        }
    }
}

fn dispatch(router: &mut Router, decoded: InboundMessage) -> Vec<bgp_router::message::OutboundMessage> {
    match router.handle(decoded) {
        Ok(outbound) => outbound,
        Err(e) => {
            dispatcher::log_dropped(&e);
            Vec::new()
        }
    }
}

async fn send(transport: &Transport, message: &bgp_router::message::OutboundMessage) {
    let bytes = match message::encode(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to encode outbound message: {e}");
            return;
        }
    };
    if let Err(e) = transport.send(message.neighbor, &bytes).await {
        warn!("{e}");
    }
    info!("sent message to {}", message.neighbor);
}
