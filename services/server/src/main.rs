//! UDP matching-engine server
//!
//! Binds a datagram socket, feeds decoded orders into the pipeline, and
//! sends each confirmation back to its originator. ENTER on stdin stops
//! the server: boundary threads wind down first, then the pipeline joins
//! its workers.

mod codec;

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use crossbeam_channel::{Receiver, Sender};
use matching_engine::{MatchingEngine, Pipeline, PipelineConfig};
use tracing::{error, info, warn};
use types::confirmation::Confirmation;
use types::order::Order;

const MAX_DATAGRAM: usize = 2048;
const SOCKET_POLL: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: {} <ip> <port>", args[0]);
    }
    let addr: SocketAddr = format!("{}:{}", args[1], args[2])
        .parse()
        .context("invalid listen address")?;

    let socket = UdpSocket::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
    socket
        .set_read_timeout(Some(SOCKET_POLL))
        .context("failed to set socket read timeout")?;
    info!(%addr, "server listening");

    let engine = Arc::new(MatchingEngine::new());
    let pipeline = Pipeline::start(PipelineConfig::default(), engine);
    let running = Arc::new(AtomicBool::new(true));

    let receiver = {
        let socket = socket.try_clone().context("failed to clone socket")?;
        let orders = pipeline.order_sender();
        let running = Arc::clone(&running);
        std::thread::Builder::new()
            .name("udp-receiver".to_string())
            .spawn(move || receiver_loop(socket, orders, running))
            .context("failed to spawn receiver thread")?
    };

    let sender = {
        let socket = socket.try_clone().context("failed to clone socket")?;
        let confirmations = pipeline.confirmations();
        std::thread::Builder::new()
            .name("udp-sender".to_string())
            .spawn(move || sender_loop(socket, confirmations))
            .context("failed to spawn sender thread")?
    };

    println!("Press ENTER to stop the server...");
    let mut line = String::new();
    io::stdin().read_line(&mut line).ok();

    info!("shutting down");
    running.store(false, Ordering::Relaxed);
    receiver.join().expect("receiver thread panicked");
    // Joining the workers drops the confirmation senders, which ends the
    // sender loop once the queue drains.
    pipeline.shutdown();
    sender.join().expect("sender thread panicked");

    info!("server stopped");
    Ok(())
}

/// Receive datagrams, decode, stamp, and submit to the pipeline
///
/// Unknown disciplines and sides are answered directly with a rejection;
/// undecodable payloads are logged and dropped.
fn receiver_loop(socket: UdpSocket, orders: Sender<Order>, running: Arc<AtomicBool>) {
    let mut buffer = [0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        let (length, from) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                error!(%err, "socket receive failed");
                break;
            }
        };

        match codec::decode_order(&buffer[..length], from) {
            Ok(order) => {
                if orders.send(order).is_err() {
                    // Pipeline is gone; nothing left to feed.
                    break;
                }
            }
            Err(err) => {
                warn!(%err, %from, "rejecting inbound datagram");
                if let Some(rejection) = err.rejection(from) {
                    respond(&socket, &rejection);
                }
            }
        }
    }
}

/// Drain confirmations back to their originators
fn sender_loop(socket: UdpSocket, confirmations: Receiver<Confirmation>) {
    while let Ok(confirmation) = confirmations.recv() {
        respond(&socket, &confirmation);
    }
}

fn respond(socket: &UdpSocket, confirmation: &Confirmation) {
    match codec::encode_confirmation(confirmation) {
        Ok(bytes) => {
            if let Err(err) = socket.send_to(&bytes, confirmation.reply_to) {
                warn!(%err, to = %confirmation.reply_to, "failed to send confirmation");
            }
        }
        Err(err) => error!(%err, "failed to encode confirmation"),
    }
}
