//! Interactive UDP test client
//!
//! Sends order datagrams to a running server and prints the confirmations
//! that come back. Orders can be generated randomly across all six
//! disciplines, sent in bulk, or composed by hand.

use std::io::{self, BufRead, ErrorKind, Write};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use rand::Rng;
use types::wire::{ConfirmationMessage, OrderRequest};

const MAX_DATAGRAM: usize = 2048;
const SOCKET_POLL: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: {} <ip> <port>", args[0]);
    }
    let server: SocketAddr = format!("{}:{}", args[1], args[2])
        .parse()
        .context("invalid server address")?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind client socket")?;
    socket
        .set_read_timeout(Some(SOCKET_POLL))
        .context("failed to set socket read timeout")?;

    let running = Arc::new(AtomicBool::new(true));
    let receiver = {
        let socket = socket.try_clone().context("failed to clone socket")?;
        let running = Arc::clone(&running);
        std::thread::spawn(move || confirmation_loop(socket, running))
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut next_order_id: u64 = 1;

    loop {
        println!();
        println!("[Client menu]");
        println!("  1) Send a random order");
        println!("  2) Send multiple random orders");
        println!("  3) Compose a custom order");
        println!("  4) Quit");
        print!("Select: ");
        io::stdout().flush().ok();

        let Some(Ok(choice)) = lines.next() else { break };
        match choice.trim() {
            "1" => {
                let request = random_order(next_order_id);
                next_order_id += 1;
                send_order(&socket, server, &request)?;
                println!("sent: {}", serde_json::to_string(&request)?);
            }
            "2" => {
                print!("How many orders? ");
                io::stdout().flush().ok();
                let Some(Ok(count_line)) = lines.next() else { break };
                let Ok(count) = count_line.trim().parse::<u32>() else {
                    println!("not a number: {}", count_line.trim());
                    continue;
                };
                for _ in 0..count {
                    let request = random_order(next_order_id);
                    next_order_id += 1;
                    send_order(&socket, server, &request)?;
                }
                println!("sent {count} random orders");
            }
            "3" => {
                match compose_order(&mut lines, next_order_id) {
                    Some(request) => {
                        next_order_id += 1;
                        send_order(&socket, server, &request)?;
                        println!("sent: {}", serde_json::to_string(&request)?);
                    }
                    None => println!("aborted"),
                }
            }
            "4" => break,
            other => println!("invalid choice: {other}"),
        }
    }

    running.store(false, Ordering::Relaxed);
    receiver.join().expect("receiver thread panicked");
    println!("bye");
    Ok(())
}

fn send_order(socket: &UdpSocket, server: SocketAddr, request: &OrderRequest) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(request)?;
    socket
        .send_to(&bytes, server)
        .context("failed to send order")?;
    Ok(())
}

/// Generate a random order across all disciplines and both sides
fn random_order(order_id: u64) -> OrderRequest {
    let mut rng = rand::thread_rng();

    let order_type = match rng.gen_range(0..6) {
        0 => "market",
        1 => "limit",
        2 => "cancel",
        3 => "stop-loss",
        4 => "ioc",
        _ => "fok",
    };
    let action = if rng.gen_bool(0.5) { "buy" } else { "sell" };
    let price = rng.gen_range(10.0..100.0);

    OrderRequest {
        order_id,
        order_type: order_type.to_string(),
        action: action.to_string(),
        price,
        quantity: rng.gen_range(1..=500),
        stop_price: (order_type == "stop-loss").then_some(price),
    }
}

/// Prompt for each field of a custom order
fn compose_order(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    order_id: u64,
) -> Option<OrderRequest> {
    let order_type = prompt(lines, "Type (market/limit/cancel/stop-loss/ioc/fok): ")?;
    let action = prompt(lines, "Side (buy/sell): ")?;
    let price: f64 = prompt(lines, "Price: ")?.parse().ok()?;
    let quantity: u64 = prompt(lines, "Quantity: ")?.parse().ok()?;
    let stop_price = if order_type == "stop-loss" {
        Some(prompt(lines, "Stop price: ")?.parse().ok()?)
    } else {
        None
    };

    Some(OrderRequest {
        order_id,
        order_type,
        action,
        price,
        quantity,
        stop_price,
    })
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Option<String> {
    print!("{label}");
    io::stdout().flush().ok();
    lines.next()?.ok().map(|line| line.trim().to_string())
}

/// Print confirmations as they arrive
fn confirmation_loop(socket: UdpSocket, running: Arc<AtomicBool>) {
    let mut buffer = [0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        let length = match socket.recv_from(&mut buffer) {
            Ok((length, _)) => length,
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => break,
        };

        match serde_json::from_slice::<ConfirmationMessage>(&buffer[..length]) {
            Ok(confirmation) => println!(
                "confirmation: order {} {} filled={} remaining={} avg_price={:.2}",
                confirmation.order_id,
                confirmation.status,
                confirmation.filled_quantity,
                confirmation.remaining_quantity,
                confirmation.average_price,
            ),
            Err(_) => println!("unparseable confirmation ({length} bytes)"),
        }
    }
}
