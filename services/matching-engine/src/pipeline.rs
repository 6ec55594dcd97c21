//! Ingest → match → confirm pipeline
//!
//! Orders flow through two FIFO channels: an external receiver pushes onto
//! the ingest queue, a pool of match workers drains it through the engine,
//! and confirmations queue for an external sender. Channel disconnection is
//! the terminal marker that unblocks a waiting worker at shutdown; no
//! confirmation is emitted for orders still in flight when that happens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};
use types::confirmation::Confirmation;
use types::errors::EngineError;
use types::order::Order;

use crate::engine::MatchingEngine;
use crate::telemetry;

/// Pipeline tuning knobs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of match worker threads
    pub workers: usize,
    /// Ingest queue bound; `None` leaves it unbounded
    pub ingest_capacity: Option<usize>,
    /// Confirmation queue bound; `None` leaves it unbounded
    pub confirmation_capacity: Option<usize>,
    /// Telemetry sampling interval
    pub telemetry_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            ingest_capacity: None,
            confirmation_capacity: None,
            telemetry_interval: Duration::from_secs(1),
        }
    }
}

/// Owned pipeline: worker pool, queues, telemetry logger, and their
/// lifecycle
///
/// Construction spawns every thread; `shutdown` (or drop) stops and joins
/// them all before the engine is released.
pub struct Pipeline {
    engine: Arc<MatchingEngine>,
    running: Arc<AtomicBool>,
    ingest_tx: Option<Sender<Order>>,
    confirmations: Receiver<Confirmation>,
    workers: Vec<JoinHandle<()>>,
    logger: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn the worker pool and telemetry logger
    pub fn start(config: PipelineConfig, engine: Arc<MatchingEngine>) -> Self {
        let (ingest_tx, ingest_rx) = match config.ingest_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let (confirm_tx, confirm_rx) = match config.confirmation_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let running = Arc::new(AtomicBool::new(true));

        let workers = (0..config.workers.max(1))
            .map(|index| {
                let engine = Arc::clone(&engine);
                let running = Arc::clone(&running);
                let orders = ingest_rx.clone();
                let confirmations = confirm_tx.clone();
                thread::Builder::new()
                    .name(format!("match-worker-{index}"))
                    .spawn(move || worker_loop(engine, running, orders, confirmations))
                    .expect("failed to spawn match worker")
            })
            .collect::<Vec<_>>();

        // Workers hold the only confirmation senders; when the last worker
        // exits, the confirmation queue disconnects and drains.
        drop(confirm_tx);
        drop(ingest_rx);

        let logger = {
            let telemetry = engine.telemetry();
            let running = Arc::clone(&running);
            let interval = config.telemetry_interval;
            thread::Builder::new()
                .name("telemetry-logger".to_string())
                .spawn(move || telemetry::logger_loop(telemetry, running, interval))
                .expect("failed to spawn telemetry logger")
        };

        info!(workers = workers.len(), "pipeline started");

        Self {
            engine,
            running,
            ingest_tx: Some(ingest_tx),
            confirmations: confirm_rx,
            workers,
            logger: Some(logger),
        }
    }

    /// Submit one order to the ingest queue
    ///
    /// Blocks when a bounded ingest queue is full (backpressure).
    pub fn submit(&self, order: Order) -> Result<(), EngineError> {
        let tx = self.ingest_tx.as_ref().ok_or(EngineError::QueueClosed)?;
        tx.send(order).map_err(|_| EngineError::QueueClosed)
    }

    /// Clone of the ingest sender for a boundary receiver thread
    pub fn order_sender(&self) -> Sender<Order> {
        self.ingest_tx
            .as_ref()
            .expect("pipeline already shut down")
            .clone()
    }

    /// Clone of the confirmation receiver for a boundary sender thread
    pub fn confirmations(&self) -> Receiver<Confirmation> {
        self.confirmations.clone()
    }

    /// The engine behind this pipeline
    pub fn engine(&self) -> &Arc<MatchingEngine> {
        &self.engine
    }

    /// Stop and join every thread
    ///
    /// Queued-but-unprocessed orders are dropped without confirmation.
    /// Workers parked on an empty ingest queue wake within `IDLE_POLL`
    /// even if a boundary thread still holds a sender clone.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if self.workers.is_empty() && self.logger.is_none() {
            return;
        }
        self.running.store(false, Ordering::Relaxed);
        // Dropping our sender disconnects the ingest queue once boundary
        // clones are gone, unblocking any worker parked on recv.
        self.ingest_tx.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(logger) = self.logger.take() {
            let _ = logger.join();
        }
        info!("pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// How long a worker waits on an empty ingest queue before re-checking the
/// running flag. Bounds shutdown latency even if a boundary thread still
/// holds an ingest sender clone.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// One match worker: pop, process, confirm, repeat until shutdown
fn worker_loop(
    engine: Arc<MatchingEngine>,
    running: Arc<AtomicBool>,
    orders: Receiver<Order>,
    confirmations: Sender<Confirmation>,
) {
    while running.load(Ordering::Relaxed) {
        let mut order = match orders.recv_timeout(IDLE_POLL) {
            Ok(order) => order,
            Err(RecvTimeoutError::Timeout) => continue,
            // Disconnected: shutdown in progress.
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let confirmation = match engine.process(&mut order) {
            Ok(confirmation) => confirmation,
            Err(err) => {
                error!(%err, "match worker stopping");
                break;
            }
        };

        if confirmations.send(confirmation).is_err() {
            break;
        }
    }
    debug!("match worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use types::ids::OrderId;
    use types::order::{OrderStatus, OrderType, Side};

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn quick_config(workers: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            // Keep test teardown snappy.
            telemetry_interval: Duration::from_millis(10),
            ..PipelineConfig::default()
        }
    }

    fn limit(id: u64, side: Side, price: f64, qty: u64) -> Order {
        Order::new(OrderId::new(id), OrderType::Limit, side, price, qty, id, addr())
    }

    #[test]
    fn test_every_submitted_order_is_confirmed() {
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(quick_config(2), Arc::clone(&engine));
        let confirmations = pipeline.confirmations();

        for id in 0..50 {
            let side = if id % 2 == 0 { Side::Sell } else { Side::Buy };
            pipeline.submit(limit(id, side, 50.0, 10)).unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..50 {
            received.push(
                confirmations
                    .recv_timeout(Duration::from_secs(5))
                    .expect("confirmation within timeout"),
            );
        }

        assert_eq!(received.len(), 50);
        assert_eq!(pipeline.engine().telemetry().snapshot().orders_processed, 50);

        pipeline.shutdown();
    }

    #[test]
    fn test_confirmations_conserve_quantity() {
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(quick_config(1), Arc::clone(&engine));
        let confirmations = pipeline.confirmations();

        pipeline.submit(limit(1, Side::Sell, 50.0, 100)).unwrap();
        pipeline.submit(limit(2, Side::Buy, 50.0, 60)).unwrap();

        for _ in 0..2 {
            let c = confirmations.recv_timeout(Duration::from_secs(5)).unwrap();
            let original = if c.order_id == OrderId::new(1) { 100 } else { 60 };
            assert_eq!(c.filled_quantity + c.remaining_quantity, original);
        }

        pipeline.shutdown();
    }

    #[test]
    fn test_shutdown_unblocks_idle_workers() {
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(quick_config(4), engine);
        // All four workers are parked on an empty ingest queue; shutdown
        // must disconnect them and join without hanging.
        pipeline.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(quick_config(1), Arc::clone(&engine));
        let sender = pipeline.order_sender();
        pipeline.shutdown();

        // The workers have exited and dropped their receivers; a retained
        // boundary clone now sends into a closed queue.
        assert!(sender.send(limit(1, Side::Buy, 50.0, 10)).is_err());
    }

    #[test]
    fn test_drop_joins_threads() {
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(quick_config(2), engine);
        pipeline.submit(limit(1, Side::Buy, 50.0, 10)).unwrap();
        drop(pipeline);
    }

    #[test]
    fn test_bounded_queues_still_flow() {
        let config = PipelineConfig {
            workers: 2,
            ingest_capacity: Some(8),
            confirmation_capacity: Some(8),
            telemetry_interval: Duration::from_millis(10),
        };
        let engine = Arc::new(MatchingEngine::new());
        let pipeline = Pipeline::start(config, engine);
        let confirmations = pipeline.confirmations();

        let producer = {
            let sender = pipeline.order_sender();
            thread::spawn(move || {
                for id in 0..100 {
                    sender.send(limit(id, Side::Buy, 50.0, 1)).unwrap();
                }
            })
        };

        let mut open = 0;
        for _ in 0..100 {
            let c = confirmations.recv_timeout(Duration::from_secs(5)).unwrap();
            if c.status == OrderStatus::Open {
                open += 1;
            }
        }
        producer.join().unwrap();
        assert_eq!(open, 100, "non-crossing bids all rest open");

        pipeline.shutdown();
    }
}
