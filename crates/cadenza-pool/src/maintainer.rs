//! Background thread that keeps pools refilled.
//!
//! The audio thread only ever takes chunks from and returns chunks to the
//! free lists. Growing and shrinking the lists happens here, on a named
//! low-priority thread, at a fixed interval and on demand.

use crate::config::MaintainerConfig;
use crate::error::{PoolError, Result};
use crate::fixed::{FixedChunkPool, SleepyReport};
use crate::multi::MultiSizePool;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Anything with a blocking refill/trim pass.
pub trait Sleepy: Send + Sync {
    fn sleepy(&self) -> Result<SleepyReport>;
}

impl Sleepy for FixedChunkPool {
    fn sleepy(&self) -> Result<SleepyReport> {
        FixedChunkPool::sleepy(self)
    }
}

impl Sleepy for MultiSizePool {
    fn sleepy(&self) -> Result<SleepyReport> {
        MultiSizePool::sleepy(self)
    }
}

/// Commands sent to the maintainer thread
enum MaintainerCommand {
    Register(Box<dyn Sleepy>),
    RefillNow(Sender<SleepyReport>),
    Shutdown,
}

/// Handle to the pool maintainer thread. Dropping it stops the thread.
pub struct PoolMaintainer {
    command_tx: Sender<MaintainerCommand>,
    thread_handle: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl PoolMaintainer {
    pub fn start() -> Result<Self> {
        Self::with_config(MaintainerConfig::default())
    }

    pub fn with_config(config: MaintainerConfig) -> Result<Self> {
        let (command_tx, command_rx) = bounded(config.command_capacity);
        let passes = Arc::new(AtomicU64::new(0));
        let thread_passes = Arc::clone(&passes);

        let handle = thread::Builder::new()
            .name("cadenza-pool-maintainer".into())
            .spawn(move || maintainer_loop(command_rx, config, thread_passes))?;

        tracing::debug!(
            "Started pool maintainer (interval {:?})",
            config.interval
        );
        Ok(Self {
            command_tx,
            thread_handle: Some(handle),
            passes,
        })
    }

    /// Add a pool to the periodic refill pass.
    pub fn register(&self, pool: impl Sleepy + 'static) -> Result<()> {
        self.command_tx
            .send(MaintainerCommand::Register(Box::new(pool)))
            .map_err(|_| PoolError::MaintainerStopped)
    }

    /// Run a refill pass now and wait for it to finish.
    pub fn refill_now(&self) -> Result<SleepyReport> {
        let (ack_tx, ack_rx) = bounded(1);
        self.command_tx
            .send(MaintainerCommand::RefillNow(ack_tx))
            .map_err(|_| PoolError::MaintainerStopped)?;
        ack_rx.recv().map_err(|_| PoolError::MaintainerStopped)
    }

    /// Number of refill passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.command_tx.send(MaintainerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::debug!("Stopped pool maintainer");
        }
    }
}

impl Drop for PoolMaintainer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn maintainer_loop(
    command_rx: Receiver<MaintainerCommand>,
    config: MaintainerConfig,
    passes: Arc<AtomicU64>,
) {
    let mut pools: Vec<Box<dyn Sleepy>> = Vec::new();

    loop {
        match command_rx.recv_timeout(config.interval) {
            Ok(MaintainerCommand::Register(pool)) => pools.push(pool),
            Ok(MaintainerCommand::RefillNow(ack)) => {
                let report = refill_pass(&pools, &passes);
                let _ = ack.send(report);
            }
            Ok(MaintainerCommand::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                refill_pass(&pools, &passes);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn refill_pass(pools: &[Box<dyn Sleepy>], passes: &AtomicU64) -> SleepyReport {
    let mut report = SleepyReport::default();
    for pool in pools {
        match pool.sleepy() {
            Ok(r) => report = report.merge(r),
            Err(e) => tracing::warn!("Pool refill failed: {}", e),
        }
    }
    passes.fetch_add(1, Ordering::Relaxed);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_refill_now() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let pool = FixedChunkPool::new(16, 4, 8).unwrap();
        let maintainer = PoolMaintainer::with_config(MaintainerConfig {
            interval: Duration::from_secs(60),
            ..Default::default()
        })
        .unwrap();
        maintainer.register(pool.clone()).unwrap();

        let chunks: Vec<_> = std::iter::from_fn(|| pool.allocate()).collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(pool.unused_count(), 0);

        let report = maintainer.refill_now().unwrap();
        assert_eq!(report.created, 4);
        assert_eq!(pool.unused_count(), 4);
        assert!(maintainer.passes() >= 1);

        for chunk in chunks {
            pool.deallocate(chunk);
        }
        maintainer.shutdown();
    }

    #[test]
    fn test_periodic_refill() {
        let pool = MultiSizePool::new(64, 2, 4).unwrap();
        let maintainer = PoolMaintainer::with_config(MaintainerConfig {
            interval: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap();
        maintainer.register(pool.clone()).unwrap();

        let a = pool.allocate(10).unwrap();
        let b = pool.allocate(10).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.classes()[0].unused_count() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(pool.classes()[0].unused_count(), 2);

        pool.deallocate(a);
        pool.deallocate(b);
    }

    #[test]
    fn test_commands_fail_after_shutdown() {
        let maintainer = PoolMaintainer::start().unwrap();
        let tx = maintainer.command_tx.clone();
        maintainer.shutdown();
        let (ack_tx, _ack_rx) = bounded(1);
        assert!(tx.send(MaintainerCommand::RefillNow(ack_tx)).is_err());
    }
}
