//! Background update loop.
//!
//! Spawns a thread that owns the `QuadratureEncoder`, calls `update()` at a
//! fixed rate and publishes the latest `Reading` via a bounded channel.
//!
//! Each `Poller` spawns exactly one thread that is shut down and joined when
//! the `Poller` is stopped or dropped.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use substep_traits::CaptureSource;
use substep_traits::clock::Clock;

use crate::encoder::{QuadratureEncoder, Reading};

pub struct Poller<C: CaptureSource> {
    rx: xch::Receiver<Reading>,
    updates: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<QuadratureEncoder<C>>>,
}

impl<C: CaptureSource + Send + 'static> Poller<C> {
    pub fn spawn<K: Clock + Send + 'static>(
        mut encoder: QuadratureEncoder<C>,
        rate_hz: u32,
        clock: K,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let stale = rx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let updates = Arc::new(AtomicU64::new(0));
        let updates_clone = updates.clone();
        let period = Duration::from_micros(crate::util::period_us(rate_hz));
        let channel = encoder.channel();

        let join_handle = std::thread::spawn(move || {
            tracing::debug!(%channel, rate_hz, "poller started");
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!(%channel, "poller received shutdown signal");
                    break;
                }

                encoder.update();
                updates_clone.fetch_add(1, Ordering::Relaxed);

                // Latest value wins: drop an unread reading to make room.
                let reading = encoder.reading();
                if let Err(xch::TrySendError::Full(reading)) = tx.try_send(reading) {
                    let _ = stale.try_recv();
                    let _ = tx.try_send(reading);
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!(%channel, "poller thread exiting cleanly");
            encoder
        });

        Self {
            rx,
            updates,
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl<C: CaptureSource> Poller<C> {
    /// Newest reading published since the last call, if any.
    pub fn latest(&self) -> Option<Reading> {
        self.rx.try_iter().last()
    }

    /// Number of `update()` calls made so far.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Stop the loop and hand the encoder back. `None` if the thread panicked.
    pub fn stop(mut self) -> Option<QuadratureEncoder<C>> {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.join_handle.take()?;
        match handle.join() {
            Ok(encoder) => Some(encoder),
            Err(e) => {
                tracing::warn!(?e, "poller thread panicked");
                None
            }
        }
    }
}

impl<C: CaptureSource> Drop for Poller<C> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(_) => {
                    tracing::trace!("poller thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "poller thread panicked during shutdown");
                }
            }
        }
    }
}
