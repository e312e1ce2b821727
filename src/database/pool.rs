//! Bounded connection pool
//!
//! `max_active` caps connections handed out at the same time (one semaphore
//! permit each), `max_idle` caps connections kept open between borrows.
//! A borrowed [`PooledConnection`] goes back on drop: it is parked in the
//! idle set if there is room and it is still usable, closed otherwise.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::connection::PooledConnection;
use super::driver::Dialer;
use super::driver::Driver;
use crate::metrics::POOL_CONNECTIONS;
use crate::ExhaustedPolicy;
use crate::PoolConfig;
use crate::PoolError;
use crate::Result;

/// Point-in-time pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections waiting to be borrowed
    pub idle: usize,
    /// Connections currently borrowed
    pub active: usize,
}

pub(crate) struct PoolInner<D: Dialer> {
    dialer: D,
    config: PoolConfig,
    idle: Mutex<VecDeque<D::Driver>>,
    permits: Arc<Semaphore>,
}

impl<D: Dialer> PoolInner<D> {
    /// Parks a released driver, or closes it when it cannot be reused
    pub(crate) fn give_back(
        &self,
        driver: D::Driver,
        reusable: bool,
    ) {
        if !reusable {
            debug!("closing connection released in an unusable state");
            return;
        }
        if self.permits.is_closed() || !driver.is_healthy() {
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_idle {
            idle.push_back(driver);
        } else {
            debug!("idle set full ({}), closing released connection", self.config.max_idle);
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            active: self.config.max_active.saturating_sub(self.permits.available_permits()),
        }
    }

    pub(crate) fn report(&self) {
        let stats = self.stats();
        POOL_CONNECTIONS.with_label_values(&["idle"]).set(stats.idle as i64);
        POOL_CONNECTIONS.with_label_values(&["active"]).set(stats.active as i64);
    }

    fn pop_healthy_idle(&self) -> Option<D::Driver> {
        let mut idle = self.idle.lock();
        while let Some(driver) = idle.pop_front() {
            if driver.is_healthy() {
                return Some(driver);
            }
            warn!("discarding idle connection that failed its health check");
        }
        None
    }
}

/// Connection pool handle, cheap to clone
pub struct ConnectionPool<D: Dialer> {
    inner: Arc<PoolInner<D>>,
}

impl<D: Dialer> Clone for ConnectionPool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Dialer> ConnectionPool<D> {
    pub fn new(
        dialer: D,
        config: PoolConfig,
    ) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_active));
        Ok(Self {
            inner: Arc::new(PoolInner {
                dialer,
                idle: Mutex::new(VecDeque::with_capacity(config.max_idle)),
                permits,
                config,
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Hands out an idle connection, or dials a new one
    ///
    /// When `max_active` connections are already borrowed the call follows
    /// `exhausted_policy`: it either waits (bounded by `wait_timeout_ms` when
    /// set) or fails at once with [`PoolError::Exhausted`].
    pub async fn borrow(&self) -> Result<PooledConnection<D>> {
        let permit = self.acquire_permit().await?;

        let driver = match self.inner.pop_healthy_idle() {
            Some(driver) => driver,
            None => {
                debug!("no idle connection, dialing");
                // A failed dial drops the permit with it
                self.inner.dialer.dial().await?
            }
        };

        self.inner.report();
        Ok(PooledConnection::new(self.inner.clone(), driver, permit))
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Closes idle connections and rejects further borrows
    ///
    /// Borrowed connections stay usable and are closed when released.
    pub fn close(&self) {
        self.inner.permits.close();
        let closed = {
            let mut idle = self.inner.idle.lock();
            let count = idle.len();
            idle.clear();
            count
        };
        info!("connection pool closed, {} idle connections dropped", closed);
        self.inner.report();
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let config = &self.inner.config;
        let exhausted = || PoolError::Exhausted {
            max_active: config.max_active,
        };
        let permits = self.inner.permits.clone();

        match config.exhausted_policy {
            ExhaustedPolicy::Fail => permits.try_acquire_owned().map_err(|e| match e {
                TryAcquireError::NoPermits => exhausted().into(),
                TryAcquireError::Closed => PoolError::Closed.into(),
            }),
            ExhaustedPolicy::Wait => match config.wait_timeout() {
                Some(timeout) => tokio::time::timeout(timeout, permits.acquire_owned())
                    .await
                    .map_err(|_| exhausted())?
                    .map_err(|_| PoolError::Closed.into()),
                None => permits.acquire_owned().await.map_err(|_| PoolError::Closed.into()),
            },
        }
    }
}
