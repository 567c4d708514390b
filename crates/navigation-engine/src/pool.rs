//! Driver pool with checkout/checkin semantics
//!
//! One driver handle per concurrent intent, bounded by a semaphore. A
//! lease returns its handle to the free list on drop, so completion and
//! failure paths both check the driver back in.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::driver::{BrowserDriver, DriverFactory};
use crate::errors::NavError;

pub struct DriverPool {
    factory: Arc<dyn DriverFactory>,
    free: Arc<Mutex<Vec<Arc<dyn BrowserDriver>>>>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl DriverPool {
    pub fn new(factory: Arc<dyn DriverFactory>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            factory,
            free: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Check out a driver, waiting for a slot when the pool is exhausted.
    /// Launches a fresh driver when the free list is empty.
    pub async fn checkout(&self) -> Result<DriverLease, NavError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| NavError::DriverFailure("driver pool closed".into()))?;

        let existing = self.free.lock().pop();
        let driver = match existing {
            Some(driver) => driver,
            None => self.factory.launch().await?,
        };

        debug!(
            driver = driver.name(),
            available = self.slots.available_permits(),
            "driver checked out"
        );

        Ok(DriverLease {
            driver,
            free: Arc::clone(&self.free),
            _permit: permit,
        })
    }
}

/// A checked-out driver handle; checking in happens on drop.
pub struct DriverLease {
    driver: Arc<dyn BrowserDriver>,
    free: Arc<Mutex<Vec<Arc<dyn BrowserDriver>>>>,
    _permit: OwnedSemaphorePermit,
}

impl DriverLease {
    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        Arc::clone(&self.driver)
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        self.free.lock().push(Arc::clone(&self.driver));
    }
}
