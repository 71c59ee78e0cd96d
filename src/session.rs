//! Session/driver lifecycle
//!
//! A [`Session`] owns the one live driver of a purchase run. It is acquired
//! from an ordered list of engines (first one that starts wins) and released
//! exactly once; releasing again is a no-op.

use async_trait::async_trait;

use crate::driver::PageDriver;
use crate::error::{EngineFailure, Error, Result};
use crate::PortalConfig;

/// Something that can start a driver with the portal page open
#[async_trait]
pub trait EngineProvider: Send + Sync {
    type Driver: PageDriver + 'static;

    /// Short engine name used in logs and errors
    fn name(&self) -> &str;

    async fn launch(&self, config: &PortalConfig) -> Result<Self::Driver>;
}

/// Try each provider in order; the first that launches owns the session
pub async fn acquire<P: EngineProvider>(
    providers: &[P],
    config: &PortalConfig,
) -> Result<Session<P::Driver>> {
    let mut attempts = Vec::with_capacity(providers.len());

    for provider in providers {
        tracing::info!("Setting up {} driver", provider.name());
        match provider.launch(config).await {
            Ok(driver) => {
                tracing::info!("{} driver ready", provider.name());
                return Ok(Session::new(provider.name(), driver));
            }
            Err(e) => {
                tracing::warn!("{} driver setup failed: {}", provider.name(), e);
                attempts.push(EngineFailure {
                    engine: provider.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    Err(Error::DriverUnavailable { attempts })
}

/// Exclusive owner of a live driver for one purchase run
pub struct Session<D: PageDriver> {
    engine: String,
    driver: Option<D>,
}

impl<D: PageDriver> Session<D> {
    pub fn new(engine: impl Into<String>, driver: D) -> Self {
        Self {
            engine: engine.into(),
            driver: Some(driver),
        }
    }

    /// Name of the engine that produced the driver
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// The live driver, or `SessionReleased` once released
    pub fn driver(&self) -> Result<&D> {
        self.driver.as_ref().ok_or(Error::SessionReleased)
    }

    pub fn is_released(&self) -> bool {
        self.driver.is_none()
    }

    /// Close the driver. Safe to call any number of times.
    pub async fn release(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(driver) => {
                tracing::info!("Releasing {} session", self.engine);
                driver.close().await
            }
            None => {
                tracing::trace!("{} session already released", self.engine);
                Ok(())
            }
        }
    }
}

impl<D: PageDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if self.driver.is_some() {
            tracing::warn!(
                "{} session dropped without release; relying on process cleanup",
                self.engine
            );
        }
    }
}
