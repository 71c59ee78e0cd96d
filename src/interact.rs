//! Element Interaction Primitives
//!
//! Every primitive is a bounded poll over [`PageDriver::probe`]: the portal
//! navigates by postback and gives no completion signal other than the DOM
//! changing, so nothing is touched until it is observed ready.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::driver::{ElementState, FrameMark, PageDriver};
use crate::error::{Error, Result};
use crate::locators::Locator;
use crate::Timeouts;

/// Shortest time a single check is given, even past the deadline
const MIN_CHECK_BUDGET: Duration = Duration::from_millis(500);

/// Re-run `check` every `interval` until it yields a value or `timeout` passes.
///
/// `check` always runs at least once and each run is itself bounded, so a
/// page that stops answering ends the poll instead of hanging it. Transient
/// page errors count as "not yet"; any other error ends the poll. Returns
/// `Ok(None)` on timeout.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(MIN_CHECK_BUDGET);
        match tokio::time::timeout(budget, check()).await {
            Ok(Ok(Some(value))) => return Ok(Some(value)),
            Ok(Ok(None)) => {}
            Ok(Err(e)) if e.is_transient() => {
                tracing::trace!("poll: transient page error: {}", e)
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::debug!("poll: page did not answer within {}ms", budget.as_millis());
                return Ok(None);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Run one driver action, failing with `Timeout` if it outlasts `budget`
async fn within<T>(
    budget: Duration,
    what: impl std::fmt::Display,
    action: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(budget, action).await.unwrap_or_else(|_| {
        Err(Error::Timeout(format!(
            "{} got no answer within {}ms",
            what,
            budget.as_millis()
        )))
    })
}

/// Page interactions with the run's wait budgets applied
pub struct Interactor<'a, D: ?Sized> {
    driver: &'a D,
    timeouts: &'a Timeouts,
}

impl<'a, D: PageDriver + ?Sized> Interactor<'a, D> {
    pub fn new(driver: &'a D, timeouts: &'a Timeouts) -> Self {
        Self { driver, timeouts }
    }

    pub fn driver(&self) -> &'a D {
        self.driver
    }

    pub fn timeouts(&self) -> &'a Timeouts {
        self.timeouts
    }

    async fn wait_for_state(
        &self,
        locator: &Locator,
        timeout: Duration,
        ready: fn(&ElementState) -> bool,
    ) -> Result<Option<ElementState>> {
        let driver = self.driver;
        poll_until(timeout, self.timeouts.poll_interval, || async move {
            Ok(driver.probe(locator).await?.filter(ready))
        })
        .await
    }

    async fn wait_interactable(&self, locator: &Locator) -> Result<()> {
        self.wait_for_state(locator, self.timeouts.interact, ElementState::is_interactable)
            .await?
            .map(|_| ())
            .ok_or_else(|| {
                Error::not_interactable(format!(
                    "{} within {}ms",
                    locator,
                    self.timeouts.interact.as_millis()
                ))
            })
    }

    /// Click once the element is present, visible and enabled
    pub async fn click(&self, locator: &Locator) -> Result<()> {
        self.wait_interactable(locator).await?;
        tracing::debug!("click {}", locator.name());
        within(self.timeouts.interact, locator, self.driver.click(locator)).await
    }

    /// Clear the field and type `text` once it is interactable
    pub async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.wait_interactable(locator).await?;
        tracing::debug!("type into {}", locator.name());
        within(self.timeouts.interact, locator, self.driver.fill(locator, text)).await
    }

    /// Trimmed text of a visible element
    pub async fn read_text(&self, locator: &Locator) -> Result<String> {
        self.try_read_text(locator, self.timeouts.visible)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "{} not visible within {}ms",
                    locator,
                    self.timeouts.visible.as_millis()
                ))
            })
    }

    /// Like [`read_text`](Self::read_text), but absence within `timeout` is `None`
    pub async fn try_read_text(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<String>> {
        Ok(self
            .wait_for_state(locator, timeout, |s| s.visible)
            .await?
            .map(|s| s.text.trim().to_string()))
    }

    /// Barrier between page transitions
    pub async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        match self.wait_for_state(locator, timeout, |s| s.visible).await? {
            Some(_) => Ok(()),
            None => Err(Error::Timeout(format!(
                "{} not visible within {}ms",
                locator,
                timeout.as_millis()
            ))),
        }
    }

    /// Index of the first locator seen visible, `None` on timeout
    pub async fn wait_any_visible(
        &self,
        locators: &[&Locator],
        timeout: Duration,
    ) -> Result<Option<usize>> {
        let driver = self.driver;
        poll_until(timeout, self.timeouts.poll_interval, || async move {
            for (i, locator) in locators.iter().enumerate() {
                if driver.probe(locator).await?.is_some_and(|s| s.visible) {
                    return Ok(Some(i));
                }
            }
            Ok(None)
        })
        .await
    }

    /// Tag the current rendering of `locator` for [`wait_stale`](Self::wait_stale)
    pub async fn mark_frame(&self, locator: &Locator) -> Result<Option<FrameMark>> {
        within(self.timeouts.visible, locator, self.driver.mark_frame(locator)).await
    }

    /// Wait for a marked frame to be replaced; false if it never was
    pub async fn wait_stale(&self, mark: &FrameMark, timeout: Duration) -> Result<bool> {
        let driver = self.driver;
        let stale = poll_until(timeout, self.timeouts.poll_interval, || async move {
            Ok(driver.is_stale(mark).await?.then_some(()))
        })
        .await?;
        Ok(stale.is_some())
    }
}
