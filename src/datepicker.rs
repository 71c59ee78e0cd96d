//! Month/year calendar navigation for the card expiry field.
//!
//! The popup shows the twelve months next to a page of years. Reaching a year
//! outside the visible page means turning pages one at a time and waiting for
//! the widget to re-render before reading it again.

use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::interact::{poll_until, Interactor};
use crate::locators::{date_picker, details_page, Locator};

/// Cell labels of the month view, January first
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Label of a 1-based month
pub fn month_label(month: u32) -> Result<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_LABELS.get(i as usize))
        .copied()
        .ok_or(Error::InvalidMonth(month))
}

/// Years currently rendered by the picker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearWindow {
    years: Vec<i32>,
}

/// What to do next to reach a target year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Select,
    Next,
    Previous,
}

impl YearWindow {
    /// Keep the cells whose label is a plain number
    pub fn parse<S: AsRef<str>>(labels: &[S]) -> Self {
        let years = labels
            .iter()
            .map(|l| l.as_ref().trim())
            .filter(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|l| l.parse().ok())
            .collect();
        Self { years }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Lowest and highest visible year
    pub fn range(&self) -> Option<(i32, i32)> {
        let min = self.years.iter().min()?;
        let max = self.years.iter().max()?;
        Some((*min, *max))
    }

    /// `None` when there is nothing to navigate from
    pub fn step_toward(&self, target: i32) -> Option<Step> {
        let (min, max) = self.range()?;
        Some(if target < min {
            Step::Previous
        } else if target > max {
            Step::Next
        } else {
            Step::Select
        })
    }
}

/// Drives the expiry popup through an [`Interactor`]
pub struct DatePicker<'i, 'a, D: ?Sized> {
    ui: &'i Interactor<'a, D>,
    page_limit: u32,
}

impl<'i, 'a, D: PageDriver + ?Sized> DatePicker<'i, 'a, D> {
    pub fn new(ui: &'i Interactor<'a, D>, page_limit: u32) -> Self {
        Self { ui, page_limit }
    }

    /// Open the popup, pick `month`/`year` and close it with OK.
    ///
    /// An invalid month fails before the page is touched.
    pub async fn select(&self, month: u32, year: i32) -> Result<()> {
        let label = month_label(month)?;
        tracing::debug!("Selecting expiry {}/{}", label, year);

        self.ui.click(&details_page::EXPIRY_POPUP_BUTTON).await?;
        self.ui
            .wait_visible(&date_picker::JANUARY, self.ui.timeouts().visible)
            .await?;

        self.ui.click(&date_picker::month(label)).await?;
        self.select_year(year).await?;
        self.ui.click(&date_picker::OK_BUTTON).await
    }

    async fn visible_years(&self) -> Result<YearWindow> {
        let driver = self.ui.driver();
        let timeouts = self.ui.timeouts();
        let window = poll_until(timeouts.optional, timeouts.poll_interval, || async move {
            let labels = driver.texts(&date_picker::VIEW_CELLS).await?;
            let window = YearWindow::parse(&labels);
            Ok((!window.is_empty()).then_some(window))
        })
        .await?;
        Ok(window.unwrap_or_default())
    }

    async fn select_year(&self, target: i32) -> Result<()> {
        let mut turns = 0u32;
        loop {
            let window = self.visible_years().await?;
            let (step, (first, _)) = match (window.step_toward(target), window.range()) {
                (Some(step), Some(range)) => (step, range),
                _ => {
                    return Err(Error::DatePickerNavigationFailed(format!(
                        "no years visible after {} page turn(s)",
                        turns
                    )))
                }
            };

            let page_link: Locator = match step {
                Step::Select => {
                    tracing::debug!("Year {} visible after {} page turn(s)", target, turns);
                    return self.ui.click(&date_picker::year(target)).await;
                }
                Step::Next => date_picker::NEXT_PAGE,
                Step::Previous => date_picker::PREV_PAGE,
            };

            if turns >= self.page_limit {
                return Err(Error::DatePickerNavigationFailed(format!(
                    "year {} not reached within {} page turns",
                    target, self.page_limit
                )));
            }

            let mark = self.ui.mark_frame(&date_picker::year(first)).await?;
            self.ui.click(&page_link).await?;
            turns += 1;

            if let Some(mark) = mark {
                let rerendered = self
                    .ui
                    .wait_stale(&mark, self.ui.timeouts().visible)
                    .await?;
                if !rerendered {
                    return Err(Error::DatePickerNavigationFailed(
                        "year page did not re-render after turning".into(),
                    ));
                }
            }
        }
    }
}
