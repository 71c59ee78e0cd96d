//! In-memory stand-in for the payment portal.
//!
//! Models the three pages, the expiry popup with its paged year view, and the
//! result page, closely enough to drive the real workflow end to end without a
//! browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use meterpay::locators::{amount_page, confirmation_popup, date_picker, details_page, result_page};
use meterpay::{
    Amount, CardCredentials, ElementState, EngineProvider, Error, FrameMark, Locator, PageDriver,
    PortalConfig, PurchaseDetails, Result, Timeouts,
};

/// Years shown per picker page
pub const YEARS_PER_PAGE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Details,
    Amount,
    Confirmation,
    Result,
}

/// What the result page shows after submission
#[derive(Debug, Clone)]
pub enum ResultPage {
    Token(String),
    Error { title: String, detail: Option<String> },
    Blank,
}

#[derive(Debug)]
pub struct PortalState {
    pub stage: Stage,
    pub fields: HashMap<String, String>,
    pub actions: Vec<String>,
    pub closed: bool,

    pub meter_error: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub result: ResultPage,
    pub banner_shown: bool,
    pub other_amount_selected: bool,
    /// Drop the amount radio from the page entirely
    pub hide_amount_radio: bool,
    /// Never show the confirmation popup
    pub suppress_popup: bool,

    pub picker_open: bool,
    pub window_start: i32,
    pub generation: u64,
    pub marks: HashMap<u64, u64>,
    pub next_mark: u64,
    pub page_turns: u32,
    /// Year cells vanish after the first page turn
    pub blank_after_turn: bool,
    /// Page turns do not re-render the view
    pub frozen: bool,
    pub picked_month: Option<String>,
    pub picked_year: Option<i32>,
    pub expiry: Option<(String, i32)>,
}

impl Default for PortalState {
    fn default() -> Self {
        Self {
            stage: Stage::Details,
            fields: HashMap::new(),
            actions: Vec::new(),
            closed: false,
            meter_error: None,
            first_name: "JOHN (R1)".into(),
            last_name: "DOE".into(),
            result: ResultPage::Token("ABCD-1234-EFGH-5678".into()),
            banner_shown: false,
            other_amount_selected: false,
            hide_amount_radio: false,
            suppress_popup: false,
            picker_open: false,
            window_start: 2020,
            generation: 0,
            marks: HashMap::new(),
            next_mark: 1,
            page_turns: 0,
            blank_after_turn: false,
            frozen: false,
            picked_month: None,
            picked_year: None,
            expiry: None,
        }
    }
}

/// Cell id suffix of a picker cell selector like `td#rcMView_2027 a`
fn picker_cell(selector: &str) -> Option<&str> {
    selector.strip_prefix("td#rcMView_")?.strip_suffix(" a")
}

impl PortalState {
    fn years(&self) -> Vec<i32> {
        if self.blank_after_turn && self.page_turns > 0 {
            return Vec::new();
        }
        (self.window_start..self.window_start + YEARS_PER_PAGE).collect()
    }

    fn same(locator: &Locator, other: &Locator) -> bool {
        locator.selector() == other.selector()
    }

    fn field(&self, locator: &Locator) -> String {
        self.fields
            .get(locator.selector().as_ref())
            .cloned()
            .unwrap_or_default()
    }

    fn element(&self, locator: &Locator) -> Option<ElementState> {
        let shown = |text: String| {
            Some(ElementState {
                visible: true,
                enabled: true,
                text,
            })
        };

        if self.picker_open {
            if Self::same(locator, &date_picker::JANUARY)
                || Self::same(locator, &date_picker::OK_BUTTON)
                || Self::same(locator, &date_picker::NEXT_PAGE)
                || Self::same(locator, &date_picker::PREV_PAGE)
            {
                return shown(String::new());
            }
            if let Some(cell) = picker_cell(&locator.selector()) {
                if let Ok(year) = cell.parse::<i32>() {
                    return self
                        .years()
                        .contains(&year)
                        .then(|| ElementState {
                            visible: true,
                            enabled: true,
                            text: year.to_string(),
                        });
                }
                return meterpay::datepicker::MONTH_LABELS
                    .contains(&cell)
                    .then(|| ElementState {
                        visible: true,
                        enabled: true,
                        text: cell.to_string(),
                    });
            }
        }

        match self.stage {
            Stage::Details => {
                let inputs = [
                    details_page::METER_INPUT,
                    details_page::CARD_NUMBER_INPUT,
                    details_page::CARD_NAME_INPUT,
                    details_page::CARD_CODE_INPUT,
                ];
                if inputs.iter().any(|i| Self::same(locator, i)) {
                    return shown(self.field(locator));
                }
                if Self::same(locator, &details_page::EXPIRY_POPUP_BUTTON)
                    || Self::same(locator, &details_page::NEXT_BUTTON)
                {
                    return shown(String::new());
                }
                if Self::same(locator, &details_page::METER_ERROR_LABEL) && self.banner_shown {
                    return shown(self.meter_error.clone().unwrap_or_default());
                }
                None
            }
            Stage::Amount | Stage::Confirmation => {
                if self.stage == Stage::Confirmation
                    && Self::same(locator, &confirmation_popup::SUBMIT_BUTTON)
                {
                    return shown(String::new());
                }
                if Self::same(locator, &amount_page::CUSTOMER_FIRST_NAME) {
                    return shown(self.first_name.clone());
                }
                if Self::same(locator, &amount_page::CUSTOMER_LAST_NAME) {
                    return shown(self.last_name.clone());
                }
                if Self::same(locator, &amount_page::OTHER_AMOUNT_RADIO) {
                    return (!self.hide_amount_radio).then(|| ElementState {
                        visible: true,
                        enabled: true,
                        text: String::new(),
                    });
                }
                if Self::same(locator, &amount_page::AMOUNT_INPUT) {
                    return Some(ElementState {
                        visible: true,
                        enabled: self.other_amount_selected,
                        text: self.field(locator),
                    });
                }
                if Self::same(locator, &amount_page::NEXT_BUTTON) {
                    return shown(String::new());
                }
                None
            }
            Stage::Result => match &self.result {
                ResultPage::Token(token) if Self::same(locator, &result_page::TOKEN_LABEL) => {
                    shown(token.clone())
                }
                ResultPage::Error { title, .. }
                    if Self::same(locator, &result_page::ERROR_TITLE) =>
                {
                    shown(title.clone())
                }
                ResultPage::Error {
                    detail: Some(detail),
                    ..
                } if Self::same(locator, &result_page::ERROR_DETAIL) => shown(detail.clone()),
                _ => None,
            },
        }
    }

    fn click(&mut self, locator: &Locator) -> Result<()> {
        if self.element(locator).is_none() {
            return Err(Error::not_found(locator.to_string()));
        }
        self.actions.push(format!("click {}", locator.name()));

        if self.picker_open {
            if Self::same(locator, &date_picker::NEXT_PAGE) {
                self.turn_page(YEARS_PER_PAGE);
                return Ok(());
            }
            if Self::same(locator, &date_picker::PREV_PAGE) {
                self.turn_page(-YEARS_PER_PAGE);
                return Ok(());
            }
            if Self::same(locator, &date_picker::OK_BUTTON) {
                if let (Some(month), Some(year)) = (self.picked_month.clone(), self.picked_year) {
                    self.expiry = Some((month, year));
                }
                self.picker_open = false;
                return Ok(());
            }
            if let Some(cell) = picker_cell(&locator.selector()) {
                match cell.parse::<i32>() {
                    Ok(year) => self.picked_year = Some(year),
                    Err(_) => self.picked_month = Some(cell.to_string()),
                }
                return Ok(());
            }
        }

        match self.stage {
            Stage::Details if Self::same(locator, &details_page::EXPIRY_POPUP_BUTTON) => {
                self.picker_open = true;
            }
            Stage::Details if Self::same(locator, &details_page::NEXT_BUTTON) => {
                if self.meter_error.is_some() {
                    self.banner_shown = true;
                } else {
                    self.stage = Stage::Amount;
                }
            }
            Stage::Amount if Self::same(locator, &amount_page::OTHER_AMOUNT_RADIO) => {
                self.other_amount_selected = true;
            }
            Stage::Amount if Self::same(locator, &amount_page::NEXT_BUTTON) => {
                if !self.suppress_popup {
                    self.stage = Stage::Confirmation;
                }
            }
            Stage::Confirmation if Self::same(locator, &confirmation_popup::SUBMIT_BUTTON) => {
                self.stage = Stage::Result;
            }
            _ => {}
        }
        Ok(())
    }

    fn turn_page(&mut self, delta: i32) {
        self.page_turns += 1;
        if !self.frozen {
            self.window_start += delta;
            self.generation += 1;
        }
    }
}

/// Shared handle on a simulated portal; clones see the same state
#[derive(Clone, Default)]
pub struct SimulatedPortal {
    state: Arc<Mutex<PortalState>>,
    closes: Arc<AtomicUsize>,
}

impl SimulatedPortal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the scenario before a run
    pub fn with(self, setup: impl FnOnce(&mut PortalState)) -> Self {
        setup(&mut *self.state());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn field(&self, locator: &Locator) -> String {
        self.state().field(locator)
    }

    pub fn clicked(&self, name: &str) -> bool {
        let wanted = format!("click {}", name);
        self.state().actions.iter().any(|a| *a == wanted)
    }

    fn live(&self) -> Result<MutexGuard<'_, PortalState>> {
        let state = self.state();
        if state.closed {
            return Err(Error::transport("browser closed"));
        }
        Ok(state)
    }
}

#[async_trait]
impl PageDriver for SimulatedPortal {
    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>> {
        Ok(self.live()?.element(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.live()?.click(locator)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let mut state = self.live()?;
        if !state.element(locator).is_some_and(|s| s.is_interactable()) {
            return Err(Error::not_interactable(locator.to_string()));
        }
        state.actions.push(format!("type {}", locator.name()));
        state
            .fields
            .insert(locator.selector().into_owned(), text.to_string());
        Ok(())
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let state = self.live()?;
        if !state.picker_open || locator.selector() != date_picker::VIEW_CELLS.selector() {
            return Ok(Vec::new());
        }
        let mut cells: Vec<String> = meterpay::datepicker::MONTH_LABELS
            .iter()
            .map(|m| m.to_string())
            .collect();
        cells.extend(state.years().iter().map(|y| y.to_string()));
        cells.extend(["OK".to_string(), "Cancel".to_string()]);
        Ok(cells)
    }

    async fn mark_frame(&self, locator: &Locator) -> Result<Option<FrameMark>> {
        let mut state = self.live()?;
        if state.element(locator).is_none() {
            return Ok(None);
        }
        let id = state.next_mark;
        state.next_mark += 1;
        let generation = state.generation;
        state.marks.insert(id, generation);
        Ok(Some(FrameMark(id)))
    }

    async fn is_stale(&self, mark: &FrameMark) -> Result<bool> {
        let state = self.live()?;
        Ok(state
            .marks
            .get(&mark.0)
            .is_some_and(|generation| *generation != state.generation))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.state().closed = true;
        Ok(())
    }
}

/// Engine that hands out a simulated portal, or fails to start
#[derive(Clone)]
pub struct SimulatedEngine {
    pub name: &'static str,
    pub portal: Option<SimulatedPortal>,
    pub launches: Arc<AtomicUsize>,
}

impl SimulatedEngine {
    pub fn working(name: &'static str, portal: SimulatedPortal) -> Self {
        Self {
            name,
            portal: Some(portal),
            launches: Arc::default(),
        }
    }

    pub fn broken(name: &'static str) -> Self {
        Self {
            name,
            portal: None,
            launches: Arc::default(),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineProvider for SimulatedEngine {
    type Driver = SimulatedPortal;

    fn name(&self) -> &str {
        self.name
    }

    async fn launch(&self, _config: &PortalConfig) -> Result<SimulatedPortal> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.portal
            .clone()
            .ok_or_else(|| Error::BrowserNotFound(self.name.to_string()))
    }
}

/// Short waits so failure paths finish quickly
pub fn test_config() -> PortalConfig {
    PortalConfig {
        timeouts: Timeouts {
            interact: Duration::from_millis(200),
            visible: Duration::from_millis(200),
            optional: Duration::from_millis(50),
            outcome: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        },
        ..Default::default()
    }
}

pub fn card() -> CardCredentials {
    CardCredentials {
        name: "JANE DOE".into(),
        number: "4111111111111111".into(),
        code: "123".into(),
        expiry_month: 3,
        expiry_year: 2027,
    }
}

pub fn details() -> PurchaseDetails {
    PurchaseDetails::new("04123456789", Amount::new(20.0).unwrap(), card()).unwrap()
}
