//! Page Locator Catalog
//!
//! Logical names for every element the purchase workflow touches on the vendor
//! portal, mapped to how each one is found in the DOM.

use std::borrow::Cow;
use std::fmt;

/// How an element is selected
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum By {
    /// Element id attribute
    Id(&'static str),
    /// CSS selector
    Css(Cow<'static, str>),
}

/// A named element on the portal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    name: Cow<'static, str>,
    by: By,
}

impl Locator {
    pub const fn id(name: &'static str, id: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            by: By::Id(id),
        }
    }

    pub const fn css(name: &'static str, selector: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            by: By::Css(Cow::Borrowed(selector)),
        }
    }

    /// A locator built at runtime (month and year cells)
    pub fn dynamic(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            by: By::Css(Cow::Owned(selector.into())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn by(&self) -> &By {
        &self.by
    }

    /// CSS selector equivalent, usable with `document.querySelector`
    pub fn selector(&self) -> Cow<'_, str> {
        match &self.by {
            By::Id(id) => Cow::Owned(format!("#{}", id)),
            By::Css(css) => Cow::Borrowed(css),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.selector())
    }
}

/// Step 1: meter and card details
pub mod details_page {
    use super::Locator;

    pub const METER_INPUT: Locator =
        Locator::id("meter number input", "ctl00_ContentPlaceHolder1_radTxtMeter");
    pub const CARD_NUMBER_INPUT: Locator = Locator::id(
        "card number input",
        "ctl00_ContentPlaceHolder1_rtxtCreditCardNumber",
    );
    pub const CARD_NAME_INPUT: Locator = Locator::id(
        "cardholder name input",
        "ctl00_ContentPlaceHolder1_txtCardholderName",
    );
    pub const CARD_CODE_INPUT: Locator =
        Locator::id("card code input", "ctl00_ContentPlaceHolder1_txtCardCode");
    pub const EXPIRY_POPUP_BUTTON: Locator = Locator::id(
        "expiry date picker button",
        "ctl00_ContentPlaceHolder1_dtpExpirationDate_popupButton",
    );
    pub const NEXT_BUTTON: Locator =
        Locator::id("next button", "ctl00_ContentPlaceHolder1_btnNext_input");
    pub const METER_ERROR_LABEL: Locator =
        Locator::id("meter error banner", "ContentPlaceHolder1_lblmeter");
}

/// Month/year calendar popup of the expiry field
pub mod date_picker {
    use super::Locator;

    /// Rendered once the popup is open
    pub const JANUARY: Locator = Locator::id("January cell", "rcMView_Jan");
    pub const NEXT_PAGE: Locator = Locator::id(
        "next years page",
        "ctl00_ContentPlaceHolder1_dtpExpirationDate_dtpExpirationDate_NavigationNextLink",
    );
    pub const PREV_PAGE: Locator = Locator::id(
        "previous years page",
        "ctl00_ContentPlaceHolder1_dtpExpirationDate_dtpExpirationDate_NavigationPrevLink",
    );
    pub const OK_BUTTON: Locator = Locator::id("date picker OK", "rcMView_OK");
    /// Every cell in the month view; year cells are the ones whose text is numeric
    pub const VIEW_CELLS: Locator = Locator::css("calendar cells", "td[id^='rcMView_'] a");

    pub fn month(label: &str) -> Locator {
        Locator::dynamic(
            format!("{} cell", label),
            format!("td#rcMView_{} a", label),
        )
    }

    pub fn year(year: i32) -> Locator {
        Locator::dynamic(format!("{} cell", year), format!("td#rcMView_{} a", year))
    }
}

/// Step 2: customer confirmation and amount
pub mod amount_page {
    use super::Locator;

    pub const CUSTOMER_FIRST_NAME: Locator = Locator::id(
        "customer first name",
        "ctl00_ContentPlaceHolder1_radLblConsumerFirstName",
    );
    pub const CUSTOMER_LAST_NAME: Locator = Locator::id(
        "customer last name",
        "ctl00_ContentPlaceHolder1_radLblConsumerSurname",
    );
    pub const OTHER_AMOUNT_RADIO: Locator = Locator::id(
        "other amount option",
        "ctl00_ContentPlaceHolder1_radlAmount_ctl04",
    );
    pub const AMOUNT_INPUT: Locator =
        Locator::id("amount input", "ctl00_ContentPlaceHolder1_radNumericTxtAmount");
    pub const NEXT_BUTTON: Locator =
        Locator::id("next button", "ctl00_ContentPlaceHolder1_btnNext_input");
}

/// Final payment popup
pub mod confirmation_popup {
    use super::Locator;

    pub const SUBMIT_BUTTON: Locator = Locator::id(
        "confirm payment button",
        "ctl00_ContentPlaceHolder1_RadWindow1_C_rbtnSave_input",
    );
}

/// Token or error page shown after submission
pub mod result_page {
    use super::Locator;

    pub const TOKEN_LABEL: Locator =
        Locator::id("token label", "ctl00_ContentPlaceHolder1_radLblVouchers");
    pub const ERROR_TITLE: Locator = Locator::id("error title", "LeftTitle");
    pub const ERROR_DETAIL: Locator = Locator::css(
        "error detail",
        "div[style='font-size: 14px; text-align: left; word-break: break-all;']",
    );
}
