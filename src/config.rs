//! Run inputs: card credentials from the environment plus the meter number and
//! amount entered by the user. Everything here is checked before a browser is
//! started.

use std::fmt;

use crate::error::{Error, Result};

/// Card credential variables, all required
pub const CARD_ENV_VARS: [&str; 5] = [
    "CC_NAME",
    "CC_NUMBER",
    "CC_CODE",
    "CC_EXP_MONTH",
    "CC_EXP_YEAR",
];

/// Payment card read from the environment
#[derive(Clone, PartialEq, Eq)]
pub struct CardCredentials {
    pub name: String,
    pub number: String,
    pub code: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

impl CardCredentials {
    /// Read `CC_NAME`, `CC_NUMBER`, `CC_CODE`, `CC_EXP_MONTH` and `CC_EXP_YEAR`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from any key/value source. Every missing key is
    /// reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values: Vec<Option<String>> = CARD_ENV_VARS
            .iter()
            .map(|key| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
            .collect();

        let missing: Vec<&str> = CARD_ENV_VARS
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing environment variable(s): {}",
                missing.join(", ")
            )));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        let (name, number, code, month, year) = (next(), next(), next(), next(), next());

        let (expiry_month, expiry_year) = match (month.parse::<u32>(), year.parse::<i32>()) {
            (Ok(m), Ok(y)) => (m, y),
            _ => {
                return Err(Error::Config(
                    "CC_EXP_MONTH and CC_EXP_YEAR must be integers".into(),
                ))
            }
        };
        if !(1..=12).contains(&expiry_month) {
            return Err(Error::Config(format!(
                "CC_EXP_MONTH must be between 1 and 12, got {}",
                expiry_month
            )));
        }

        Ok(Self {
            name,
            number,
            code,
            expiry_month,
            expiry_year,
        })
    }

    /// Card number with all but the last four digits hidden
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.number.chars().collect();
        let shown = digits.len().saturating_sub(4);
        digits
            .iter()
            .enumerate()
            .map(|(i, c)| if i < shown { '*' } else { *c })
            .collect()
    }
}

impl fmt::Debug for CardCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardCredentials")
            .field("name", &self.name)
            .field("number", &self.masked_number())
            .field("code", &"***")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .finish()
    }
}

/// Meter number after validation: trimmed, digits only
pub fn validate_meter_number(value: &str) -> Result<String> {
    let meter = value.trim();
    if meter.is_empty() {
        return Err(Error::InvalidInput("Meter Number is required.".into()));
    }
    if !meter.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(
            "Invalid Meter Number: must contain only digits.".into(),
        ));
    }
    Ok(meter.to_string())
}

/// A purchase amount of at least [`Amount::MIN`] dollars, in whole cents
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    pub const MIN: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidInput("Invalid Amount: must be a number.".into()));
        }
        if value < Self::MIN {
            return Err(Error::InvalidInput("Amount cannot be less than $5.00.".into()));
        }
        if (value * 100.0).round() / 100.0 != value {
            return Err(Error::InvalidInput(
                "Invalid Amount: at most two decimal places.".into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Typed into the portal and shown in summaries with two decimals
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Parse user-entered amount text
pub fn parse_amount(value: &str) -> Result<Amount> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput("Amount is required.".into()));
    }
    let parsed: f64 = value
        .parse()
        .map_err(|_| Error::InvalidInput("Invalid Amount: must be a number.".into()))?;
    Amount::new(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CC_NAME", "JANE DOE"),
            ("CC_NUMBER", "4111111111111111"),
            ("CC_CODE", "123"),
            ("CC_EXP_MONTH", "3"),
            ("CC_EXP_YEAR", "2029"),
        ]
    }

    #[test]
    fn test_credentials_from_lookup() {
        let card = CardCredentials::from_lookup(env(&full_env())).unwrap();
        assert_eq!(card.name, "JANE DOE");
        assert_eq!(card.expiry_month, 3);
        assert_eq!(card.expiry_year, 2029);
    }

    #[test]
    fn test_missing_variables_reported_together() {
        let err = CardCredentials::from_lookup(env(&[("CC_NAME", "JANE"), ("CC_CODE", " ")]))
            .unwrap_err();
        let text = err.to_string();
        assert!(err.is_precondition());
        assert!(text.contains("CC_NUMBER"));
        assert!(text.contains("CC_CODE"));
        assert!(text.contains("CC_EXP_MONTH"));
        assert!(text.contains("CC_EXP_YEAR"));
        assert!(!text.contains("CC_NAME"));
    }

    #[test]
    fn test_non_numeric_expiry_rejected() {
        let mut vars = full_env();
        vars[3] = ("CC_EXP_MONTH", "March");
        let err = CardCredentials::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_month_out_of_range_rejected() {
        let mut vars = full_env();
        vars[3] = ("CC_EXP_MONTH", "13");
        assert!(CardCredentials::from_lookup(env(&vars)).is_err());
    }

    #[test]
    fn test_debug_masks_secrets() {
        let card = CardCredentials::from_lookup(env(&full_env())).unwrap();
        let shown = format!("{:?}", card);
        assert!(shown.contains("************1111"));
        assert!(!shown.contains("4111111111111111"));
        assert!(!shown.contains("123"));
    }

    #[test]
    fn test_meter_validation() {
        assert_eq!(validate_meter_number(" 04123456789 ").unwrap(), "04123456789");
        assert_eq!(
            validate_meter_number("  ").unwrap_err().to_string(),
            "Meter Number is required."
        );
        assert_eq!(
            validate_meter_number("0412-345").unwrap_err().to_string(),
            "Invalid Meter Number: must contain only digits."
        );
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount("20").unwrap().to_string(), "20.00");
        assert_eq!(parse_amount("5").unwrap().to_string(), "5.00");
        assert_eq!(parse_amount("").unwrap_err().to_string(), "Amount is required.");
        assert_eq!(
            parse_amount("ten").unwrap_err().to_string(),
            "Invalid Amount: must be a number."
        );
        assert_eq!(
            parse_amount("4.99").unwrap_err().to_string(),
            "Amount cannot be less than $5.00."
        );
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_amount_keeps_cents_exact() {
        assert_eq!(parse_amount("7.1").unwrap().to_string(), "7.10");
        assert_eq!(parse_amount("12.34").unwrap().to_string(), "12.34");
        assert_eq!(parse_amount("10.90").unwrap().to_string(), "10.90");
        for text in ["7.125", "10.999", "5.001"] {
            assert_eq!(
                parse_amount(text).unwrap_err().to_string(),
                "Invalid Amount: at most two decimal places.",
                "{}",
                text
            );
        }
    }
}
