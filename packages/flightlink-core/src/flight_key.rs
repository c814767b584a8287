//! Flight correlation keys.
//!
//! A canonical flight identifier used as an envelope's routing and
//! idempotency key (for example as a FIFO message group id):
//!
//! ```text
//! AIRLINE-NNNN-YYYYMMDD-DEP-ARR[-SUFFIX][-REPEAT]
//!
//! QR-1234-20260115-SFO-LHR
//! UA-0096-20260115-SFO-LHR-Z-2
//! ```

use std::fmt;

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Width flight numbers are zero-padded to
const FLIGHT_NUMBER_WIDTH: usize = 4;

/// Validated, normalized flight identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightCorrelationKey {
    airline: String,
    flight_number: String,
    origin_date: NaiveDate,
    departure_airport: String,
    arrival_airport: String,
    suffix: Option<String>,
    repeat_number: Option<u32>,
}

impl FlightCorrelationKey {
    /// Build a key from the required fields
    ///
    /// ## Errors
    ///
    /// `Argument` if the airline, departure or arrival airport is blank.
    pub fn new(
        airline: &str,
        flight_number: &str,
        origin_date: NaiveDate,
        departure_airport: &str,
        arrival_airport: &str,
    ) -> Result<Self> {
        Self::builder()
            .airline(airline)
            .flight_number(flight_number)
            .origin_date(origin_date)
            .departure_airport(departure_airport)
            .arrival_airport(arrival_airport)
            .build()
    }

    pub fn builder() -> FlightCorrelationKeyBuilder {
        FlightCorrelationKeyBuilder::default()
    }

    /// Operational suffix, uppercased; blank clears it
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = normalize_suffix(suffix);
        self
    }

    pub fn with_repeat_number(mut self, repeat_number: u32) -> Self {
        self.repeat_number = Some(repeat_number);
        self
    }

    pub fn airline(&self) -> &str {
        &self.airline
    }

    pub fn flight_number(&self) -> &str {
        &self.flight_number
    }

    pub fn origin_date(&self) -> NaiveDate {
        self.origin_date
    }

    pub fn departure_airport(&self) -> &str {
        &self.departure_airport
    }

    pub fn arrival_airport(&self) -> &str {
        &self.arrival_airport
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn repeat_number(&self) -> Option<u32> {
        self.repeat_number
    }

    /// Render `AIRLINE-NNNN-YYYYMMDD-DEP-ARR[-SUFFIX][-REPEAT]`
    pub fn to_key_id(&self) -> String {
        let mut id = format!(
            "{}-{}-{}-{}-{}",
            self.airline,
            self.flight_number,
            self.origin_date.format("%Y%m%d"),
            self.departure_airport,
            self.arrival_airport
        );
        if let Some(ref suffix) = self.suffix {
            id.push('-');
            id.push_str(suffix);
        }
        if let Some(repeat) = self.repeat_number {
            id.push('-');
            id.push_str(&repeat.to_string());
        }
        id
    }
}

impl fmt::Display for FlightCorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_id())
    }
}

/// Collects possibly-missing inputs (for example from a parsed message)
#[derive(Debug, Clone, Default)]
pub struct FlightCorrelationKeyBuilder {
    airline: Option<String>,
    flight_number: Option<String>,
    origin_date: Option<NaiveDate>,
    departure_airport: Option<String>,
    arrival_airport: Option<String>,
    suffix: Option<String>,
    repeat_number: Option<u32>,
}

impl FlightCorrelationKeyBuilder {
    pub fn airline(mut self, airline: impl Into<String>) -> Self {
        self.airline = Some(airline.into());
        self
    }

    pub fn flight_number(mut self, flight_number: impl Into<String>) -> Self {
        self.flight_number = Some(flight_number.into());
        self
    }

    pub fn origin_date(mut self, origin_date: NaiveDate) -> Self {
        self.origin_date = Some(origin_date);
        self
    }

    pub fn departure_airport(mut self, airport: impl Into<String>) -> Self {
        self.departure_airport = Some(airport.into());
        self
    }

    pub fn arrival_airport(mut self, airport: impl Into<String>) -> Self {
        self.arrival_airport = Some(airport.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn repeat_number(mut self, repeat_number: u32) -> Self {
        self.repeat_number = Some(repeat_number);
        self
    }

    pub fn build(self) -> Result<FlightCorrelationKey> {
        let airline = required_code(self.airline, "Airline code")?;
        let origin_date = self
            .origin_date
            .ok_or_else(|| Error::Argument("Origin date (UTC) is required".into()))?;
        let departure_airport = required_code(self.departure_airport, "Departure airport")?;
        let arrival_airport = required_code(self.arrival_airport, "Arrival airport")?;

        Ok(FlightCorrelationKey {
            airline,
            flight_number: normalize_flight_number(self.flight_number.as_deref().unwrap_or("")),
            origin_date,
            departure_airport,
            arrival_airport,
            suffix: self.suffix.as_deref().and_then(normalize_suffix),
            repeat_number: self.repeat_number,
        })
    }
}

fn required_code(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_uppercase()),
        _ => Err(Error::Argument(format!("{} must not be blank", what))),
    }
}

fn normalize_suffix(suffix: &str) -> Option<String> {
    let suffix = suffix.trim();
    (!suffix.is_empty()).then(|| suffix.to_uppercase())
}

/// Zero-pad a numeric flight number to four digits
///
/// Separators and whitespace are ignored (`"0 96"` and `"96"` both give
/// `"0096"`). Values containing letters, or too large to be a flight
/// number, are returned unchanged. Blank becomes `"0000"`.
pub fn normalize_flight_number(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "0".repeat(FLIGHT_NUMBER_WIDTH);
    }
    if raw.chars().any(|c| c.is_alphabetic()) {
        return raw.to_string();
    }

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(number) => format!("{:0width$}", number, width = FLIGHT_NUMBER_WIDTH),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_basic_key_id() {
        let key = FlightCorrelationKey::new("QR", "1234", date(), "SFO", "LHR").unwrap();
        assert_eq!(key.to_key_id(), "QR-1234-20260115-SFO-LHR");
        assert_eq!(key.to_string(), key.to_key_id());
    }

    #[test]
    fn test_codes_are_uppercased_and_number_padded() {
        let key = FlightCorrelationKey::new(" ua ", "96", date(), "sfo", "lhr").unwrap();
        assert_eq!(key.to_key_id(), "UA-0096-20260115-SFO-LHR");
    }

    #[test]
    fn test_suffix_and_repeat() {
        let key = FlightCorrelationKey::new("UA", "096", date(), "SFO", "LHR")
            .unwrap()
            .with_suffix("z")
            .with_repeat_number(2);
        assert_eq!(key.to_key_id(), "UA-0096-20260115-SFO-LHR-Z-2");

        let repeat_only = FlightCorrelationKey::builder()
            .airline("UA")
            .flight_number("96")
            .origin_date(date())
            .departure_airport("SFO")
            .arrival_airport("LHR")
            .suffix("  ")
            .repeat_number(1)
            .build()
            .unwrap();
        assert_eq!(repeat_only.suffix(), None);
        assert_eq!(repeat_only.to_key_id(), "UA-0096-20260115-SFO-LHR-1");
    }

    #[test]
    fn test_flight_number_normalization() {
        assert_eq!(normalize_flight_number("96"), "0096");
        assert_eq!(normalize_flight_number("0096"), "0096");
        assert_eq!(normalize_flight_number("12345"), "12345");
        assert_eq!(normalize_flight_number(" 9-6 "), "0096");
        assert_eq!(normalize_flight_number(""), "0000");
        assert_eq!(normalize_flight_number("   "), "0000");
        assert_eq!(normalize_flight_number("XYZ1"), "XYZ1");
        assert_eq!(normalize_flight_number("99999999999"), "99999999999");
        assert_eq!(normalize_flight_number("--"), "--");
    }

    #[test]
    fn test_missing_flight_number_is_zeroes() {
        let key = FlightCorrelationKey::builder()
            .airline("QR")
            .origin_date(date())
            .departure_airport("*")
            .arrival_airport("*")
            .build()
            .unwrap();
        assert_eq!(key.to_key_id(), "QR-0000-20260115-*-*");
    }

    #[test]
    fn test_blank_required_fields_rejected() {
        assert!(matches!(
            FlightCorrelationKey::new("", "1", date(), "SFO", "LHR"),
            Err(Error::Argument(_))
        ));
        assert!(FlightCorrelationKey::new("QR", "1", date(), " ", "LHR").is_err());
        assert!(FlightCorrelationKey::new("QR", "1", date(), "SFO", "").is_err());

        let no_date = FlightCorrelationKey::builder()
            .airline("QR")
            .departure_airport("SFO")
            .arrival_airport("LHR")
            .build();
        assert!(matches!(no_date, Err(Error::Argument(ref m)) if m.contains("Origin date")));
    }
}
