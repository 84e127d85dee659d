//! Primitive type definitions shared across the feed, decoder and book layers.
//!
//! Prices and sizes are carried as fixed-point integers so that they can be
//! used as ordered map keys. Instrument identifiers are always kept in the
//! normalized `BASE-QUOTE` form once they leave the decoder.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange-assigned sequence token attached to every snapshot and diff.
pub type Nonce = u64;

/// Exponent used for all fixed-point prices and sizes (8 decimal places).
pub const FIXED_POINT_EXPONENT: i8 = -8;

/// Normalized `BASE-QUOTE` instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Creates an identifier from its base and quote assets.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstrument`] if either asset is empty or
    /// contains a separator.
    pub fn new(base: &str, quote: &str) -> Result<Self> {
        if !valid_asset(base) || !valid_asset(quote) {
            return Err(Error::invalid_instrument(format!("{base}-{quote}")));
        }
        Ok(Self(format!("{base}-{quote}")))
    }

    /// Parses an identifier already in `BASE-QUOTE` order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstrument`] if the value is not two assets
    /// joined by a single `-`.
    pub fn parse(value: &str) -> Result<Self> {
        let (base, quote) = split_pair(value, '-')?;
        Self::new(base, quote)
    }

    /// Translates a feed-order `QUOTE-BASE` name into the normalized form.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstrument`] if the wire name is malformed.
    pub fn from_wire(wire: &str) -> Result<Self> {
        let (quote, base) = split_pair(wire, '-')?;
        Self::new(base, quote)
    }

    /// Parses a catalog market name of the form `BASE/QUOTE`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstrument`] if the name is malformed.
    pub fn from_catalog_name(name: &str) -> Result<Self> {
        let (base, quote) = split_pair(name, '/')?;
        Self::new(base, quote)
    }

    /// Returns the feed-order `QUOTE-BASE` name used on the wire.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}-{}", self.quote(), self.base())
    }

    /// Returns the base asset.
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split_once('-').map_or("", |(base, _)| base)
    }

    /// Returns the quote asset.
    #[must_use]
    pub fn quote(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, quote)| quote)
    }

    /// Returns the normalized identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_asset(asset: &str) -> bool {
    !asset.is_empty() && !asset.contains(['-', '/']) && !asset.contains(char::is_whitespace)
}

fn split_pair(value: &str, separator: char) -> Result<(&str, &str)> {
    value
        .trim()
        .split_once(separator)
        .ok_or_else(|| Error::invalid_instrument(value))
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstrumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0
    }
}

/// Order book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Bid (buy) side.
    Bid,
    /// Ask (sell) side.
    Ask,
}

/// One price level change: a size of zero removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookRow {
    /// Side of the book the row belongs to.
    pub side: Side,
    /// Fixed-point price.
    pub price: i64,
    /// Fixed-point size (0 = delete level).
    pub size: u64,
}

impl BookRow {
    /// Creates a new row.
    #[must_use]
    pub const fn new(side: Side, price: i64, size: u64) -> Self {
        Self { side, price, size }
    }

    /// Creates a bid row.
    #[must_use]
    pub const fn bid(price: i64, size: u64) -> Self {
        Self::new(Side::Bid, price, size)
    }

    /// Creates an ask row.
    #[must_use]
    pub const fn ask(price: i64, size: u64) -> Self {
        Self::new(Side::Ask, price, size)
    }

    /// Returns true if this row removes its price level.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.size == 0
    }
}

/// Decimal type for fixed-point numbers.
///
/// The actual value is: mantissa * 10^exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decimal {
    /// The mantissa (significand).
    pub mantissa: i64,
    /// The exponent (power of 10).
    pub exponent: i8,
}

impl Decimal {
    /// Creates a new decimal value.
    #[must_use]
    pub const fn new(mantissa: i64, exponent: i8) -> Self {
        Self { mantissa, exponent }
    }

    /// Creates a decimal from a floating point value with specified precision.
    ///
    /// Returns `None` for non-finite values or values that overflow the
    /// mantissa.
    #[must_use]
    pub fn from_f64(value: f64, exponent: i8) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 10f64.powi(-i32::from(exponent))).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self {
            mantissa: scaled as i64,
            exponent,
        })
    }

    /// Converts the decimal to a floating point value.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 * 10f64.powi(i32::from(self.exponent))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Converts a wire float into a fixed-point price.
#[must_use]
pub fn to_fixed(value: f64) -> Option<i64> {
    Decimal::from_f64(value, FIXED_POINT_EXPONENT).map(|d| d.mantissa)
}

/// Converts a fixed-point price or size back into a float.
#[must_use]
pub fn from_fixed(value: i64) -> f64 {
    Decimal::new(value, FIXED_POINT_EXPONENT).to_f64()
}

/// Timestamp type representing nanoseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a new timestamp.
    #[must_use]
    pub const fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a timestamp from whole seconds since the epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Creates a timestamp from the current time.
    #[must_use]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_nanos() as u64)
    }

    /// Returns the timestamp value in nanoseconds.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp value in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Returns the timestamp value in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000_000
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_parse() {
        let id = InstrumentId::parse("BTC-USD").unwrap();
        assert_eq!(id.base(), "BTC");
        assert_eq!(id.quote(), "USD");
        assert_eq!(id.as_str(), "BTC-USD");
        assert_eq!(id.to_string(), "BTC-USD");
    }

    #[test]
    fn test_instrument_wire_translation() {
        let id = InstrumentId::from_wire("USD-BTC").unwrap();
        assert_eq!(id.as_str(), "BTC-USD");
        assert_eq!(id.to_wire(), "USD-BTC");
        assert_eq!(InstrumentId::from_wire(&id.to_wire()).unwrap(), id);
    }

    #[test]
    fn test_instrument_catalog_name() {
        let id = InstrumentId::from_catalog_name("ETH/USDT").unwrap();
        assert_eq!(id.as_str(), "ETH-USDT");
    }

    #[test]
    fn test_instrument_invalid() {
        assert!(InstrumentId::parse("BTCUSD").is_err());
        assert!(InstrumentId::parse("-USD").is_err());
        assert!(InstrumentId::parse("BTC-").is_err());
        assert!(InstrumentId::parse("A-B-C").is_err());
        assert!(InstrumentId::from_catalog_name("BTC-USD").is_err());
    }

    #[test]
    fn test_instrument_serde_roundtrip() {
        let id = InstrumentId::parse("BTC-USD").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BTC-USD\"");
        let back: InstrumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<InstrumentId>("\"nope\"").is_err());
    }

    #[test]
    fn test_book_row_helpers() {
        let row = BookRow::bid(100, 0);
        assert_eq!(row.side, Side::Bid);
        assert!(row.is_removal());
        assert!(!BookRow::ask(101, 5).is_removal());
    }

    #[test]
    fn test_decimal_conversion() {
        let dec = Decimal::new(15050, -2);
        assert!((dec.to_f64() - 150.50).abs() < 0.001);

        let dec2 = Decimal::from_f64(150.50, -2).unwrap();
        assert_eq!(dec2.mantissa, 15050);
        assert_eq!(dec2.exponent, -2);

        assert!(Decimal::from_f64(f64::NAN, -2).is_none());
        assert!(Decimal::from_f64(f64::INFINITY, -2).is_none());
    }

    #[test]
    fn test_fixed_point_helpers() {
        assert_eq!(to_fixed(0.00012345), Some(12_345));
        assert_eq!(to_fixed(1.0), Some(100_000_000));
        assert!((from_fixed(250_000_000) - 2.5).abs() < f64::EPSILON);
        assert_eq!(to_fixed(1e300), None);
    }

    #[test]
    fn test_timestamp() {
        let ts = Timestamp::from_secs(1);
        assert_eq!(ts.as_nanos(), 1_000_000_000);
        assert_eq!(ts.as_millis(), 1_000);
        assert_eq!(ts.as_secs(), 1);
        assert!(Timestamp::now() > Timestamp::EPOCH);
    }
}
