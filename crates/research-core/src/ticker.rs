//! Validated ticker symbol

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum number of letters in a ticker
pub const MIN_LEN: usize = 2;
/// Maximum number of letters in a ticker
pub const MAX_LEN: usize = 5;

/// A ticker symbol matching `^[A-Z]{2,5}$`
///
/// The only way to obtain a `Ticker` is through [`Ticker::parse`], so holding
/// one is proof that validation already happened.
///
/// # Example
///
/// ```
/// use research_core::Ticker;
///
/// let ticker = Ticker::parse(" aapl ").unwrap();
/// assert_eq!(ticker.as_str(), "AAPL");
/// assert!(Ticker::parse("A").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalize (trim, uppercase) and validate a candidate symbol
    pub fn parse(raw: &str) -> Result<Self> {
        let candidate = raw.trim().to_ascii_uppercase();
        if is_valid_symbol(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(Error::Validation(format!(
                "'{}' is not a 2-5 letter ticker symbol",
                raw.trim()
            )))
        }
    }

    /// The symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The authoritative ticker predicate: 2 to 5 ASCII uppercase letters
pub fn is_valid_symbol(candidate: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&candidate.len())
        && candidate.bytes().all(|b| b.is_ascii_uppercase())
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ticker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_symbols() {
        for raw in ["AA", "AAPL", "GOOGL", "msft", "  nvda\n"] {
            let ticker = Ticker::parse(raw).unwrap();
            assert!(is_valid_symbol(ticker.as_str()));
        }
    }

    #[test]
    fn test_invalid_symbols() {
        for raw in ["", "A", "TOOLONG", "BRK.B", "AB1", "UNKNOWN", "   ", "ÄÖÜ"] {
            let err = Ticker::parse(raw).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_serde_validates() {
        let ticker: Ticker = serde_json::from_str("\"tsla\"").unwrap();
        assert_eq!(ticker.to_string(), "TSLA");
        assert!(serde_json::from_str::<Ticker>("\"T\"").is_err());
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"TSLA\"");
    }
}
