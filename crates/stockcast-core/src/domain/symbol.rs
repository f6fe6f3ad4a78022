use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 20;

/// Ticker symbol as requested by the caller.
///
/// Casing is preserved: `aapl` and `AAPL` are distinct symbols and derive
/// distinct cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let len = trimmed.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        // Index tickers (^GSPC), FX pairs (EURUSD=X) and share classes (BRK-B, BF.B).
        for (index, ch) in trimmed.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '^' | '=');
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
