use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units (micro-STX) per display token.
pub const MICRO_PER_TOKEN: u64 = 1_000_000;

/// Ticker shown next to display amounts.
pub const TOKEN_SYMBOL: &str = "STX";

/// Convert an on-chain minor-unit quantity into display tokens.
pub fn micro_to_tokens(micro: u64) -> f64 {
    micro as f64 / MICRO_PER_TOKEN as f64
}

/// Convert display tokens into minor units for the wallet connector.
///
/// Rounds to the nearest minor unit; negative or non-finite input yields 0.
pub fn tokens_to_micro(tokens: f64) -> u64 {
    if !tokens.is_finite() || tokens <= 0.0 {
        return 0;
    }
    (tokens * MICRO_PER_TOKEN as f64).round() as u64
}

/// Parse a minor-unit amount the explorer may encode as a string or a number.
pub fn parse_micro(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

/// How a display amount is rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denomination {
    #[default]
    Tokens,
    Micro,
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denomination::Tokens => write!(f, "{TOKEN_SYMBOL}"),
            Denomination::Micro => write!(f, "micro{TOKEN_SYMBOL}"),
        }
    }
}

/// Format a display-token amount, trimming trailing zeros.
pub fn format_amount(tokens: f64, denomination: Denomination) -> String {
    match denomination {
        Denomination::Tokens => {
            let fixed = format!("{tokens:.6}");
            let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
            format!("{trimmed} {denomination}")
        }
        Denomination::Micro => format!("{} {denomination}", tokens_to_micro(tokens)),
    }
}
