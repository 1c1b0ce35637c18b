pub mod orders;
pub mod promotions;

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{de, Deserialize, Deserializer};

/// Clients send amounts either as JSON numbers or as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum DecimalInput {
    Number(serde_json::Number),
    Text(String),
}

/// Reads a number or a numeric string into a `BigDecimal` without going
/// through `f64`.
pub(crate) fn decimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match DecimalInput::deserialize(deserializer)? {
        DecimalInput::Number(n) => n.to_string(),
        DecimalInput::Text(s) => s,
    };
    BigDecimal::from_str(raw.trim())
        .map_err(|_| de::Error::custom(format!("invalid decimal '{raw}'")))
}
