//! `convert(value, to) -> converted` across the text and number domains.
//!
//! Values the target domain cannot hold (`"abc"` as a number, an unknown
//! target) are unrepresentable: no rows, never an error.

use relata_join::{
    Arguments, Attribute, AttributeMapping, Function, Outcome, Result, Rows, Signature, Value,
};
use tracing::trace;

#[derive(Debug)]
pub struct Convert {
    signature: Signature,
}

impl Convert {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(
                "convert",
                AttributeMapping::named(&[Attribute::required("value"), Attribute::required("to")]),
                AttributeMapping::named(&[Attribute::optional("converted")]),
            ),
        }
    }
}

impl Default for Convert {
    fn default() -> Self {
        Self::new()
    }
}

/// `value` in the `to` domain, if it has a representation there.
pub fn convert(value: &Value, to: &str) -> Option<Value> {
    match to {
        "number" => to_number(value).map(Value::Number),
        "string" => Some(Value::from(value.to_string())),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
    };
    n.is_finite().then_some(n)
}

impl Function for Convert {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let (Some(value), Some(to)) = (args.get("value")?, args.text("to")?) else {
            return Ok(Outcome::Unrepresentable);
        };
        match convert(value, to) {
            Some(converted) => {
                out.push(converted);
                Ok(Outcome::Produced)
            }
            None => {
                trace!(%value, to, "value not representable in target domain");
                Ok(Outcome::Unrepresentable)
            }
        }
    }
}
