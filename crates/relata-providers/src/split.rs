//! `split(text, by) -> (token, index)`: one row per token, with a 1-based
//! index. Queried for both outputs it enumerates pairs; for either one it
//! enumerates that column.

use relata_join::{
    Arguments, Attribute, AttributeMapping, Function, Outcome, Result, Rows, Signature, Value,
};

use crate::text::display;

#[derive(Debug)]
pub struct Split {
    signature: Signature,
}

impl Split {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(
                "split",
                AttributeMapping::named(&[Attribute::required("text"), Attribute::required("by")]),
                AttributeMapping::named(&[Attribute::optional("token"), Attribute::optional("index")]),
            ),
        }
    }
}

impl Default for Split {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokens of `text`; an empty separator splits into characters.
pub fn tokens<'a>(text: &'a str, by: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
    if by.is_empty() {
        Box::new(text.chars().map(String::from))
    } else {
        Box::new(text.split(by).map(str::to_string))
    }
}

impl Function for Split {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let (Some(text), Some(by)) = (display(args, "text")?, display(args, "by")?) else {
            return Ok(Outcome::Unrepresentable);
        };
        for (position, token) in tokens(&text, &by).enumerate() {
            out.push_row([Value::from(token), Value::from(position + 1)]);
        }
        Ok(Outcome::Produced)
    }
}
