//! Text functions: one output row per call, except `find` (one row per match)
//! and `char-at` (none when out of range).
//!
//! Text arguments accept any value and read its display form, so
//! `length(42)` is `2`. Offsets count characters, not bytes.

use relata_join::{
    Arguments, Attribute, AttributeMapping, Function, Outcome, Result, Rows, Signature, Value,
};

/// Display form of an argument, `None` when it was not given.
pub(crate) fn display(args: &Arguments<'_>, name: &str) -> Result<Option<String>> {
    Ok(args.get(name)?.map(ToString::to_string))
}

fn text_only(kind: &'static str) -> Signature {
    Signature::single_output(kind, AttributeMapping::named(&[Attribute::required("text")]))
}

macro_rules! require {
    ($value:expr) => {
        match $value {
            Some(value) => value,
            None => return Ok(Outcome::Unrepresentable),
        }
    };
}

/// `concat(a, b, ...)`: every argument's display form, joined.
#[derive(Debug)]
pub struct Concat {
    signature: Signature,
}

impl Concat {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output("concat", AttributeMapping::positional(None)),
        }
    }
}

impl Default for Concat {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for Concat {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let joined: String = args.positional().flatten().map(ToString::to_string).collect();
        out.push(Value::from(joined));
        Ok(Outcome::Produced)
    }
}

/// Replaces the first occurrence of `subtext`.
#[derive(Debug)]
pub struct Replace {
    signature: Signature,
}

impl Replace {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output(
                "replace",
                AttributeMapping::named(&[
                    Attribute::required("text"),
                    Attribute::required("subtext"),
                    Attribute::required("with"),
                ]),
            ),
        }
    }
}

impl Default for Replace {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for Replace {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        let subtext = require!(display(args, "subtext")?);
        let with = require!(display(args, "with")?);
        out.push(Value::from(text.replacen(&subtext, &with, 1)));
        Ok(Outcome::Produced)
    }
}

#[derive(Debug)]
pub struct Length {
    signature: Signature,
}

impl Length {
    pub fn new() -> Self {
        Self {
            signature: text_only("length"),
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for Length {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        out.push(Value::from(text.chars().count()));
        Ok(Outcome::Produced)
    }
}

/// 0-based character at `index`.
#[derive(Debug)]
pub struct CharAt {
    signature: Signature,
}

impl CharAt {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output(
                "char-at",
                AttributeMapping::named(&[Attribute::required("text"), Attribute::required("index")]),
            ),
        }
    }
}

impl Default for CharAt {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for CharAt {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        let index = require!(args.get("index")?.and_then(Value::as_index));
        let found = usize::try_from(index)
            .ok()
            .and_then(|i| text.chars().nth(i));
        if let Some(c) = found {
            out.push(Value::from(c.to_string()));
        }
        Ok(Outcome::Produced)
    }
}

/// Every 0-based character offset where `subtext` starts, overlapping
/// matches included. Case-insensitive unless `case-sensitive` is truthy.
#[derive(Debug)]
pub struct Find {
    signature: Signature,
}

impl Find {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output(
                "find",
                AttributeMapping::named(&[
                    Attribute::required("text"),
                    Attribute::required("subtext"),
                    Attribute::optional("case-sensitive"),
                ]),
            ),
        }
    }
}

impl Default for Find {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for Find {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let mut text = require!(display(args, "text")?);
        let mut subtext = require!(display(args, "subtext")?);
        let case_sensitive = args.get("case-sensitive")?.is_some_and(Value::is_truthy);
        if !case_sensitive {
            text = text.to_lowercase();
            subtext = subtext.to_lowercase();
        }

        let haystack: Vec<char> = text.chars().collect();
        let needle: Vec<char> = subtext.chars().collect();
        for start in 0..haystack.len() {
            let end = (start + needle.len()).min(haystack.len());
            if haystack[start..end] == needle[..] {
                out.push(Value::from(start));
            }
        }
        Ok(Outcome::Produced)
    }
}

/// Characters in `[from, to)`. Both bounds clamp to the text and swap when
/// reversed; `to` defaults to the end.
#[derive(Debug)]
pub struct Substring {
    signature: Signature,
}

impl Substring {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output(
                "substring",
                AttributeMapping::named(&[
                    Attribute::required("text"),
                    Attribute::required("from"),
                    Attribute::optional("to"),
                ]),
            ),
        }
    }
}

impl Default for Substring {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for Substring {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        let chars = text.chars().count() as i64;
        let from = require!(args.get("from")?.and_then(Value::as_index));
        let to = match args.get("to")? {
            Some(value) => require!(value.as_index()),
            None => chars,
        };
        let (mut start, mut end) = (from.clamp(0, chars), to.clamp(0, chars));
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let slice: String = text
            .chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect();
        out.push(Value::from(slice));
        Ok(Outcome::Produced)
    }
}

/// A one-argument text transform: `lower`, `upper`, `trim`.
#[derive(Debug)]
pub struct TextMap {
    signature: Signature,
    map: fn(&str) -> String,
}

impl TextMap {
    pub fn new(kind: &'static str, map: fn(&str) -> String) -> Self {
        Self {
            signature: text_only(kind),
            map,
        }
    }

    pub fn lower() -> Self {
        Self::new("lower", str::to_lowercase)
    }

    pub fn upper() -> Self {
        Self::new("upper", str::to_uppercase)
    }

    pub fn trim() -> Self {
        Self::new("trim", |s| s.trim().to_string())
    }
}

impl Function for TextMap {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        out.push(Value::from((self.map)(&text)));
        Ok(Outcome::Produced)
    }
}

#[derive(Debug)]
pub struct StartsWith {
    signature: Signature,
}

impl StartsWith {
    pub fn new() -> Self {
        Self {
            signature: Signature::single_output(
                "starts-with",
                AttributeMapping::named(&[Attribute::required("text"), Attribute::required("with")]),
            ),
        }
    }
}

impl Default for StartsWith {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for StartsWith {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
        let text = require!(display(args, "text")?);
        let prefix = require!(display(args, "with")?);
        out.push(Value::from(text.starts_with(prefix.as_str())));
        Ok(Outcome::Produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &dyn Function, values: Vec<Option<Value>>) -> Result<(Outcome, Vec<Vec<Value>>)> {
        let signature = function.signature();
        let mut rows = Rows::new(signature.output_width());
        let outcome = function.apply(&Arguments::new(signature, &values), &mut rows)?;
        Ok((outcome, rows.to_vecs()))
    }

    fn single(function: &dyn Function, values: Vec<Option<Value>>) -> Result<Vec<Value>> {
        Ok(call(function, values)?.1.into_iter().flatten().collect())
    }

    fn some(v: impl Into<Value>) -> Option<Value> {
        Some(v.into())
    }

    #[test]
    fn concat_joins_display_forms() -> Result<()> {
        assert_eq!(single(&Concat::new(), vec![some("ab"), some("cd")])?, vec![Value::from("abcd")]);
        assert_eq!(single(&Concat::new(), vec![some("n"), some(3i64)])?, vec![Value::from("n3")]);
        Ok(())
    }

    #[test]
    fn replace_touches_the_first_occurrence() -> Result<()> {
        let out = single(&Replace::new(), vec![some("a-b-c"), some("-"), some("+")])?;
        assert_eq!(out, vec![Value::from("a+b-c")]);
        Ok(())
    }

    #[test]
    fn length_counts_characters() -> Result<()> {
        assert_eq!(single(&Length::new(), vec![some("héllo")])?, vec![Value::from(5i64)]);
        Ok(())
    }

    #[test]
    fn char_at_out_of_range_is_empty() -> Result<()> {
        assert_eq!(single(&CharAt::new(), vec![some("abc"), some(1i64)])?, vec![Value::from("b")]);
        assert!(single(&CharAt::new(), vec![some("abc"), some(3i64)])?.is_empty());
        assert!(single(&CharAt::new(), vec![some("abc"), some(-1i64)])?.is_empty());
        let (outcome, _) = call(&CharAt::new(), vec![some("abc"), some(1.5)])?;
        assert_eq!(outcome, Outcome::Unrepresentable);
        Ok(())
    }

    #[test]
    fn find_reports_overlapping_offsets() -> Result<()> {
        let find = Find::new();
        assert_eq!(
            single(&find, vec![some("banana"), some("an"), some(false)])?,
            vec![Value::from(1i64), Value::from(3i64)]
        );
        assert_eq!(
            single(&find, vec![some("aaa"), some("aa"), None])?,
            vec![Value::from(0i64), Value::from(1i64)]
        );
        assert_eq!(single(&find, vec![some("BaNaNa"), some("an"), None])?.len(), 2);
        assert!(single(&find, vec![some("BaNaNa"), some("an"), some(true)])?.is_empty());
        Ok(())
    }

    #[test]
    fn substring_clamps_and_swaps() -> Result<()> {
        let substring = Substring::new();
        assert_eq!(single(&substring, vec![some("hello"), some(1i64), some(3i64)])?, vec![Value::from("el")]);
        assert_eq!(single(&substring, vec![some("hello"), some(3i64), some(1i64)])?, vec![Value::from("el")]);
        assert_eq!(single(&substring, vec![some("hello"), some(-4i64), some(99i64)])?, vec![Value::from("hello")]);
        assert_eq!(single(&substring, vec![some("hello"), some(2i64), None])?, vec![Value::from("llo")]);
        Ok(())
    }

    #[test]
    fn text_maps() -> Result<()> {
        assert_eq!(single(&TextMap::lower(), vec![some("MiXed")])?, vec![Value::from("mixed")]);
        assert_eq!(single(&TextMap::upper(), vec![some("MiXed")])?, vec![Value::from("MIXED")]);
        assert_eq!(single(&TextMap::trim(), vec![some("  pad ")])?, vec![Value::from("pad")]);
        Ok(())
    }

    #[test]
    fn starts_with_returns_a_bool() -> Result<()> {
        assert_eq!(single(&StartsWith::new(), vec![some("prefix"), some("pre")])?, vec![Value::from(true)]);
        assert_eq!(single(&StartsWith::new(), vec![some("prefix"), some("fix")])?, vec![Value::from(false)]);
        Ok(())
    }
}
