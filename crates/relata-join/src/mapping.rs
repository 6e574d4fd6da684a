//! Attribute mappings: named constraint parameters over positional slots.
//!
//! Each constraint kind declares, once, how its attribute names map onto
//! argument positions (and, for computed relations, output positions). A
//! query occurrence is written as a [`CallSite`] with named or positional
//! terms; [`Signature::resolve`] turns it into the positional vectors the
//! constraint evaluates against. Functions read their arguments back through
//! the named [`Arguments`] view.
//!
//! Kinds that declare no names use [`AttributeMapping::Positional`]: slots
//! pass through unchanged.

use ahash::AHashMap;

use crate::error::{JoinError, Result};
use crate::value::{Term, Value};

/// One declared attribute. Its position is its place in the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub required: bool,
}

impl Attribute {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AttributeMapping {
    /// Identity mapping. `arity: None` accepts any number of slots.
    Positional { arity: Option<usize> },
    Named {
        attributes: Vec<Attribute>,
        by_name: AHashMap<&'static str, usize>,
    },
}

impl AttributeMapping {
    pub fn positional(arity: Option<usize>) -> Self {
        AttributeMapping::Positional { arity }
    }

    pub fn named(attributes: &[Attribute]) -> Self {
        let mut by_name = AHashMap::with_capacity(attributes.len());
        for (index, attr) in attributes.iter().enumerate() {
            let previous = by_name.insert(attr.name, index);
            debug_assert!(previous.is_none(), "duplicate attribute `{}`", attr.name);
        }
        AttributeMapping::Named {
            attributes: attributes.to_vec(),
            by_name,
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        match self {
            AttributeMapping::Positional { .. } => None,
            AttributeMapping::Named { by_name, .. } => by_name.get(name).copied(),
        }
    }

    /// Number of slots, when fixed.
    pub fn width(&self) -> Option<usize> {
        match self {
            AttributeMapping::Positional { arity } => *arity,
            AttributeMapping::Named { attributes, .. } => Some(attributes.len()),
        }
    }

    fn resolve(
        &self,
        kind: &str,
        slot: &'static str,
        slots: &[Slot],
        enforce_required: bool,
    ) -> Result<Vec<Option<Term>>> {
        match self {
            AttributeMapping::Positional { arity } => {
                if let Some(named) = slots.iter().find_map(|s| s.name.as_deref()) {
                    return Err(JoinError::UnknownAttribute {
                        kind: kind.to_string(),
                        attribute: named.to_string(),
                    });
                }
                if let Some(max) = *arity {
                    if slots.len() > max {
                        return Err(JoinError::Arity {
                            kind: kind.to_string(),
                            slot,
                            max,
                            got: slots.len(),
                        });
                    }
                }
                let width = arity.unwrap_or(slots.len()).max(slots.len());
                let mut out = vec![None; width];
                for (i, s) in slots.iter().enumerate() {
                    out[i] = Some(s.term.clone());
                }
                Ok(out)
            }
            AttributeMapping::Named {
                attributes,
                by_name,
            } => {
                let mut out: Vec<Option<Term>> = vec![None; attributes.len()];
                let mut next_positional = 0usize;
                for s in slots {
                    let index = match s.name.as_deref() {
                        Some(name) => *by_name.get(name).ok_or_else(|| {
                            JoinError::UnknownAttribute {
                                kind: kind.to_string(),
                                attribute: name.to_string(),
                            }
                        })?,
                        None => {
                            let index = next_positional;
                            next_positional += 1;
                            if index >= attributes.len() {
                                return Err(JoinError::Arity {
                                    kind: kind.to_string(),
                                    slot,
                                    max: attributes.len(),
                                    got: index + 1,
                                });
                            }
                            index
                        }
                    };
                    if out[index].is_some() {
                        return Err(JoinError::protocol(
                            kind,
                            format!("attribute `{}` given twice", attributes[index].name),
                        ));
                    }
                    out[index] = Some(s.term.clone());
                }
                if enforce_required {
                    for (attr, term) in attributes.iter().zip(&out) {
                        if attr.required && term.is_none() {
                            return Err(JoinError::MissingAttribute {
                                kind: kind.to_string(),
                                attribute: attr.name.to_string(),
                            });
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

/// The static description of a computed relation: its argument mapping and
/// its return mapping.
#[derive(Debug, Clone)]
pub struct Signature {
    pub kind: &'static str,
    pub arguments: AttributeMapping,
    pub returns: AttributeMapping,
}

impl Signature {
    pub fn new(kind: &'static str, arguments: AttributeMapping, returns: AttributeMapping) -> Self {
        Self {
            kind,
            arguments,
            returns,
        }
    }

    /// A kind with no declared return mapping produces one positional output.
    pub fn single_output(kind: &'static str, arguments: AttributeMapping) -> Self {
        Self::new(kind, arguments, AttributeMapping::positional(Some(1)))
    }

    /// Width of every output row.
    pub fn output_width(&self) -> usize {
        self.returns.width().unwrap_or(1)
    }

    pub fn resolve(&self, call: &CallSite) -> Result<ResolvedSlots> {
        let arguments = self
            .arguments
            .resolve(self.kind, "arguments", &call.arguments, true)?;
        let mut returns = self
            .returns
            .resolve(self.kind, "outputs", &call.outputs, false)?;
        let width = self.output_width();
        if returns.len() > width {
            return Err(JoinError::Arity {
                kind: self.kind.to_string(),
                slot: "outputs",
                max: width,
                got: returns.len(),
            });
        }
        returns.resize(width, None);
        Ok(ResolvedSlots { arguments, returns })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlots {
    pub arguments: Vec<Option<Term>>,
    pub returns: Vec<Option<Term>>,
}

// ============================================================================
// Call sites
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: Option<String>,
    pub term: Term,
}

/// One occurrence of a computed relation in a compiled query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    arguments: Vec<Slot>,
    outputs: Vec<Slot>,
}

impl CallSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, term: impl Into<Term>) -> Self {
        self.arguments.push(Slot {
            name: Some(name.into()),
            term: term.into(),
        });
        self
    }

    pub fn positional(mut self, term: impl Into<Term>) -> Self {
        self.arguments.push(Slot {
            name: None,
            term: term.into(),
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, term: impl Into<Term>) -> Self {
        self.outputs.push(Slot {
            name: Some(name.into()),
            term: term.into(),
        });
        self
    }

    pub fn positional_output(mut self, term: impl Into<Term>) -> Self {
        self.outputs.push(Slot {
            name: None,
            term: term.into(),
        });
        self
    }
}

// ============================================================================
// Argument view
// ============================================================================

/// Named read access to the argument values of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    signature: &'a Signature,
    values: &'a [Option<Value>],
}

impl<'a> Arguments<'a> {
    pub fn new(signature: &'a Signature, values: &'a [Option<Value>]) -> Self {
        Self { signature, values }
    }

    /// The value bound to `name`, or `None` when the optional attribute was
    /// not given. Asking for a name the kind never declared is a fault.
    pub fn get(&self, name: &str) -> Result<Option<&'a Value>> {
        let index =
            self.signature
                .arguments
                .position(name)
                .ok_or_else(|| JoinError::UnknownAttribute {
                    kind: self.signature.kind.to_string(),
                    attribute: name.to_string(),
                })?;
        Ok(self.values.get(index).and_then(Option::as_ref))
    }

    pub fn text(&self, name: &str) -> Result<Option<&'a str>> {
        Ok(self.get(name)?.and_then(Value::as_text))
    }

    /// Arguments in slot order, for identity-mapped kinds.
    pub fn positional(&self) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.values.iter().map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_signature() -> Signature {
        Signature::single_output(
            "find",
            AttributeMapping::named(&[
                Attribute::required("text"),
                Attribute::required("subtext"),
                Attribute::optional("case-sensitive"),
            ]),
        )
    }

    #[test]
    fn named_slots_land_at_declared_positions() -> anyhow::Result<()> {
        let sig = find_signature();
        let call = CallSite::new()
            .arg("subtext", Term::constant("an"))
            .arg("text", Term::var(0))
            .positional_output(Term::var(1));
        let slots = sig.resolve(&call)?;
        assert_eq!(
            slots.arguments,
            vec![Some(Term::var(0)), Some(Term::constant("an")), None]
        );
        assert_eq!(slots.returns, vec![Some(Term::var(1))]);
        Ok(())
    }

    #[test]
    fn unknown_attribute_is_a_fault() {
        let sig = find_signature();
        let call = CallSite::new()
            .arg("text", Term::var(0))
            .arg("subtext", Term::var(1))
            .arg("needle", Term::var(2));
        let err = sig.resolve(&call).unwrap_err();
        assert!(matches!(err, JoinError::UnknownAttribute { attribute, .. } if attribute == "needle"));
    }

    #[test]
    fn missing_required_attribute_is_a_fault() {
        let sig = find_signature();
        let call = CallSite::new().arg("text", Term::var(0));
        let err = sig.resolve(&call).unwrap_err();
        assert!(matches!(err, JoinError::MissingAttribute { attribute, .. } if attribute == "subtext"));
    }

    #[test]
    fn identity_mapping_passes_slots_through() -> anyhow::Result<()> {
        let sig = Signature::single_output("concat", AttributeMapping::positional(None));
        let call = CallSite::new()
            .positional(Term::constant("ab"))
            .positional(Term::var(0))
            .positional_output(Term::var(1));
        let slots = sig.resolve(&call)?;
        assert_eq!(slots.arguments.len(), 2);
        assert_eq!(slots.returns, vec![Some(Term::var(1))]);
        Ok(())
    }

    #[test]
    fn identity_mapping_rejects_names_and_extra_outputs() {
        let sig = Signature::single_output("concat", AttributeMapping::positional(None));
        let named = CallSite::new().arg("text", Term::var(0));
        assert!(matches!(
            sig.resolve(&named),
            Err(JoinError::UnknownAttribute { .. })
        ));

        let too_many = CallSite::new()
            .positional(Term::var(0))
            .positional_output(Term::var(1))
            .positional_output(Term::var(2));
        assert!(matches!(sig.resolve(&too_many), Err(JoinError::Arity { .. })));
    }

    #[test]
    fn open_return_mapping_cannot_outgrow_the_row() {
        let sig = Signature::new(
            "pairs",
            AttributeMapping::positional(None),
            AttributeMapping::positional(None),
        );
        let call = CallSite::new()
            .positional(Term::var(0))
            .positional_output(Term::var(1))
            .positional_output(Term::var(2));
        assert!(matches!(
            sig.resolve(&call),
            Err(JoinError::Arity { slot: "outputs", max: 1, got: 2, .. })
        ));
    }

    #[test]
    fn arguments_view_reads_by_name() -> anyhow::Result<()> {
        let sig = find_signature();
        let values = vec![Some(Value::from("banana")), Some(Value::from("an")), None];
        let args = Arguments::new(&sig, &values);
        assert_eq!(args.text("text")?, Some("banana"));
        assert_eq!(args.get("case-sensitive")?, None);
        assert!(args.get("haystack").is_err());
        Ok(())
    }
}
