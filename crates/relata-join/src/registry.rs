//! Provider registry: computed-relation name -> function kind.
//!
//! The query compiler looks names up here to instantiate
//! [`ComputedConstraint`]s. Names are unique for the registry's lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::computed::{ComputedConstraint, Function};
use crate::error::{JoinError, Result};
use crate::mapping::CallSite;

#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Function>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, function: impl Function + 'static) -> Result<()> {
        self.register_shared(name, Arc::new(function))
    }

    pub fn register_shared(&mut self, name: impl Into<String>, function: Arc<dyn Function>) -> Result<()> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(JoinError::DuplicateProvider(name));
        }
        debug!(provider = %name, kind = function.signature().kind, "registered provider");
        self.providers.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.providers.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build the constraint for one occurrence of `name` in a query.
    pub fn instantiate(&self, name: &str, call: &CallSite) -> Result<ComputedConstraint> {
        let function = self
            .providers
            .get(name)
            .ok_or_else(|| JoinError::UnknownProvider(name.to_string()))?;
        ComputedConstraint::new(name, Arc::clone(function), call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computed::Outcome;
    use crate::mapping::{Arguments, AttributeMapping, Signature};
    use crate::proposal::Rows;
    use crate::value::{Term, Value};

    #[derive(Debug)]
    struct Echo {
        signature: Signature,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                signature: Signature::single_output("echo", AttributeMapping::positional(Some(1))),
            }
        }
    }

    impl Function for Echo {
        fn signature(&self) -> &Signature {
            &self.signature
        }

        fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome> {
            for value in args.positional().flatten() {
                out.push(value.clone());
            }
            Ok(Outcome::Produced)
        }
    }

    #[test]
    fn names_are_unique() -> anyhow::Result<()> {
        let mut registry = ProviderRegistry::new();
        registry.register("echo", Echo::new())?;
        let err = registry.register("echo", Echo::new()).unwrap_err();
        assert!(matches!(err, JoinError::DuplicateProvider(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn instantiate_resolves_call_sites() -> anyhow::Result<()> {
        let mut registry = ProviderRegistry::new();
        registry.register("echo", Echo::new())?;

        let call = CallSite::new()
            .positional(Term::constant(Value::from("x")))
            .positional_output(Term::var(0));
        let constraint = registry.instantiate("echo", &call)?;
        assert_eq!(constraint.function().signature().kind, "echo");

        assert!(matches!(
            registry.instantiate("missing", &call),
            Err(JoinError::UnknownProvider(_))
        ));
        Ok(())
    }
}
