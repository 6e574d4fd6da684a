//! Relata providers: the built-in computed relations.
//!
//! Each provider is a stateless [`relata_join::Function`] with a static
//! signature. [`default_registry`] registers all of them under their query
//! names:
//!
//! - text: `concat`, `replace`, `length`, `char-at`, `find`, `substring`,
//!   `lower`, `upper`, `starts-with`, `trim`
//! - `split`: tokens with their 1-based positions
//! - `convert`: text <-> number

pub mod convert;
pub mod split;
pub mod text;

use relata_join::{ProviderRegistry, Result};
use tracing::debug;

pub use convert::Convert;
pub use split::Split;
pub use text::{CharAt, Concat, Find, Length, Replace, StartsWith, Substring, TextMap};

/// Register every built-in provider. Fails if a name is already taken.
pub fn register_string_providers(registry: &mut ProviderRegistry) -> Result<()> {
    registry.register("trim", TextMap::trim())?;
    registry.register("starts-with", StartsWith::new())?;
    registry.register("upper", TextMap::upper())?;
    registry.register("lower", TextMap::lower())?;
    registry.register("find", Find::new())?;
    registry.register("char-at", CharAt::new())?;
    registry.register("replace", Replace::new())?;
    registry.register("length", Length::new())?;
    registry.register("concat", Concat::new())?;
    registry.register("split", Split::new())?;
    registry.register("substring", Substring::new())?;
    registry.register("convert", Convert::new())?;
    debug!(providers = registry.len(), "string providers registered");
    Ok(())
}

pub fn default_registry() -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    register_string_providers(&mut registry)?;
    Ok(registry)
}
