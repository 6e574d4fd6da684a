//! Relata join kernel: worst-case optimal generic join over stored facts and
//! computed relations.
//!
//! A compiled query is a list of constraints over a fixed, global variable
//! order. The driver binds one variable at a time, asking every applicable
//! constraint for a [`Proposal`] and enumerating from the most selective one,
//! so no step materializes more candidates than the tightest constraint
//! allows.
//!
//! Key pieces:
//! 1. **Prefix**: the partial binding, extended and truncated only by the driver
//! 2. **Attribute mappings**: static name -> position tables per constraint kind
//! 3. **Constraints**: fact patterns (backed by [`FactIndex`]) and computed
//!    relations (backed by a [`Function`]) behind one trait
//! 4. **Proposals**: one reusable buffer per constraint instance
//! 5. **Registry**: computed-relation names -> function kinds
//! 6. **Driver**: [`GenericJoin`], an explicit-stack backtracking search
//!
//! ## Failure model
//!
//! A branch that cannot be extended, including a value outside a function's
//! domain, is a zero-cardinality proposal. [`JoinError`] is reserved for
//! faults in the compiled query or in a constraint implementation.

pub mod computed;
pub mod config;
pub mod constraint;
pub mod error;
pub mod index;
pub mod join;
pub mod mapping;
pub mod pattern;
pub mod prefix;
pub mod proposal;
pub mod registry;
pub mod value;

pub use computed::{ComputedConstraint, Function, Mode, Outcome};
pub use config::JoinConfig;
pub use constraint::Constraint;
pub use error::{JoinError, Result};
pub use index::{FactId, FactIndex, Position, ValueId, ValueInterner};
pub use join::{GenericJoin, JoinStats};
pub use mapping::{Arguments, Attribute, AttributeMapping, CallSite, ResolvedSlots, Signature, Slot};
pub use pattern::FactPattern;
pub use prefix::Prefix;
pub use proposal::{Proposal, ProposalState, Rows};
pub use registry::ProviderRegistry;
pub use value::{format_number, Term, Value, Variable};
