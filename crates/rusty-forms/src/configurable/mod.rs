//! Declarative configuration: payloads, typed parameters, overload
//! resolution and the per-variant method registries.

pub mod method;
pub mod param;
pub mod value;

pub use method::{Configurable, ConfigurableMethod, MethodTable, OrderedEntry, Override, ORDERED_KEY};
pub use param::{Arg, Args, Param, ParamKind};
pub use value::ConfigValue;
