//! Job specification interpretation
//!
//! Key features:
//! - Seeds canonicalized with the job's own canonicalization policies
//! - Whole-URL mapping rules with a small output expression language
//! - Exclusion regexes checked after mapping
//! - Rescan interval helpers and dechromed/chromed content modes

pub mod errors;
mod filter_spec;
mod mapping;
pub mod specification;

pub use errors::{FilterError, FilterResult};
pub use filter_spec::{ChromedMode, DechromedMode, FilterSpec, FilterSpecBuilder};
pub use mapping::{MappingRule, MappingRules};
pub use specification::{Specification, SpecificationNode};
