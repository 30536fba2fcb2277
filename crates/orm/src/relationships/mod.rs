//! Relationships - relation definitions, path parsing and join resolution

pub mod metadata;
pub mod path;
pub mod resolver;

pub use metadata::{RelationDef, Relations, RelationshipType};
pub use path::{RelationPath, RelationStep};
pub use resolver::{add_join, find, find_inverse, resolve_path, JoinOutcome, JoinTarget};
