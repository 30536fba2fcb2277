//! Query Builder Module - clause accumulation and SQL compilation
//!
//! Model instances translate their fluent calls into qualified fragments and
//! hand them to a [`QueryBuilder`]; the builder knows nothing about models.

pub mod builder;
pub mod field_names;
pub mod joins;
pub mod ordering;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use field_names::{add_table_name, add_table_names};
pub use types::{Condition, Connective, FuncArg, JoinClause, JoinType, LikeSide, OrderDirection, WhereClause};
