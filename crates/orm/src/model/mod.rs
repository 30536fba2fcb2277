//! Model System - model instances and the operations chained on them
//!
//! - `instance`: field storage, the result collection, flags and labels
//! - `query_methods`: plain clauses against the model's own table
//! - `related`: related objects, relation paths and subqueries
//! - `fetch`: compiling and running the pending query

pub mod fetch;
pub mod instance;
pub mod query_methods;
pub mod related;

pub use fetch::ResultIter;
pub use instance::{InstanceFlags, Instantiation, ModelInstance, ParentLink, Property, ResultKey};
