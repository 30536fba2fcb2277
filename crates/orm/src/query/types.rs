//! Query Builder Types - Core types and enums for query building

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean connective placed in front of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => write!(f, "AND"),
            Connective::Or => write!(f, "OR"),
        }
    }
}

/// Where the wildcard goes in a LIKE pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    Before,
    After,
    #[default]
    Both,
}

impl LikeSide {
    pub(crate) fn wrap(self, escaped: &str) -> String {
        match self {
            LikeSide::Before => format!("%{}", escaped),
            LikeSide::After => format!("{}%", escaped),
            LikeSide::Both => format!("%{}%", escaped),
        }
    }
}

/// A single entry of the WHERE (or HAVING) accumulation
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`, or `column <op> value` when the column carries its own
    /// operator. A missing value compares against NULL.
    Compare {
        column: String,
        value: Option<Value>,
        escape: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        not: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        not: bool,
    },
    Like {
        column: String,
        value: String,
        side: LikeSide,
        not: bool,
        case_insensitive: bool,
    },
    Raw(String),
    GroupOpen {
        not: bool,
    },
    GroupClose,
}

/// Where clause entry with its connective
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub connective: Connective,
    pub condition: Condition,
}

impl WhereClause {
    pub fn new(connective: Connective, condition: Condition) -> Self {
        Self {
            connective,
            condition,
        }
    }

    pub fn is_group_open(&self) -> bool {
        matches!(self.condition, Condition::GroupOpen { .. })
    }

    pub fn is_group_close(&self) -> bool {
        matches!(self.condition, Condition::GroupClose)
    }
}

/// Join types
#[derive(Debug, Clone, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT OUTER JOIN"),
            JoinType::Right => write!(f, "RIGHT OUTER JOIN"),
            JoinType::Full => write!(f, "FULL OUTER JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub on_conditions: Vec<(String, String)>, // (left_column, right_column)
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
    Random,
}

impl OrderDirection {
    /// Parse a direction as written in model descriptors, case-insensitive
    pub fn parse(direction: &str) -> Option<Self> {
        match direction.trim().to_lowercase().as_str() {
            "asc" => Some(OrderDirection::Asc),
            "desc" => Some(OrderDirection::Desc),
            "random" => Some(OrderDirection::Random),
            _ => None,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
            OrderDirection::Random => write!(f, "RANDOM()"),
        }
    }
}

/// Argument of an SQL function call built by `select_func`
#[derive(Debug, Clone, PartialEq)]
pub enum FuncArg {
    /// A field of the current model, qualified with its alias
    Field(String),
    /// A literal value, escaped by the storage engine
    Literal(Value),
    /// Passed through untouched
    Raw(String),
}
