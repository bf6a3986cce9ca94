//! Condition expression trees.
//!
//! A [`Condition`] is a small tree of leaf predicates combined by AND/OR.
//! Leaves reference columns by name; the builder resolves those names
//! against the entity descriptor before any SQL is produced, so a typo is
//! a mapping error, never injectable text.
//!
//! The fluent entry point is [`col`]:
//!
//! ```
//! use fluentdb::sql::col;
//!
//! let cond = col("status").eq("active").and(col("age").ge(21));
//! ```

use crate::value::{IntoValue, Value};

/// A node in a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Like(String, String),
    NotLike(String, String),
    /// `IN` with zero values matches no rows by definition.
    In(String, Vec<Value>),
    /// `NOT IN` with zero values matches every row by definition.
    NotIn(String, Vec<Value>),
    Between(String, Value, Value),
    NotBetween(String, Value, Value),
    IsNull(String),
    IsNotNull(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Conjunction of two conditions. Flattens nested ANDs.
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut children) => {
                children.push(other);
                Condition::And(children)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    /// Disjunction of two conditions. Flattens nested ORs.
    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Or(mut children) => {
                children.push(other);
                Condition::Or(children)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    /// Conjunction of a list of conditions.
    pub fn all(conditions: Vec<Condition>) -> Condition {
        Condition::And(conditions)
    }

    /// Disjunction of a list of conditions.
    pub fn any(conditions: Vec<Condition>) -> Condition {
        Condition::Or(conditions)
    }

    /// Number of bound values this tree will contribute, in left-to-right
    /// order. Leaf arity is structural: `Between` always binds two,
    /// `IsNull` none, `In` one per listed value.
    pub fn value_count(&self) -> usize {
        match self {
            Condition::Eq(_, _)
            | Condition::Ne(_, _)
            | Condition::Gt(_, _)
            | Condition::Ge(_, _)
            | Condition::Lt(_, _)
            | Condition::Le(_, _)
            | Condition::Like(_, _)
            | Condition::NotLike(_, _) => 1,
            Condition::In(_, values) | Condition::NotIn(_, values) => values.len(),
            Condition::Between(_, _, _) | Condition::NotBetween(_, _, _) => 2,
            Condition::IsNull(_) | Condition::IsNotNull(_) => 0,
            Condition::And(children) | Condition::Or(children) => {
                children.iter().map(Condition::value_count).sum()
            }
        }
    }
}

/// Start a leaf predicate on a column.
pub fn col(name: impl Into<String>) -> Col {
    Col(name.into())
}

/// A column reference awaiting its predicate.
#[derive(Debug, Clone)]
pub struct Col(String);

impl Col {
    pub fn eq(self, value: impl IntoValue) -> Condition {
        Condition::Eq(self.0, value.into_value())
    }

    pub fn ne(self, value: impl IntoValue) -> Condition {
        Condition::Ne(self.0, value.into_value())
    }

    pub fn gt(self, value: impl IntoValue) -> Condition {
        Condition::Gt(self.0, value.into_value())
    }

    pub fn ge(self, value: impl IntoValue) -> Condition {
        Condition::Ge(self.0, value.into_value())
    }

    pub fn lt(self, value: impl IntoValue) -> Condition {
        Condition::Lt(self.0, value.into_value())
    }

    pub fn le(self, value: impl IntoValue) -> Condition {
        Condition::Le(self.0, value.into_value())
    }

    pub fn like(self, pattern: impl Into<String>) -> Condition {
        Condition::Like(self.0, pattern.into())
    }

    pub fn not_like(self, pattern: impl Into<String>) -> Condition {
        Condition::NotLike(self.0, pattern.into())
    }

    pub fn is_in<V: IntoValue>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::In(
            self.0,
            values.into_iter().map(IntoValue::into_value).collect(),
        )
    }

    pub fn not_in<V: IntoValue>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::NotIn(
            self.0,
            values.into_iter().map(IntoValue::into_value).collect(),
        )
    }

    pub fn between(self, low: impl IntoValue, high: impl IntoValue) -> Condition {
        Condition::Between(self.0, low.into_value(), high.into_value())
    }

    pub fn not_between(self, low: impl IntoValue, high: impl IntoValue) -> Condition {
        Condition::NotBetween(self.0, low.into_value(), high.into_value())
    }

    pub fn is_null(self) -> Condition {
        Condition::IsNull(self.0)
    }

    pub fn is_not_null(self) -> Condition {
        Condition::IsNotNull(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_leaves() {
        assert_eq!(
            col("name").eq("Ada"),
            Condition::Eq("name".to_string(), Value::Text("Ada".to_string()))
        );
        assert_eq!(
            col("age").between(18, 65),
            Condition::Between("age".to_string(), Value::Int(18), Value::Int(65))
        );
        assert_eq!(col("deleted").is_null(), Condition::IsNull("deleted".to_string()));
    }

    #[test]
    fn test_and_flattens() {
        let cond = col("a").eq(1).and(col("b").eq(2)).and(col("c").eq(3));
        match cond {
            Condition::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_or_does_not_flatten_into_and() {
        let cond = col("a").eq(1).and(col("b").eq(2)).or(col("c").eq(3));
        match cond {
            Condition::Or(children) => assert_eq!(children.len(), 2),
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_value_count() {
        assert_eq!(col("a").eq(1).value_count(), 1);
        assert_eq!(col("a").between(1, 2).value_count(), 2);
        assert_eq!(col("a").is_in(vec![1, 2, 3]).value_count(), 3);
        assert_eq!(col("a").is_in(Vec::<i32>::new()).value_count(), 0);
        assert_eq!(col("a").is_null().value_count(), 0);

        let tree = col("a").eq(1).and(col("b").is_in(vec![2, 3]).or(col("c").is_null()));
        assert_eq!(tree.value_count(), 3);
    }
}
