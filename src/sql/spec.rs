//! Immutable query specifications.
//!
//! A [`QuerySpec`] captures conditions, ordering, and paging for one
//! operation. Every fluent method consumes the spec and returns a new
//! value, so a spec held across branches can never be mutated through an
//! alias. The spec is consumed exactly once by the builder.

use crate::sql::condition::Condition;

/// Ordering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Conditions, ordering, and paging for one statement.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub(crate) condition: Option<Condition>,
    pub(crate) order: Vec<(String, Order)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, AND-composed with any existing one.
    pub fn filter(self, condition: Condition) -> Self {
        let condition = match self.condition {
            Some(existing) => existing.and(condition),
            None => condition,
        };
        Self {
            condition: Some(condition),
            ..self
        }
    }

    /// Append an ordering key.
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(self, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn offset(self, offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..self
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub(crate) fn has_paging(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::condition::col;

    #[test]
    fn test_filter_accumulates_with_and() {
        let spec = QuerySpec::new().filter(col("a").eq(1)).filter(col("b").eq(2));
        match spec.condition() {
            Some(Condition::And(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected And condition, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_returns_new_values() {
        let base = QuerySpec::new().filter(col("a").eq(1));
        let limited = base.clone().limit(10);
        // The original spec is unaffected by the branch.
        assert_eq!(base.limit, None);
        assert_eq!(limited.limit, Some(10));
    }

    #[test]
    fn test_ordering_preserves_insertion_order() {
        let spec = QuerySpec::new()
            .order_by("a", Order::Desc)
            .order_by("b", Order::Asc);
        assert_eq!(
            spec.order,
            vec![("a".to_string(), Order::Desc), ("b".to_string(), Order::Asc)]
        );
    }
}
