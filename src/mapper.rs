//! Maps raw result rows onto entities through their descriptors.
//!
//! Mapping is strict: a column the descriptor declares must be present in
//! the row unless the binding is nullable (a missing nullable column maps
//! to NULL, so narrower projections still load), a NULL may only land in a
//! nullable column, and values are coerced by the fixed widening rules in
//! [`crate::value`]. Every failure names the offending column. Nothing is
//! ever silently defaulted.

use crate::entity::descriptor::EntityDescriptor;
use crate::entity::traits::Record;
use crate::error::DbError;
use crate::row::Row;
use crate::value::{coerce_to_column_type, Value};

/// Maps one row to one entity.
///
/// The row is first normalized against the descriptor: each declared
/// column is looked up case-insensitively, NULL-checked, and coerced to
/// the column's declared type. The entity then loads from the normalized
/// row, so [`Record::load`] never sees an unexpected representation.
///
/// # Errors
///
/// `DbError::Mapping` for a missing non-nullable column, a NULL in a
/// non-nullable column, or a value the declared type cannot represent.
pub fn map_row<R: Record>(desc: &EntityDescriptor, row: &Row) -> Result<R, DbError> {
    let mut normalized = Vec::with_capacity(desc.columns().len());
    for binding in desc.columns() {
        let raw = match row.get_raw(&binding.column) {
            Some(raw) => raw,
            None if binding.nullable => {
                normalized.push((binding.column.clone(), Value::Null));
                continue;
            }
            None => {
                return Err(DbError::Mapping(format!(
                    "result set for table '{}' has no column '{}'",
                    desc.table(),
                    binding.column
                )))
            }
        };

        if raw.is_null() {
            if !binding.nullable {
                return Err(DbError::Mapping(format!(
                    "column '{}' of table '{}' is not nullable but the row holds NULL",
                    binding.column,
                    desc.table()
                )));
            }
            normalized.push((binding.column.clone(), Value::Null));
            continue;
        }

        let coerced = coerce_to_column_type(raw, binding.ty, binding.char_padded)
            .map_err(|e| {
                DbError::Mapping(format!(
                    "column '{}' of table '{}': {e}",
                    binding.column,
                    desc.table()
                ))
            })?;
        normalized.push((binding.column.clone(), coerced));
    }
    R::load(&Row::new(normalized))
}

/// Maps every row of a result set, failing on the first bad row.
pub fn map_all<R: Record>(desc: &EntityDescriptor, rows: &[Row]) -> Result<Vec<R>, DbError> {
    rows.iter().map(|row| map_row(desc, row)).collect()
}

/// Collapses a result set expected to hold exactly one row.
///
/// # Errors
///
/// `DbError::NotFound` on zero rows, `DbError::TooManyResults` on more
/// than one.
pub fn expect_one<R: Record>(desc: &EntityDescriptor, rows: &[Row]) -> Result<R, DbError> {
    match rows.len() {
        0 => Err(DbError::NotFound {
            table: desc.table().to_string(),
        }),
        1 => map_row(desc, &rows[0]),
        _ => Err(DbError::TooManyResults {
            table: desc.table().to_string(),
        }),
    }
}

/// Collapses a result set expected to hold at most one row.
pub fn expect_optional<R: Record>(
    desc: &EntityDescriptor,
    rows: &[Row],
) -> Result<Option<R>, DbError> {
    match rows.len() {
        0 => Ok(None),
        1 => map_row(desc, &rows[0]).map(Some),
        _ => Err(DbError::TooManyResults {
            table: desc.table().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::meta::{ColumnMeta, ColumnType, TableMeta};
    use crate::entity::naming::NamingStrategy;

    #[derive(Debug, Clone, PartialEq)]
    struct Customer {
        id: i64,
        name: String,
        age: Option<i32>,
    }

    impl Record for Customer {
        fn schema() -> TableMeta {
            TableMeta::new("Customer")
                .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
                .column(ColumnMeta::new("name", ColumnType::Text))
                .column(ColumnMeta::new("age", ColumnType::Integer).nullable())
        }

        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(Value::BigInt(self.id)),
                "name" => Some(Value::Text(self.name.clone())),
                "age" => Some(self.age.map_or(Value::Null, Value::Int)),
                _ => None,
            }
        }

        fn load(row: &Row) -> Result<Self, DbError> {
            Ok(Customer {
                id: row.get("id")?,
                name: row.get("name")?,
                age: row.get("age")?,
            })
        }
    }

    fn customer_desc() -> EntityDescriptor {
        EntityDescriptor::from_meta(&Customer::schema(), &NamingStrategy::SnakeCase).unwrap()
    }

    fn row(values: Vec<(&str, Value)>) -> Row {
        Row::new(values.into_iter().map(|(c, v)| (c.to_string(), v)).collect())
    }

    #[test]
    fn test_map_row_coerces_and_loads() {
        let mapped: Customer = map_row(
            &customer_desc(),
            &row(vec![
                ("id", Value::Int(7)),
                ("name", Value::Text("Ada".to_string())),
                ("age", Value::SmallInt(30)),
            ]),
        )
        .unwrap();
        assert_eq!(
            mapped,
            Customer {
                id: 7,
                name: "Ada".to_string(),
                age: Some(30),
            }
        );
    }

    #[test]
    fn test_missing_column_names_the_column() {
        let err = map_row::<Customer>(
            &customer_desc(),
            &row(vec![
                ("id", Value::BigInt(1)),
                ("age", Value::Int(30)),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_missing_nullable_column_maps_to_none() {
        // A projection narrower than the descriptor may drop nullable
        // columns entirely.
        let mapped: Customer = map_row(
            &customer_desc(),
            &row(vec![
                ("id", Value::BigInt(1)),
                ("name", Value::Text("A".to_string())),
            ]),
        )
        .unwrap();
        assert_eq!(mapped.age, None);
    }

    #[test]
    fn test_null_in_non_nullable_column_fails() {
        let err = map_row::<Customer>(
            &customer_desc(),
            &row(vec![
                ("id", Value::BigInt(1)),
                ("name", Value::Null),
                ("age", Value::Null),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("name"));
        assert!(err.to_string().contains("not nullable"));
    }

    #[test]
    fn test_null_in_nullable_column_maps_to_none() {
        let mapped: Customer = map_row(
            &customer_desc(),
            &row(vec![
                ("id", Value::BigInt(1)),
                ("name", Value::Text("A".to_string())),
                ("age", Value::Null),
            ]),
        )
        .unwrap();
        assert_eq!(mapped.age, None);
    }

    #[test]
    fn test_narrowing_value_is_rejected_not_truncated() {
        let err = map_row::<Customer>(
            &customer_desc(),
            &row(vec![
                ("id", Value::BigInt(1)),
                ("name", Value::Text("A".to_string())),
                ("age", Value::BigInt(i64::MAX)),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Mapping(_)));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_expect_one_cardinality() {
        let desc = customer_desc();
        let good = row(vec![
            ("id", Value::BigInt(1)),
            ("name", Value::Text("A".to_string())),
            ("age", Value::Null),
        ]);

        assert!(matches!(
            expect_one::<Customer>(&desc, &[]).unwrap_err(),
            DbError::NotFound { .. }
        ));
        assert!(expect_one::<Customer>(&desc, &[good.clone()]).is_ok());
        assert!(matches!(
            expect_one::<Customer>(&desc, &[good.clone(), good.clone()]).unwrap_err(),
            DbError::TooManyResults { .. }
        ));

        assert_eq!(expect_optional::<Customer>(&desc, &[]).unwrap(), None);
        assert!(expect_optional::<Customer>(&desc, &[good.clone()])
            .unwrap()
            .is_some());
        assert!(matches!(
            expect_optional::<Customer>(&desc, &[good.clone(), good]).unwrap_err(),
            DbError::TooManyResults { .. }
        ));
    }
}
