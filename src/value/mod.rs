//! Dynamic value model shared by the SQL builder, the session boundary,
//! and the result mapper.
//!
//! [`Value`] is the single runtime representation of a bound parameter or a
//! result cell. [`IntoValue`] converts Rust field types into it and
//! [`FromValue`] extracts them back out, applying the fixed coercion table
//! (numeric widening, temporal parsing, never narrowing or silent defaults).

pub mod from_value;
pub mod types;

#[doc(inline)]
pub use from_value::{coerce_to_column_type, CoercionError, FromValue};
#[doc(inline)]
pub use types::{IntoValue, Value};
