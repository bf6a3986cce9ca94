//! Runtime SQL compilation: condition trees, immutable query specs, SQL
//! dialect flavors, and the statement builder.
//!
//! The builder is the only place SQL text is assembled. It emits
//! placeholders for every bound value, never literals, and guarantees the
//! parameter list matches the placeholders one-to-one in order.

pub mod builder;
pub mod condition;
pub mod dialect;
pub mod spec;

#[doc(inline)]
pub use builder::{BuiltBatch, BuiltStatement, SqlBuilder};
#[doc(inline)]
pub use condition::{col, Col, Condition};
#[doc(inline)]
pub use dialect::Dialect;
#[doc(inline)]
pub use spec::{Order, QuerySpec};
