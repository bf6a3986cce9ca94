//! Entity metadata: declarative schemas, validated descriptors, and the
//! process-wide descriptor cache.
//!
//! A record type supplies a [`TableMeta`] through [`Record::schema`]; the
//! [`DescriptorRegistry`] turns it into a validated, immutable
//! [`EntityDescriptor`] exactly once per type and shares it from then on.

pub mod descriptor;
pub mod meta;
pub mod naming;
pub mod registry;
pub mod traits;

#[doc(inline)]
pub use descriptor::{ColumnBinding, EntityDescriptor};
#[doc(inline)]
pub use meta::{ColumnMeta, ColumnType, TableMeta};
#[doc(inline)]
pub use naming::NamingStrategy;
#[doc(inline)]
pub use registry::DescriptorRegistry;
#[doc(inline)]
pub use traits::Record;
