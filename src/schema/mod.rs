//! Schema inference from external data.
//!
//! This module derives [`crate::descriptor::TypeDescriptor`]s from data that carries its shape
//! only implicitly, compiles them and fills instances, so untyped input can be consumed through
//! synthesized objects.
//!
//! # Sources
//!
//! - [`tabular`]: column schemas of a [`DataTable`] or a forward-only [`DataReader`]; reader
//!   types implement [`load_record`] and can be combined with capabilities and a base type
//! - [`document`]: JSON and XML trees, one nested type per nested object
//! - [`pivot`]: key/row/value records spread into one property per distinct key
//!
//! # Examples
//!
//! ```rust
//! use typeforge::prelude::*;
//!
//! let mut table = DataTable::named("Orders");
//! table
//!     .add_column(ColumnSchema::new("Id", TypeSig::I4).allow_null(false))
//!     .add_column(ColumnSchema::new("Customer", TypeSig::String));
//! table.add_row(vec![Value::from(1), Value::from("ada")])?;
//!
//! let rows = table.to_objects(&Synthesizer::with_default_host())?;
//! assert_eq!(rows[0].get("Customer")?, Value::from("ada"));
//! # Ok::<(), typeforge::Error>(())
//! ```

pub mod document;
pub mod pivot;
pub mod tabular;

pub use document::{
    document_to_object, infer_document, json_to_object, xml_to_object, DocValue,
};
pub use pivot::{infer_pivot, pivot, pivot_row, PivotSpec};
pub use tabular::{
    infer_reader, load_record, reader_to_objects, ColumnSchema, DataReader, DataTable,
    TableReader,
};
