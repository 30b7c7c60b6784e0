//! Pivoted views over key/row/value records.
//!
//! A pivot groups source items by a row key and spreads them across one property per distinct
//! column key. Each output row keeps a reference to the source item of every cell it holds;
//! reading or writing a column goes through the value selectors of the [`PivotSpec`] against
//! that item, so edits on a pivot row land in the source data.
//!
//! ```text
//!  source                          pivot
//!  key  row  value                 row   c1     c2
//!  c1   1    "1/1"         =>      1     "1/1"  "2/1"
//!  c2   1    "2/1"                 2     "1/2"  "2/2"
//!  c1   2    "1/2"
//!  c2   2    "2/2"
//! ```
//!
//! Rows come out in first-appearance order of their row key, columns in first-appearance order
//! of their column key. If two items share a column and row key, the later one wins.

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::{
    codegen::{EmitScope, GetterBody, GetterGen, MethodBody, MethodGen, SetterBody, SetterGen},
    descriptor::{
        AttributeDescriptor, AttributeType, Dependency, FieldMember, Literal, MethodMember,
        PropertyMember, TypeDescriptor,
    },
    runtime::{FieldHandle, Instance, InstanceRc},
    synthesis::Synthesizer,
    typesystem::{CapabilityBuilder, CapabilityRc, TypeSig, Value},
    Error, Result,
};

/// Name of the built-in pivot row capability.
pub const PIVOT_ROW: &str = "Typeforge.IPivotRow";

/// Name of the column indexer of pivot rows.
pub const PIVOT_INDEXER: &str = "Item";

const GET: &str = "Get";
const SET: &str = "Set";
const TO_STRING: &str = "ToString";
const CELLS: &str = "_cells";

/// The capability every pivot row type implements.
///
/// `Get(key)` and `Set(key, value)` access a column by name, `Item[key]` is the indexer over
/// them and `ToString()` renders the row as `(v1, v2, ...)`.
#[must_use]
pub fn pivot_row() -> CapabilityRc {
    static PIVOT_ROW_CAPABILITY: OnceLock<CapabilityRc> = OnceLock::new();
    PIVOT_ROW_CAPABILITY
        .get_or_init(|| {
            CapabilityBuilder::new(PIVOT_ROW)
                .method(GET, TypeSig::Object, vec![TypeSig::String])
                .method(SET, TypeSig::Void, vec![TypeSig::String, TypeSig::Object])
                .indexer(PIVOT_INDEXER, TypeSig::Object, vec![TypeSig::String])
                .method(TO_STRING, TypeSig::String, vec![])
                .build()
        })
        .clone()
}

/// Extracts a key or value from a source item.
pub type Selector = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Writes a value into a source item.
pub type Assigner = Arc<dyn Fn(&Value, Value) -> Result<()> + Send + Sync>;

/// How source items are pivoted.
#[derive(Clone)]
pub struct PivotSpec {
    source_name: String,
    column_key: Selector,
    row_key: Selector,
    get_value: Selector,
    set_value: Option<Assigner>,
}

impl PivotSpec {
    /// A pivot driven by closures.
    ///
    /// `source_name` names the source item type and ends up in the row type name. The column
    /// key is rendered to a string to become a property name. Without
    /// [`PivotSpec::with_set_value`] the rows are read-only.
    pub fn new<C, R, G>(source_name: impl Into<String>, column_key: C, row_key: R, get_value: G) -> Self
    where
        C: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
        R: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
        G: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        PivotSpec {
            source_name: source_name.into(),
            column_key: Arc::new(column_key),
            row_key: Arc::new(row_key),
            get_value: Arc::new(get_value),
            set_value: None,
        }
    }

    /// A pivot reading named members of object items.
    ///
    /// Values are written back to `set_value`, or to `get_value` if it is `None`.
    #[must_use]
    pub fn by_members(
        source_name: impl Into<String>,
        column_key: &str,
        row_key: &str,
        get_value: &str,
        set_value: Option<&str>,
    ) -> Self {
        let target = set_value.unwrap_or(get_value).to_string();
        Self::new(
            source_name,
            member_selector(column_key),
            member_selector(row_key),
            member_selector(get_value),
        )
        .with_set_value(move |item: &Value, value: Value| match item.as_object() {
            Some(object) => object.set(&target, &[], value),
            None => Err(Error::NullReference(target.clone())),
        })
    }

    /// Makes the rows writable through `set_value`.
    #[must_use]
    pub fn with_set_value<S>(mut self, set_value: S) -> Self
    where
        S: Fn(&Value, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.set_value = Some(Arc::new(set_value));
        self
    }

    /// Name of the source item type.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Name template of the row type.
    #[must_use]
    pub fn type_name(&self) -> String {
        format!("Pivot<{}>", self.source_name)
    }
}

impl std::fmt::Debug for PivotSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PivotSpec")
            .field("source_name", &self.source_name)
            .field("writable", &self.set_value.is_some())
            .finish_non_exhaustive()
    }
}

fn member_selector(name: &str) -> impl Fn(&Value) -> Result<Value> + Send + Sync + 'static {
    let name = name.to_string();
    move |item: &Value| match item.as_object() {
        Some(object) => object.get(&name, &[]),
        None => Err(Error::NullReference(name.clone())),
    }
}

/// Source items grouped by row, cells in column order.
struct Grouping {
    columns: Vec<String>,
    rows: Vec<(Value, Vec<Value>)>,
}

fn group(source: &[Value], spec: &PivotSpec) -> Result<Grouping> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<(Value, Vec<(usize, Value)>)> = Vec::new();

    for item in source {
        let column = (spec.column_key)(item)?.to_string();
        let row_key = (spec.row_key)(item)?;

        let column_index = match columns.iter().position(|c| *c == column) {
            Some(index) => index,
            None => {
                columns.push(column.clone());
                columns.len() - 1
            }
        };
        let row_index = match rows.iter().position(|(key, _)| *key == row_key) {
            Some(index) => index,
            None => {
                rows.push((row_key.clone(), Vec::new()));
                rows.len() - 1
            }
        };

        let cells = &mut rows[row_index].1;
        match cells.iter_mut().find(|(index, _)| *index == column_index) {
            Some(cell) => {
                warn!(column = %column, row = %row_key, "duplicate pivot cell, keeping the later item");
                cell.1 = item.clone();
            }
            None => cells.push((column_index, item.clone())),
        }
    }

    let width = columns.len();
    let rows = rows
        .into_iter()
        .map(|(key, cells)| {
            let mut dense = vec![Value::Null; width];
            for (index, item) in cells {
                dense[index] = item;
            }
            (key, dense)
        })
        .collect();
    Ok(Grouping { columns, rows })
}

/// The source item behind `key`, or null if the row has none.
fn cell(cells: &FieldHandle, columns: &[String], instance: &Instance, key: &str) -> Result<Value> {
    let index = columns
        .iter()
        .position(|c| c == key)
        .ok_or_else(|| Error::missing(instance.compiled_type().name(), key))?;
    let cells = cells.get(instance)?;
    Ok(cells
        .as_array()
        .and_then(|items| items.get(index))
        .cloned()
        .unwrap_or(Value::Null))
}

fn key_argument(args: &[Value]) -> Result<String> {
    match args.first() {
        Some(Value::String(key)) => Ok(key.to_string()),
        Some(Value::Null) | None => Err(Error::NullReference("key".to_string())),
        Some(other) => Err(Error::TypeMismatch {
            expected: TypeSig::String.to_string(),
            found: other.describe(),
        }),
    }
}

fn get_body(columns: Arc<[String]>, get_value: Selector) -> MethodGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let cells = scope.field(CELLS)?;
        let columns = columns.clone();
        let get_value = get_value.clone();
        let body: MethodBody = Arc::new(move |instance: &Instance, args: &[Value]| {
            let item = cell(&cells, &columns, instance, &key_argument(args)?)?;
            if item.is_null() {
                return Ok(Value::Null);
            }
            get_value(&item)
        });
        Ok(body)
    })
}

fn set_body(columns: Arc<[String]>, set_value: Option<Assigner>, source: String) -> MethodGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let cells = scope.field(CELLS)?;
        let columns = columns.clone();
        let set_value = set_value.clone();
        let source = source.clone();
        let body: MethodBody = Arc::new(move |instance: &Instance, args: &[Value]| {
            let key = key_argument(args)?;
            let item = cell(&cells, &columns, instance, &key)?;
            if item.is_null() {
                return Err(Error::NullReference(key));
            }
            let set_value = set_value
                .as_ref()
                .ok_or_else(|| Error::missing(source.as_str(), "set value"))?;
            set_value(&item, args.get(1).cloned().unwrap_or(Value::Null))?;
            Ok(Value::Null)
        });
        Ok(body)
    })
}

fn to_string_body(columns: Arc<[String]>) -> MethodGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let get = scope.method(GET)?;
        let columns = columns.clone();
        let body: MethodBody = Arc::new(move |instance: &Instance, _args: &[Value]| {
            let mut parts = Vec::with_capacity(columns.len());
            for column in columns.iter() {
                parts.push(get.invoke(instance, &[Value::from(column.as_str())])?.to_string());
            }
            Ok(Value::from(format!("({})", parts.join(", "))))
        });
        Ok(body)
    })
}

/// Getter forwarding to `Get`, with the column fixed or taken from the index.
fn column_getter(column: Option<String>) -> GetterGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let get = scope.method(GET)?;
        let column = column.clone();
        let body: GetterBody = Arc::new(move |instance: &Instance, index: &[Value]| match &column {
            Some(column) => get.invoke(instance, &[Value::from(column.as_str())]),
            None => get.invoke(instance, index),
        });
        Ok(body)
    })
}

/// Setter forwarding to `Set`, with the column fixed or taken from the index.
fn column_setter(column: Option<String>) -> SetterGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let set = scope.method(SET)?;
        let column = column.clone();
        let body: SetterBody = Arc::new(move |instance: &Instance, index: &[Value], value: Value| {
            let key = match &column {
                Some(column) => Value::from(column.as_str()),
                None => index.first().cloned().unwrap_or(Value::Null),
            };
            set.invoke(instance, &[key, value]).map(|_| ())
        });
        Ok(body)
    })
}

/// Builds the row type for `columns`.
///
/// # Errors
/// Returns an error only if the built-in tags or capability members cannot be resolved.
pub fn infer_pivot(columns: &[String], spec: &PivotSpec) -> Result<TypeDescriptor> {
    let capability = pivot_row();
    let name = spec.type_name();
    let shared: Arc<[String]> = columns.into();

    let mut descriptor = TypeDescriptor::new(&name);
    descriptor.add_attribute(AttributeDescriptor::new(
        &AttributeType::debugger_display(),
        vec![Literal::from(format!("{name} {{ToString()}}"))],
    )?);
    descriptor.add_attribute(AttributeDescriptor::new(
        &AttributeType::default_member(),
        vec![Literal::from(PIVOT_INDEXER)],
    )?);

    descriptor.add_member(FieldMember::new(CELLS, TypeSig::Array(Box::new(TypeSig::Object))));
    descriptor.add_member(
        MethodMember::from_capability(&capability, GET)?
            .with_body(get_body(shared.clone(), spec.get_value.clone()))
            .depends_on(Dependency::Field(CELLS.to_string())),
    );
    descriptor.add_member(
        MethodMember::from_capability(&capability, SET)?
            .with_body(set_body(
                shared.clone(),
                spec.set_value.clone(),
                spec.source_name.clone(),
            ))
            .depends_on(Dependency::Field(CELLS.to_string())),
    );
    descriptor.add_member(
        MethodMember::from_capability(&capability, TO_STRING)?
            .with_body(to_string_body(shared))
            .depends_on(Dependency::Method(GET.to_string())),
    );
    descriptor.add_member(
        PropertyMember::from_capability(&capability, PIVOT_INDEXER)?
            .with_getter(column_getter(None))
            .with_setter(column_setter(None)),
    );

    for column in columns {
        if [GET, SET, TO_STRING, PIVOT_INDEXER, CELLS].contains(&column.as_str()) {
            debug!(column = %column, "column shadows a pivot row member, reachable through the indexer only");
            continue;
        }
        descriptor.add_member(
            PropertyMember::new(column.as_str(), TypeSig::Object)
                .without_storage()
                .with_getter(column_getter(Some(column.clone())))
                .with_setter(column_setter(Some(column.clone()))),
        );
    }
    Ok(descriptor)
}

/// Pivots `source` into one synthesized row object per distinct row key.
///
/// # Errors
/// Returns whatever a key selector raises and any synthesis error of the row type.
///
/// # Examples
///
/// ```rust
/// use typeforge::prelude::*;
///
/// let cell = |key: &str, row: i32, value: &str| {
///     Value::Object(
///         PropertyBag::new("Cell")
///             .with("Key", key)
///             .with("Row", row)
///             .with("Value", value)
///             .into_object(),
///     )
/// };
/// let source = vec![cell("a", 1, "x"), cell("b", 1, "y"), cell("a", 2, "z")];
///
/// let spec = PivotSpec::by_members("Cell", "Key", "Row", "Value", None);
/// let rows = pivot(&Synthesizer::with_default_host(), &source, &spec)?;
///
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].invoke("ToString", &[])?, Value::from("(x, y)"));
/// assert!(rows[1].get("b")?.is_null());
/// # Ok::<(), typeforge::Error>(())
/// ```
pub fn pivot(synthesizer: &Synthesizer, source: &[Value], spec: &PivotSpec) -> Result<Vec<InstanceRc>> {
    let grouping = group(source, spec)?;
    let mut descriptor = infer_pivot(&grouping.columns, spec)?;
    let ty = synthesizer.compile(&mut descriptor)?;

    let mut rows = Vec::with_capacity(grouping.rows.len());
    for (_, cells) in grouping.rows {
        let row = ty.create_instance(&[])?;
        row.set_field(CELLS, Value::from(cells))?;
        rows.push(row);
    }
    debug!(ty = %ty.name(), columns = grouping.columns.len(), rows = rows.len(), "pivot built");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::PropertyBag;

    fn item(key: &str, row: &str, value: &str) -> Value {
        Value::Object(
            PropertyBag::new("Kvc")
                .with("Key", key)
                .with("Row", row)
                .with("Value", value)
                .into_object(),
        )
    }

    fn sample() -> Vec<Value> {
        vec![
            item("c1", "1", "1/1"),
            item("c2", "1", "2/1"),
            item("c1", "2", "1/2"),
            item("c2", "2", "2/2"),
        ]
    }

    #[test]
    fn test_row_type_shape() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let rows = pivot(&synthesizer, &sample(), &PivotSpec::by_members("Kvc", "Key", "Row", "Value", None))?;
        let ty = rows[0].compiled_type();

        assert!(ty.name().starts_with("Pivot<Kvc>"));
        assert!(ty.implements(PIVOT_ROW));
        assert_eq!(ty.attribute("DefaultMember").and_then(|a| a.arg_str(0)), Some(PIVOT_INDEXER));
        let display = ty.attribute("DebuggerDisplay").and_then(|a| a.arg_str(0));
        assert_eq!(display, Some("Pivot<Kvc> {ToString()}"));
        assert!(ty.property("c1").is_some());
        assert!(ty.property("c2").is_some());
        Ok(())
    }

    #[test]
    fn test_closure_selectors() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let source: Vec<Value> = vec![
            Value::from(vec![Value::from("x"), Value::from(1), Value::from(10)]),
            Value::from(vec![Value::from("y"), Value::from(1), Value::from(20)]),
            Value::from(vec![Value::from("x"), Value::from(2), Value::from(30)]),
        ];
        let at = |position: usize| {
            move |item: &Value| -> Result<Value> {
                Ok(item.as_array().and_then(|a| a.get(position)).cloned().unwrap_or(Value::Null))
            }
        };
        let spec = PivotSpec::new("Triple", at(0), at(1), at(2));
        let rows = pivot(&synthesizer, &source, &spec)?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("y")?, Value::I32(20));
        assert_eq!(rows[1].get("x")?, Value::I32(30));
        assert!(rows[1].get("y")?.is_null());
        assert!(matches!(rows[0].set("x", 5), Err(Error::MissingMember { .. })));
        Ok(())
    }

    #[test]
    fn test_writes_reach_source() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let source = sample();
        let rows = pivot(&synthesizer, &source, &PivotSpec::by_members("Kvc", "Key", "Row", "Value", None))?;

        rows[0].set("c2", "changed")?;
        rows[1].set_index(PIVOT_INDEXER, &[Value::from("c1")], "also")?;

        let changed = source[1].as_object().map(|o| o.get("Value", &[])).transpose()?;
        assert_eq!(changed, Some(Value::from("changed")));
        assert_eq!(rows[1].get_index(PIVOT_INDEXER, &[Value::from("c1")])?, Value::from("also"));
        assert_eq!(rows[0].invoke_via(PIVOT_ROW, "ToString", &[])?, Value::from("(1/1, changed)"));
        Ok(())
    }

    #[test]
    fn test_missing_cell() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let source = vec![item("c1", "1", "a"), item("c2", "2", "b")];
        let rows = pivot(&synthesizer, &source, &PivotSpec::by_members("Kvc", "Key", "Row", "Value", None))?;

        assert!(rows[0].get("c2")?.is_null());
        assert_eq!(rows[0].invoke("ToString", &[])?, Value::from("(a, )"));
        assert!(matches!(rows[0].set("c2", "x"), Err(Error::NullReference(_))));
        assert!(matches!(
            rows[0].invoke("Get", &[Value::from("c3")]),
            Err(Error::MissingMember { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_cell_last_wins() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let source = vec![item("c1", "1", "first"), item("c1", "1", "second")];
        let rows = pivot(&synthesizer, &source, &PivotSpec::by_members("Kvc", "Key", "Row", "Value", None))?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c1")?, Value::from("second"));
        Ok(())
    }
}
