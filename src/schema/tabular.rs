//! Types inferred from tabular data.
//!
//! Two sources are supported: an in-memory [`DataTable`] and any forward-only [`DataReader`].
//! Both produce one property per column. Reader inference additionally implements the
//! [`load_record`] capability, so an instance can be filled from one record at a time.

use std::sync::{Arc, OnceLock};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    codegen::{EmitScope, MethodBody, MethodGen},
    config::{NullabilityPolicy, SynthesisConfig},
    descriptor::{
        AttributeDescriptor, ConstructorMember, Dependency, MethodMember, OverrideTarget,
        ParameterDescriptor, PropertyMember, TypeDescriptor,
    },
    runtime::{CompiledTypeRc, FieldHandle, Instance, InstanceRc, PropertyHandle},
    synthesis::Synthesizer,
    typesystem::{CapabilityBuilder, CapabilityRc, TypeSig, Value},
    Error, Result,
};

/// Name of the built-in record loading capability.
pub const LOAD_RECORD: &str = "Typeforge.ILoadRecord";

/// Name of the record loading method.
pub const LOAD: &str = "Load";

/// The built-in capability `Load(record)` of reader-inferred types.
///
/// The record is an array holding one value per column, by position.
#[must_use]
pub fn load_record() -> CapabilityRc {
    static LOAD_RECORD_CAPABILITY: OnceLock<CapabilityRc> = OnceLock::new();
    LOAD_RECORD_CAPABILITY
        .get_or_init(|| {
            CapabilityBuilder::new(LOAD_RECORD)
                .method(LOAD, TypeSig::Void, vec![TypeSig::Array(Box::new(TypeSig::Object))])
                .build()
        })
        .clone()
}

/// Schema of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,
    /// Declared type
    pub ty: TypeSig,
    /// Nullability metadata, `None` if the source does not report it
    pub allow_null: Option<bool>,
    /// Schema of the originating table
    pub base_schema: Option<String>,
    /// Originating table
    pub base_table: Option<String>,
    /// Further metadata entries reported by the source
    pub extra: Vec<(String, String)>,
}

impl ColumnSchema {
    /// A column without metadata.
    pub fn new(name: impl Into<String>, ty: TypeSig) -> Self {
        ColumnSchema {
            name: name.into(),
            ty,
            allow_null: None,
            base_schema: None,
            base_table: None,
            extra: Vec::new(),
        }
    }

    /// Sets the nullability metadata.
    #[must_use]
    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = Some(allow);
        self
    }

    /// Sets the originating table.
    #[must_use]
    pub fn from_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.base_schema = Some(schema.into());
        self.base_table = Some(table.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Qualified name of the originating table, `schema.table`.
    #[must_use]
    pub fn source_table(&self) -> Option<String> {
        match (&self.base_schema, &self.base_table) {
            (Some(schema), Some(table)) if !schema.is_empty() => Some(format!("{schema}.{table}")),
            (_, Some(table)) if !table.is_empty() => Some(table.clone()),
            _ => None,
        }
    }

    /// The property type: value types become nullable when the column may hold null.
    #[must_use]
    pub fn value_type(&self, policy: NullabilityPolicy) -> TypeSig {
        if self.ty.is_value_type()
            && !matches!(self.ty, TypeSig::Nullable(_))
            && policy.allows_null(self.allow_null)
        {
            self.ty.to_nullable()
        } else {
            self.ty.clone()
        }
    }

    /// Every metadata entry, standard ones first.
    #[must_use]
    pub fn metadata(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("ColumnName".to_string(), self.name.clone()),
            ("DataType".to_string(), self.ty.to_string()),
        ];
        if let Some(allow) = self.allow_null {
            entries.push(("AllowDBNull".to_string(), allow.to_string()));
        }
        if let Some(schema) = &self.base_schema {
            entries.push(("BaseSchemaName".to_string(), schema.clone()));
        }
        if let Some(table) = &self.base_table {
            entries.push(("BaseTableName".to_string(), table.clone()));
        }
        entries.extend(self.extra.iter().cloned());
        entries
    }
}

/// Forward-only access to tabular data.
pub trait DataReader {
    /// The column schemas, in record order.
    fn columns(&self) -> &[ColumnSchema];

    /// Advances to the next record; `None` once the data is exhausted.
    ///
    /// # Errors
    /// Implementation-specific.
    fn read(&mut self) -> Result<Option<Vec<Value>>>;
}

/// An in-memory table.
///
/// # Examples
///
/// ```rust
/// use typeforge::prelude::*;
///
/// let mut table = DataTable::new();
/// table.add_column(ColumnSchema::new("Id", TypeSig::I4));
/// table.add_column(ColumnSchema::new("Name", TypeSig::String));
/// table.add_row(vec![Value::I32(1), Value::from("one")])?;
///
/// let rows = table.to_objects(&Synthesizer::with_default_host())?;
/// assert_eq!(rows[0].get("Name")?, Value::from("one"));
/// # Ok::<(), typeforge::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    name: Option<String>,
    columns: Vec<ColumnSchema>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    /// An unnamed, empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table whose rows become instances of a type with this name.
    pub fn named(name: impl Into<String>) -> Self {
        DataTable {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Appends a column. Existing rows are padded with `Null`.
    pub fn add_column(&mut self, column: ColumnSchema) -> &mut Self {
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self
    }

    /// Appends a row.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the row does not have one cell per column.
    pub fn add_row(&mut self, row: Vec<Value>) -> Result<&mut Self> {
        if row.len() != self.columns.len() {
            return Err(malformed_error!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        Ok(self)
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// The rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A forward-only reader over the rows.
    #[must_use]
    pub fn reader(&self) -> TableReader<'_> {
        TableReader {
            table: self,
            position: 0,
        }
    }

    /// One property per column; the table name, if any, is used verbatim as type name.
    #[must_use]
    pub fn to_type_descriptor(&self, config: &SynthesisConfig) -> TypeDescriptor {
        let mut descriptor = match &self.name {
            Some(name) if !name.is_empty() => TypeDescriptor::with_natural_name(name),
            _ => TypeDescriptor::new(&config.default_type_name),
        };
        for column in &self.columns {
            descriptor.add_member(PropertyMember::new(
                &column.name,
                column.value_type(config.nullability),
            ));
        }
        descriptor
    }

    /// Compiles the row type and creates one instance per row.
    ///
    /// # Errors
    /// Returns any synthesis error, or [`Error::TypeMismatch`] for a cell that cannot be
    /// coerced to its column type.
    pub fn to_objects(&self, synthesizer: &Synthesizer) -> Result<Vec<InstanceRc>> {
        let (ty, properties) = self.compile(synthesizer)?;
        self.rows
            .iter()
            .map(|row| materialize(&ty, &properties, row))
            .collect()
    }

    /// [`DataTable::to_objects`], creating the instances in parallel.
    ///
    /// # Errors
    /// See [`DataTable::to_objects`].
    pub fn to_objects_par(&self, synthesizer: &Synthesizer) -> Result<Vec<InstanceRc>> {
        let (ty, properties) = self.compile(synthesizer)?;
        self.rows
            .par_iter()
            .map(|row| materialize(&ty, &properties, row))
            .collect()
    }

    fn compile(&self, synthesizer: &Synthesizer) -> Result<(CompiledTypeRc, Vec<Arc<PropertyHandle>>)> {
        let mut descriptor = self.to_type_descriptor(synthesizer.config());
        let ty = synthesizer.compile(&mut descriptor)?;
        let properties = self
            .columns
            .iter()
            .map(|column| {
                ty.property(&column.name)
                    .cloned()
                    .ok_or_else(|| Error::missing(ty.name(), &column.name))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(ty = %ty.name(), rows = self.rows.len(), "table row type compiled");
        Ok((ty, properties))
    }
}

fn materialize(
    ty: &CompiledTypeRc,
    properties: &[Arc<PropertyHandle>],
    row: &[Value],
) -> Result<InstanceRc> {
    let instance = ty.create_instance(&[])?;
    for (property, cell) in properties.iter().zip(row) {
        property.set(&instance, &[], cell.coerce_to(property.ty())?)?;
    }
    Ok(instance)
}

/// A [`DataReader`] over a [`DataTable`].
#[derive(Debug)]
pub struct TableReader<'a> {
    table: &'a DataTable,
    position: usize,
}

impl DataReader for TableReader<'_> {
    fn columns(&self) -> &[ColumnSchema] {
        &self.table.columns
    }

    fn read(&mut self) -> Result<Option<Vec<Value>>> {
        let row = self.table.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }
}

/// Where `Load` stores one column.
#[derive(Debug, Clone)]
enum LoadTarget {
    Field(String),
    Property(String),
    Skip,
}

enum Store {
    Field(FieldHandle),
    Property(Arc<PropertyHandle>),
}

/// How one column becomes a property.
struct ColumnPlan {
    column: ColumnSchema,
    ty: TypeSig,
    capabilities: Vec<CapabilityRc>,
    base: Option<Arc<PropertyHandle>>,
}

impl ColumnPlan {
    fn property(&self) -> Result<PropertyMember> {
        let name = self.column.name.as_str();
        let mut property = match &self.base {
            Some(base) => {
                let mut property = PropertyMember::new(name, base.ty().clone())
                    .with_access(base.can_read(), base.can_write())
                    .overriding(OverrideTarget::Base);
                for capability in &self.capabilities {
                    property = property.overriding(OverrideTarget::Capability(capability.clone()));
                }
                property
            }
            None if !self.capabilities.is_empty() => {
                PropertyMember::from_capabilities(&self.capabilities, name)?
            }
            None => PropertyMember::new(name, self.ty.clone()),
        };

        for (key, value) in self.column.metadata() {
            property = property.with_attribute(AttributeDescriptor::column_info(key, value)?);
        }
        Ok(property)
    }

    fn load_target(&self, property: &PropertyMember, config: &SynthesisConfig) -> LoadTarget {
        match &self.base {
            Some(base) if base.can_write() => LoadTarget::Property(self.column.name.clone()),
            Some(_) => LoadTarget::Skip,
            None => property
                .backing_name(config)
                .map_or(LoadTarget::Skip, LoadTarget::Field),
        }
    }
}

/// Generator of the `Load` body (and the record constructor, which shares it).
fn load_body(targets: Arc<[(LoadTarget, TypeSig)]>) -> MethodGen {
    Arc::new(move |scope: &EmitScope<'_>| {
        let mut stores = Vec::with_capacity(targets.len());
        for (target, ty) in targets.iter() {
            let store = match target {
                LoadTarget::Field(name) => Some(Store::Field(scope.field(name)?)),
                LoadTarget::Property(name) => Some(Store::Property(scope.property(name)?)),
                LoadTarget::Skip => None,
            };
            stores.push(store.map(|store| (store, ty.clone())));
        }

        let body: MethodBody = Arc::new(move |instance: &Instance, args: &[Value]| {
            let record = match args.first() {
                Some(Value::Array(cells)) => cells.clone(),
                Some(Value::Null) | None => return Err(Error::NullReference("record".to_string())),
                Some(other) => {
                    return Err(Error::TypeMismatch {
                        expected: "record".to_string(),
                        found: other.describe(),
                    })
                }
            };

            for (position, store) in stores.iter().enumerate() {
                let Some((store, ty)) = store else {
                    continue;
                };
                let value = record
                    .get(position)
                    .unwrap_or(&Value::Null)
                    .coerce_to(ty)?;
                match store {
                    Store::Field(field) => field.set(instance, value)?,
                    Store::Property(property) => property.set(instance, &[], value)?,
                }
            }
            Ok(Value::Null)
        });
        Ok(body)
    })
}

/// Infers a record type from the columns of `reader`.
///
/// Capability properties of the same name and type as a column are implemented by that
/// column; capability properties without a column are added. A column matching a base
/// property overrides it and is loaded through the base setter. Every column carries one
/// `ColumnInfo` tag per metadata entry. If all columns come from one table, its qualified
/// name becomes the type name verbatim.
///
/// # Errors
/// Returns [`Error::InvalidDescriptor`] if a capability declares a column's property with a
/// different type.
pub fn infer_reader(
    reader: &dyn DataReader,
    capabilities: &[CapabilityRc],
    base: Option<&CompiledTypeRc>,
    config: &SynthesisConfig,
) -> Result<TypeDescriptor> {
    let columns = reader.columns();
    let mut plans: Vec<ColumnPlan> = columns
        .iter()
        .map(|column| ColumnPlan {
            column: column.clone(),
            ty: column.value_type(config.nullability),
            capabilities: Vec::new(),
            base: None,
        })
        .collect();

    let mut extra: Vec<(String, Vec<CapabilityRc>)> = Vec::new();
    for capability in capabilities {
        for (declaring, sig) in capability.all_properties() {
            match plans.iter_mut().find(|plan| plan.column.name == sig.name) {
                Some(plan) if plan.column.ty.underlying() == sig.ty.underlying() => {
                    plan.ty = sig.ty.clone();
                    plan.capabilities.push(declaring);
                }
                Some(plan) => {
                    return Err(Error::InvalidDescriptor(format!(
                        "column '{}' is {} but '{}' declares it as {}",
                        plan.column.name,
                        plan.column.ty,
                        declaring.name(),
                        sig.ty
                    )))
                }
                None => match extra.iter_mut().find(|(name, _)| *name == sig.name) {
                    Some((_, owners)) => owners.push(declaring),
                    None => extra.push((sig.name.clone(), vec![declaring])),
                },
            }
        }
    }

    if let Some(base) = base {
        for plan in &mut plans {
            plan.base = base
                .property(&plan.column.name)
                .filter(|p| p.index().is_empty() && p.ty().underlying() == plan.column.ty.underlying())
                .cloned();
        }
    }

    let sources: Vec<Option<String>> = columns.iter().map(ColumnSchema::source_table).collect();
    let mut descriptor = match sources.first() {
        Some(Some(first)) if sources.iter().all(|s| s.as_deref() == Some(first.as_str())) => {
            TypeDescriptor::with_natural_name(first)
        }
        _ => TypeDescriptor::new(&config.default_type_name),
    };
    if let Some(base) = base {
        descriptor.set_base(base.clone());
    }
    for capability in capabilities {
        descriptor.add_capability(capability.clone());
    }
    descriptor.add_capability(load_record());

    let mut targets = Vec::with_capacity(plans.len());
    let mut dependencies = Vec::new();
    for plan in &plans {
        let property = plan.property()?;
        let target = plan.load_target(&property, config);
        match &target {
            LoadTarget::Field(name) => dependencies.push(Dependency::Field(name.clone())),
            LoadTarget::Property(name) => dependencies.push(Dependency::Property(name.clone())),
            LoadTarget::Skip => {}
        }
        targets.push((target, property.ty().clone()));
        descriptor.add_member(property);
    }
    for (name, owners) in &extra {
        descriptor.add_member(PropertyMember::from_capabilities(owners, name)?);
    }

    let targets: Arc<[(LoadTarget, TypeSig)]> = targets.into();
    let mut load = MethodMember::from_capability(&load_record(), LOAD)?.with_body(load_body(targets.clone()));
    let mut record = ConstructorMember::with_parameters(vec![ParameterDescriptor::named(
        "record",
        TypeSig::Array(Box::new(TypeSig::Object)),
    )])
    .with_body(load_body(targets));
    for dependency in dependencies {
        load = load.depends_on(dependency.clone());
        record = record.depends_on(dependency);
    }
    descriptor.add_member(load);
    descriptor.add_member(record);
    descriptor.add_member(ConstructorMember::default_constructor());

    Ok(descriptor)
}

/// Infers the record type of `reader`, compiles it and loads every remaining record.
///
/// # Errors
/// Returns any inference or synthesis error, and whatever reading or loading a record raises.
pub fn reader_to_objects(
    synthesizer: &Synthesizer,
    reader: &mut dyn DataReader,
    capabilities: &[CapabilityRc],
    base: Option<&CompiledTypeRc>,
) -> Result<Vec<InstanceRc>> {
    let mut descriptor = infer_reader(&*reader, capabilities, base, synthesizer.config())?;
    let ty = synthesizer.compile(&mut descriptor)?;

    let mut objects = Vec::new();
    while let Some(record) = reader.read()? {
        let instance = ty.create_instance(&[])?;
        instance.invoke_via(LOAD_RECORD, LOAD, &[Value::from(record)])?;
        objects.push(instance);
    }
    debug!(ty = %ty.name(), rows = objects.len(), "reader loaded");
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> DataTable {
        let mut table = DataTable::new();
        table
            .add_column(ColumnSchema::new("Id", TypeSig::I4).allow_null(false).from_table("dbo", "Orders"))
            .add_column(ColumnSchema::new("Amount", TypeSig::Decimal).from_table("dbo", "Orders"))
            .add_column(ColumnSchema::new("Customer", TypeSig::String).from_table("dbo", "Orders"));
        table
    }

    #[test]
    fn test_value_type_nullability() {
        let column = ColumnSchema::new("Id", TypeSig::I4);
        assert_eq!(
            column.value_type(NullabilityPolicy::NullableUnlessNotNull),
            TypeSig::Nullable(Box::new(TypeSig::I4))
        );
        assert_eq!(column.value_type(NullabilityPolicy::TrustMetadata), TypeSig::I4);
        assert_eq!(
            column.clone().allow_null(false).value_type(NullabilityPolicy::NullableUnlessNotNull),
            TypeSig::I4
        );
        assert_eq!(
            ColumnSchema::new("Name", TypeSig::String).value_type(NullabilityPolicy::NullableUnlessNotNull),
            TypeSig::String
        );
    }

    #[test]
    fn test_add_row_checks_width() {
        let mut table = orders();
        assert!(table.add_row(vec![Value::I32(1)]).is_err());
        assert!(table
            .add_row(vec![Value::I32(1), Value::Null, Value::from("a")])
            .is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reader_infers_source_table_name() -> Result<()> {
        let table = orders();
        let descriptor = infer_reader(&table.reader(), &[], None, &SynthesisConfig::default())?;
        assert_eq!(descriptor.name(), "dbo.Orders");
        assert!(descriptor.has_natural_name());
        assert!(descriptor.capabilities().iter().any(|c| c.name() == LOAD_RECORD));
        Ok(())
    }

    #[test]
    fn test_mixed_sources_use_template() -> Result<()> {
        let mut table = orders();
        table.add_column(ColumnSchema::new("Note", TypeSig::String));
        let descriptor = infer_reader(&table.reader(), &[], None, &SynthesisConfig::default())?;
        assert_eq!(descriptor.name(), "<>DynamicType");
        assert!(!descriptor.has_natural_name());
        Ok(())
    }

    #[test]
    fn test_reader_loads_and_substitutes_nulls() -> Result<()> {
        let mut table = orders();
        table.add_row(vec![Value::I32(7), Value::Null, Value::from("ada")])?;
        table.add_row(vec![Value::Null, Value::from("2.50"), Value::Null])?;

        let synthesizer = Synthesizer::with_default_host();
        let rows = reader_to_objects(&synthesizer, &mut table.reader(), &[], None)?;
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].get("Id")?, Value::I32(7));
        assert!(rows[0].get("Amount")?.is_null());
        assert_eq!(rows[0].get("Customer")?, Value::from("ada"));

        assert_eq!(rows[1].get("Id")?, Value::I32(0));
        assert_eq!(rows[1].get("Amount")?.as_f64(), Some(2.5));
        assert!(rows[1].get("Customer")?.is_null());

        let ty = rows[0].compiled_type();
        let info = ty.property("Id").map(|p| p.attributes().len());
        assert_eq!(info, Some(5));
        Ok(())
    }

    #[test]
    fn test_capability_properties_implemented_by_columns() -> Result<()> {
        let customer = CapabilityBuilder::new("Shop.ICustomer")
            .property("Customer", TypeSig::String)
            .readonly_property("Region", TypeSig::String)
            .build();

        let mut table = orders();
        table.add_row(vec![Value::I32(1), Value::Null, Value::from("bob")])?;

        let synthesizer = Synthesizer::with_default_host();
        let rows = reader_to_objects(&synthesizer, &mut table.reader(), &[customer], None)?;
        let row = &rows[0];

        assert!(row.compiled_type().implements("Shop.ICustomer"));
        assert_eq!(row.get_via("Shop.ICustomer", "Customer")?, Value::from("bob"));
        assert!(row.get_via("Shop.ICustomer", "Region")?.is_null());
        Ok(())
    }

    #[test]
    fn test_conflicting_capability_type_rejected() {
        let ids = CapabilityBuilder::new("Shop.IKeyed")
            .property("Id", TypeSig::String)
            .build();
        let result = infer_reader(&orders().reader(), &[ids], None, &SynthesisConfig::default());
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn test_record_constructor() -> Result<()> {
        let table = orders();
        let synthesizer = Synthesizer::with_default_host();
        let mut descriptor = infer_reader(&table.reader(), &[], None, synthesizer.config())?;
        let ty = synthesizer.compile(&mut descriptor)?;

        let record = Value::from(vec![Value::I32(3), Value::from("1.25"), Value::from("eve")]);
        let instance = ty.create_instance(&[record])?;
        assert_eq!(instance.get("Id")?, Value::I32(3));
        assert_eq!(instance.get("Customer")?, Value::from("eve"));
        Ok(())
    }

    #[test]
    fn test_table_to_objects_par() -> Result<()> {
        let mut table = DataTable::named("Numbers");
        table.add_column(ColumnSchema::new("N", TypeSig::I8).allow_null(false));
        for n in 0..32 {
            table.add_row(vec![Value::I64(n)])?;
        }

        let synthesizer = Synthesizer::with_default_host();
        let rows = table.to_objects_par(&synthesizer)?;
        assert_eq!(rows.len(), 32);
        assert_eq!(rows[31].get("N")?, Value::I64(31));
        assert_eq!(rows[0].compiled_type().name(), "Numbers");
        Ok(())
    }
}
