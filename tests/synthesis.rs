//! Integration tests for descriptor synthesis.
//!
//! Covers property round-trips across the supported value types, implicit backing storage
//! shared between or separated per capability, base type overrides and the all-or-nothing
//! compile contract.

use typeforge::prelude::*;

fn serde_number(text: &str) -> Value {
    Value::Decimal(serde_json::from_str(text).unwrap())
}

/// Every field-backed property returns what was last written to it.
#[test]
fn test_property_round_trip() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let items = TypeSig::Array(Box::new(TypeSig::String));

    let mut descriptor = TypeDescriptor::new("RoundTrip");
    descriptor
        .add_member(PropertyMember::new("Flag", TypeSig::Boolean))
        .add_member(PropertyMember::new("Letter", TypeSig::Char))
        .add_member(PropertyMember::new("Small", TypeSig::I2))
        .add_member(PropertyMember::new("Count", TypeSig::I4))
        .add_member(PropertyMember::new("Big", TypeSig::I8))
        .add_member(PropertyMember::new("Ratio", TypeSig::R8))
        .add_member(PropertyMember::new("Amount", TypeSig::Decimal))
        .add_member(PropertyMember::new("Name", TypeSig::String))
        .add_member(PropertyMember::new("Maybe", TypeSig::I4.to_nullable()))
        .add_member(PropertyMember::new("Items", items))
        .add_member(PropertyMember::new("Anything", TypeSig::Object));
    let ty = synthesizer.compile(&mut descriptor)?;
    let instance = ty.create_instance(&[])?;

    let cases = [
        ("Flag", Value::Bool(true)),
        ("Letter", Value::Char('x')),
        ("Small", Value::I32(-12)),
        ("Count", Value::I32(42)),
        ("Big", Value::I64(1 << 40)),
        ("Ratio", Value::F64(0.25)),
        ("Amount", serde_number("12345678901234567890.123456789")),
        ("Name", Value::from("typeforge")),
        ("Maybe", Value::Null),
        ("Items", Value::from(vec![Value::from("a"), Value::from("b")])),
        ("Anything", Value::I64(7)),
    ];
    for (name, value) in cases {
        instance.set(name, value.clone())?;
        assert_eq!(instance.get(name)?, value, "property {name}");
    }

    // Nullable slots hold values too.
    instance.set("Maybe", 3)?;
    assert_eq!(instance.get("Maybe")?, Value::I32(3));
    Ok(())
}

/// Unset properties read the default of their declared type.
#[test]
fn test_defaults() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let mut descriptor = TypeDescriptor::new("Defaults");
    descriptor
        .add_member(PropertyMember::new("Count", TypeSig::I4))
        .add_member(PropertyMember::new("Flag", TypeSig::Boolean))
        .add_member(PropertyMember::new("Name", TypeSig::String));
    let instance = synthesizer.compile(&mut descriptor)?.create_instance(&[])?;

    assert_eq!(instance.get("Count")?, Value::I32(0));
    assert_eq!(instance.get("Flag")?, Value::Bool(false));
    assert!(instance.get("Name")?.is_null());
    Ok(())
}

/// Values that do not fit a slot are rejected at the setter.
#[test]
fn test_type_mismatch_rejected() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let mut descriptor = TypeDescriptor::new("Strict");
    descriptor.add_member(PropertyMember::new("Count", TypeSig::I4));
    let instance = synthesizer.compile(&mut descriptor)?.create_instance(&[])?;

    assert!(matches!(
        instance.set("Count", "many"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        instance.set("Count", Value::Null),
        Err(Error::TypeMismatch { .. })
    ));
    Ok(())
}

/// Narrow and unsigned slots only take values inside their range.
#[test]
fn test_integer_slot_ranges() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let mut descriptor = TypeDescriptor::new("Ranges");
    descriptor
        .add_member(PropertyMember::new("Tiny", TypeSig::U1))
        .add_member(PropertyMember::new("Short", TypeSig::I2))
        .add_member(PropertyMember::new("Small", TypeSig::U2))
        .add_member(PropertyMember::new("Unsigned", TypeSig::U4))
        .add_member(PropertyMember::new("Huge", TypeSig::U8));
    let instance = synthesizer.compile(&mut descriptor)?.create_instance(&[])?;

    let rejected = [
        ("Tiny", Value::I32(300)),
        ("Short", Value::I32(40_000)),
        ("Small", Value::I32(70_000)),
        ("Small", Value::I32(-1)),
        ("Unsigned", Value::I32(-1)),
        ("Unsigned", Value::I64(i64::from(u32::MAX) + 1)),
        ("Huge", Value::I64(-1)),
    ];
    for (name, value) in rejected {
        assert!(
            matches!(instance.set(name, value.clone()), Err(Error::TypeMismatch { .. })),
            "{name} accepted {value:?}"
        );
    }

    instance.set("Small", 65_535)?;
    assert_eq!(instance.get("Small")?, Value::I32(65_535));
    instance.set("Short", -32_768)?;
    assert_eq!(instance.get("Short")?, Value::I32(-32_768));
    instance.set("Unsigned", Value::I64(i64::from(u32::MAX)))?;
    assert_eq!(instance.get("Unsigned")?, Value::I64(i64::from(u32::MAX)));
    Ok(())
}

fn valued(name: &str) -> CapabilityRc {
    CapabilityBuilder::new(name).property("Value", TypeSig::I4).build()
}

/// Same-named capability properties get one field each in per-capability mode.
#[test]
fn test_per_capability_backing_is_separate() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let first = valued("Test.IFirst");
    let second = valued("Test.ISecond");

    let mut descriptor = TypeDescriptor::new("Separate");
    descriptor
        .add_member(
            PropertyMember::from_capability(&first, "Value")?
                .with_backing_mode(BackingMode::PerCapability),
        )
        .add_member(
            PropertyMember::from_capability(&second, "Value")?
                .with_backing_mode(BackingMode::PerCapability),
        );
    let ty = synthesizer.compile(&mut descriptor)?;

    assert!(ty.field("IFirst_Value").is_some());
    assert!(ty.field("ISecond_Value").is_some());

    let instance = ty.create_instance(&[])?;
    instance.set_via("Test.IFirst", "Value", 1)?;
    instance.set_via("Test.ISecond", "Value", 2)?;
    assert_eq!(instance.get_via("Test.IFirst", "Value")?, Value::I32(1));
    assert_eq!(instance.get_via("Test.ISecond", "Value")?, Value::I32(2));
    Ok(())
}

/// Same-named capability properties share one field in the default mode.
#[test]
fn test_shared_backing_is_observed_by_both() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let first = valued("Test.IFirst");
    let second = valued("Test.ISecond");

    let mut descriptor = TypeDescriptor::new("Shared");
    descriptor
        .add_member(PropertyMember::from_capability(&first, "Value")?)
        .add_member(PropertyMember::from_capability(&second, "Value")?);
    let ty = synthesizer.compile(&mut descriptor)?;

    assert_eq!(ty.fields().len(), 1);
    assert!(ty.field("m_Value").is_some());

    let instance = ty.create_instance(&[])?;
    instance.set_via("Test.IFirst", "Value", 5)?;
    assert_eq!(instance.get_via("Test.ISecond", "Value")?, Value::I32(5));
    instance.set_via("Test.ISecond", "Value", 6)?;
    assert_eq!(instance.get_via("Test.IFirst", "Value")?, Value::I32(6));
    Ok(())
}

/// One property implementing several capabilities at once.
#[test]
fn test_property_from_capabilities() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let first = valued("Test.IFirst");
    let second = valued("Test.ISecond");

    let mut descriptor = TypeDescriptor::new("Merged");
    descriptor.add_member(PropertyMember::from_capabilities(
        &[first.clone(), second.clone()],
        "Value",
    )?);
    let ty = synthesizer.compile(&mut descriptor)?;
    assert!(ty.implements("Test.IFirst"));
    assert!(ty.implements("Test.ISecond"));

    let instance = ty.create_instance(&[])?;
    instance.set_via("Test.IFirst", "Value", 9)?;
    assert_eq!(instance.get_via("Test.ISecond", "Value")?, Value::I32(9));
    Ok(())
}

/// Overriding a base property delegates to the base accessors.
#[test]
fn test_base_override() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();

    let mut base = TypeDescriptor::new("Base");
    base.add_member(PropertyMember::new("Name", TypeSig::String));
    let base = synthesizer.compile(&mut base)?;

    let named = CapabilityBuilder::new("Test.INamed")
        .property("Name", TypeSig::String)
        .build();
    let mut derived = TypeDescriptor::new("Derived")
        .with_base(base.clone())
        .with_capability(named);
    derived.add_member(
        PropertyMember::new("Name", TypeSig::String).overriding(OverrideTarget::Base),
    );
    let derived = synthesizer.compile(&mut derived)?;

    assert!(derived.is_assignable_to(&base));
    assert!(derived.fields().is_empty());

    let instance = derived.create_instance(&[])?;
    instance.set_via("Test.INamed", "Name", "through capability")?;
    assert_eq!(
        base.property("Name")
            .map(|p| p.get(&instance, &[]))
            .transpose()?,
        Some(Value::from("through capability"))
    );
    Ok(())
}

/// Constructors store their arguments, methods see the stored state.
#[test]
fn test_constructor_and_method() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();

    let mut descriptor = TypeDescriptor::new("Greeter");
    descriptor
        .add_member(FieldMember::new("name", TypeSig::String))
        .add_member(
            ConstructorMember::with_parameters(vec![ParameterDescriptor::named(
                "name",
                TypeSig::String,
            )])
            .with_body(std::sync::Arc::new(|scope: &EmitScope<'_>| -> Result<MethodBody> {
                let name = scope.field("name")?;
                let body: MethodBody = std::sync::Arc::new(move |instance: &Instance, args: &[Value]| {
                    name.set(instance, args[0].clone())?;
                    Ok(Value::Null)
                });
                Ok(body)
            }))
            .depends_on(Dependency::Field("name".into())),
        )
        .add_member(
            MethodMember::new("Greet", TypeSig::String)
                .with_body(std::sync::Arc::new(|scope: &EmitScope<'_>| -> Result<MethodBody> {
                    let name = scope.field("name")?;
                    let body: MethodBody = std::sync::Arc::new(move |instance: &Instance, _args: &[Value]| {
                        Ok(Value::from(format!("hello {}", name.get(instance)?)))
                    });
                    Ok(body)
                }))
                .depends_on(Dependency::Field("name".into())),
        );
    let ty = synthesizer.compile(&mut descriptor)?;

    let instance = ty.create_instance(&[Value::from("ada")])?;
    assert_eq!(instance.invoke("Greet", &[])?, Value::from("hello ada"));
    assert!(matches!(
        ty.create_instance(&[]),
        Err(Error::ArgumentCount { .. })
    ));
    Ok(())
}

fn tagged(tag: &'static str) -> MethodBody {
    std::sync::Arc::new(move |_: &Instance, args: &[Value]| {
        Ok(Value::from(format!("{tag}:{}", args[0])))
    })
}

/// Overloads of one capability method each get their own dispatch entry.
#[test]
fn test_overloaded_capability_methods() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let writer = CapabilityBuilder::new("Test.IWriter")
        .method("Write", TypeSig::String, vec![TypeSig::String])
        .method("Write", TypeSig::String, vec![TypeSig::I4])
        .build();

    let mut descriptor = TypeDescriptor::new("Writer");
    descriptor
        .add_member(
            MethodMember::new("Write", TypeSig::String)
                .with_parameter(ParameterDescriptor::new(TypeSig::String))
                .with_body_fn(tagged("text"))
                .overriding(OverrideTarget::Capability(writer.clone())),
        )
        .add_member(
            MethodMember::new("Write", TypeSig::String)
                .with_parameter(ParameterDescriptor::new(TypeSig::I4))
                .with_body_fn(tagged("number"))
                .overriding(OverrideTarget::Capability(writer.clone())),
        );
    let ty = synthesizer.compile(&mut descriptor)?;
    assert_eq!(
        ty.dispatch("Test.IWriter", "Write").map(|d| d.methods().len()),
        Some(2)
    );

    let instance = ty.create_instance(&[])?;
    assert_eq!(
        instance.invoke_via("Test.IWriter", "Write", &[Value::from("a")])?,
        Value::from("text:a")
    );
    assert_eq!(
        instance.invoke_via("Test.IWriter", "Write", &[Value::I32(4)])?,
        Value::from("number:4")
    );
    assert_eq!(instance.invoke("Write", &[Value::I32(5)])?, Value::from("number:5"));
    Ok(())
}

/// Template names are disambiguated, natural names are kept.
#[test]
fn test_naming() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();

    let a = synthesizer.compile(&mut TypeDescriptor::new("Row"))?;
    let b = synthesizer.compile(&mut TypeDescriptor::new("Row"))?;
    assert_ne!(a.name(), b.name());
    assert!(a.name().starts_with("Row"));

    let natural = synthesizer.compile(&mut TypeDescriptor::with_natural_name("dbo.Orders"))?;
    assert_eq!(natural.name(), "dbo.Orders");

    let stable = Synthesizer::with_config(SynthesisConfig::stable_names());
    assert_eq!(stable.compile(&mut TypeDescriptor::new("Row"))?.name(), "Row");
    Ok(())
}

/// A missing capability member aborts the compile and leaves the descriptor unusable.
#[test]
fn test_compile_is_all_or_nothing() {
    let synthesizer = Synthesizer::with_default_host();
    let named = CapabilityBuilder::new("Test.INamed")
        .property("Name", TypeSig::String)
        .build();

    let mut descriptor = TypeDescriptor::new("Incomplete").with_capability(named);
    let result = synthesizer.compile(&mut descriptor);

    assert!(matches!(result, Err(Error::MissingMember { .. })));
    assert!(result.is_err_and(|e| e.is_synthesis_error()));
    assert!(!descriptor.is_compiled());
    assert!(matches!(
        synthesizer.compile(&mut descriptor),
        Err(Error::DoubleCompilation(_))
    ));
}

/// Indexers must not ask for implicit storage.
#[test]
fn test_indexer_conflict() {
    let indexer = PropertyMember::new("Item", TypeSig::Object)
        .with_index(vec![TypeSig::String])
        .and_then(|p| p.with_implicit_backing());
    assert!(matches!(indexer, Err(Error::IndexedMemberConflict(_))));

    let backed_first = PropertyMember::new("Item", TypeSig::Object)
        .with_implicit_backing()
        .and_then(|p| p.with_index(vec![TypeSig::String]));
    assert!(matches!(backed_first, Err(Error::IndexedMemberConflict(_))));
}

/// Decimal tags cannot be embedded by the default host.
#[test]
fn test_decimal_literal_unsupported() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let tag = AttributeType::new(
        "Threshold",
        vec![vec![AttributeParam::required("value", TypeSig::Decimal)]],
    );

    let mut descriptor = TypeDescriptor::new("Tagged");
    descriptor.add_attribute(AttributeDescriptor::new(
        &tag,
        vec![Literal::Decimal(serde_json::Number::from(1))],
    )?);
    assert!(matches!(
        synthesizer.compile(&mut descriptor),
        Err(Error::UnsupportedLiteral(_))
    ));
    Ok(())
}

/// Compiled types are usable from several threads.
#[test]
fn test_shared_across_threads() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let mut descriptor = TypeDescriptor::new("Counter");
    descriptor.add_member(PropertyMember::new("Count", TypeSig::I4));
    let ty = synthesizer.compile(&mut descriptor)?;

    let handles: Vec<_> = (0..4i32)
        .map(|i| {
            let ty = ty.clone();
            std::thread::spawn(move || -> Result<Value> {
                let instance = ty.create_instance(&[])?;
                instance.set("Count", i)?;
                instance.get("Count")
            })
        })
        .collect();

    for (i, handle) in (0..4i32).zip(handles) {
        let value = handle.join().map_err(|_| Error::Error("thread panicked".into()))??;
        assert_eq!(value, Value::I32(i));
    }
    Ok(())
}
