//! The Define phase: one function per member kind.
//!
//! Every function generates the member's bodies against an [`EmitScope`] first and only then
//! allocates the member on the builder, so a generator that fails leaves no half-defined member
//! behind. On success the descriptor is flagged as defined and remembers its token.

use std::sync::Arc;

use tracing::trace;

use crate::{
    codegen::{
        accessor::{base_getter, base_setter, empty_body, field_getter, field_setter},
        detour::{forward_get, forward_invoke, forward_set},
        dispose::{dispose_body, finalizer_body, DisposePlan},
        EmitScope, GetterBody, MethodBody, SetterBody, StaticBody,
    },
    config::SynthesisConfig,
    descriptor::{
        AttributeDescriptor, AttributeInstance, ConstructorMember, DetourMethodMember,
        DetourPropertyMember, DisposalMember, FieldMember, FinalizerMember, MemberDescriptor,
        MethodAttributes, MethodMember, PropertyMember,
    },
    host::{ConstructorDef, FieldDef, MethodDef, PropertyDef, TypeBuilder},
    runtime::{CompiledType, Instance, MemberRef},
    synthesis::overrides,
    typesystem::{TypeSig, Value},
    Error, Result,
};

/// Defines one member.
pub(crate) fn define_member(
    builder: &mut dyn TypeBuilder,
    member: &mut MemberDescriptor,
    config: &SynthesisConfig,
) -> Result<()> {
    trace!(ty = %builder.name(), kind = %member.kind(), member = %member.name(), "defining");
    match member {
        MemberDescriptor::Field(m) => define_field(builder, m),
        MemberDescriptor::Property(m) => define_property(builder, m, config),
        MemberDescriptor::Method(m) => define_method(builder, m, config),
        MemberDescriptor::Constructor(m) => define_constructor(builder, m, config),
        MemberDescriptor::DetourMethod(m) => define_detour_method(builder, m),
        MemberDescriptor::DetourProperty(m) => define_detour_property(builder, m, config),
        MemberDescriptor::Disposal(m) => define_disposal(builder, m, config),
        MemberDescriptor::Finalizer(m) => define_finalizer(builder, m),
    }
}

/// Embeds the literal arguments of `attributes`.
pub(crate) fn embed_attributes(
    builder: &dyn TypeBuilder,
    attributes: &[AttributeDescriptor],
) -> Result<Vec<AttributeInstance>> {
    attributes
        .iter()
        .map(|attribute| {
            let args = attribute
                .args()
                .iter()
                .map(|literal| builder.embed_literal(literal))
                .collect::<Result<Vec<_>>>()?;
            Ok(AttributeInstance {
                name: attribute.attribute_type().name().to_string(),
                args,
            })
        })
        .collect()
}

fn define_field(builder: &mut dyn TypeBuilder, field: &mut FieldMember) -> Result<()> {
    let attributes = embed_attributes(builder, &field.attributes)?;
    let handle = builder.define_field(FieldDef {
        name: field.name().to_string(),
        ty: field.ty().clone(),
        flags: field.flags(),
        attributes,
    })?;
    field.token = Some(handle.token());
    field.defined = true;
    Ok(())
}

/// Default accessors: the supplied strategy, else the base accessor of a base override, else
/// the backing field.
fn property_bodies(
    builder: &dyn TypeBuilder,
    property: &PropertyMember,
    resolved: &overrides::PropertyOverrides,
    config: &SynthesisConfig,
) -> Result<(Option<GetterBody>, Option<SetterBody>)> {
    let scope = EmitScope::new(builder, property.name(), config);
    let backing = || -> Result<_> {
        let name = property.backing_field().ok_or_else(|| {
            Error::InvalidDescriptor(format!(
                "property '{}' has neither storage nor accessor bodies",
                property.name()
            ))
        })?;
        scope.field(name)
    };

    let getter = if property.can_read() {
        Some(match (&property.getter, &resolved.base) {
            (Some(generate), _) => generate(&scope)?,
            (None, Some(base)) if base.can_read() => base_getter(base.clone()),
            (None, Some(_)) => {
                return Err(Error::missing(
                    format!("{}::base", builder.name()),
                    format!("{}.get", property.name()),
                ))
            }
            (None, None) => field_getter(backing()?),
        })
    } else {
        None
    };

    let setter = if property.can_write() {
        Some(match (&property.setter, &resolved.base) {
            (Some(generate), _) => generate(&scope)?,
            (None, Some(base)) if base.can_write() => base_setter(base.clone()),
            (None, Some(_)) => {
                return Err(Error::missing(
                    format!("{}::base", builder.name()),
                    format!("{}.set", property.name()),
                ))
            }
            (None, None) => field_setter(backing()?),
        })
    } else {
        None
    };

    Ok((getter, setter))
}

fn emit_property(
    builder: &mut dyn TypeBuilder,
    property: &mut PropertyMember,
    refs: Vec<MemberRef>,
    getter: Option<GetterBody>,
    setter: Option<SetterBody>,
) -> Result<()> {
    let attributes = embed_attributes(builder, &property.attributes)?;
    let handle = builder.define_property(PropertyDef {
        name: property.name().to_string(),
        ty: property.ty().clone(),
        index: property.index().to_vec(),
        getter,
        setter,
        overrides: refs,
        attributes,
    })?;
    property.token = Some(handle.token());
    property.defined = true;
    Ok(())
}

fn define_property(
    builder: &mut dyn TypeBuilder,
    property: &mut PropertyMember,
    config: &SynthesisConfig,
) -> Result<()> {
    let resolved = overrides::resolve_property(builder, property)?;
    let (getter, setter) = property_bodies(builder, property, &resolved, config)?;
    emit_property(builder, property, resolved.refs, getter, setter)
}

fn param_types(method: &MethodMember) -> Vec<TypeSig> {
    method.params().iter().map(|p| p.ty().clone()).collect()
}

fn emit_method(
    builder: &mut dyn TypeBuilder,
    method: &mut MethodMember,
    body: Option<MethodBody>,
) -> Result<()> {
    let resolved =
        overrides::resolve_method(builder, method.name(), &param_types(method), &method.overrides)?;
    let body: MethodBody = match (body, resolved.base) {
        (Some(body), _) => body,
        (None, Some(base)) => {
            Arc::new(move |instance: &Instance, args: &[Value]| base.invoke(instance, args))
        }
        (None, None) => empty_body(),
    };

    let mut flags = method.flags();
    if !resolved.refs.is_empty() || !method.overrides.is_empty() {
        flags |= MethodAttributes::VIRTUAL | MethodAttributes::FINAL;
    }

    let attributes = embed_attributes(builder, &method.attributes)?;
    let handle = builder.define_method(MethodDef {
        name: method.name().to_string(),
        return_type: method.return_type().clone(),
        params: method.params().to_vec(),
        flags,
        body,
        overrides: resolved.refs,
        attributes,
    })?;
    method.token = Some(handle.token());
    method.defined = true;
    Ok(())
}

fn define_method(
    builder: &mut dyn TypeBuilder,
    method: &mut MethodMember,
    config: &SynthesisConfig,
) -> Result<()> {
    let body = match &method.body {
        Some(generate) => Some(generate(&EmitScope::new(builder, method.name(), config))?),
        None => None,
    };
    emit_method(builder, method, body)
}

fn define_constructor(
    builder: &mut dyn TypeBuilder,
    constructor: &mut ConstructorMember,
    config: &SynthesisConfig,
) -> Result<()> {
    if constructor.is_static() {
        let body: StaticBody = constructor
            .static_body
            .clone()
            .unwrap_or_else(|| Arc::new(|_: &CompiledType| Ok(())));
        constructor.token = Some(builder.set_static_initializer(body)?);
        constructor.defined = true;
        return Ok(());
    }

    let body = match &constructor.body {
        Some(generate) => Some(generate(&EmitScope::new(builder, constructor.name(), config))?),
        None => None,
    };
    let handle = builder.define_constructor(ConstructorDef {
        params: constructor.params().to_vec(),
        body,
    })?;
    constructor.token = Some(handle.token());
    constructor.defined = true;
    Ok(())
}

fn define_detour_method(
    builder: &mut dyn TypeBuilder,
    detour: &mut DetourMethodMember,
) -> Result<()> {
    let target = builder
        .field(detour.target_field())
        .ok_or_else(|| Error::missing(builder.name(), detour.target_field()))?;
    let body = forward_invoke(target, detour.method.name().to_string(), detour.wrap.clone());
    emit_method(builder, &mut detour.method, Some(body))
}

fn define_detour_property(
    builder: &mut dyn TypeBuilder,
    detour: &mut DetourPropertyMember,
    config: &SynthesisConfig,
) -> Result<()> {
    let resolved = overrides::resolve_property(builder, &detour.property)?;
    let (getter, setter) = {
        let scope = EmitScope::new(builder, detour.property.name(), config);
        let target = scope.field(detour.target_field())?;
        let cache = detour
            .cache_field()
            .map(|name| scope.field(name))
            .transpose()?;
        let name = detour.property.name().to_string();

        let getter = detour
            .property
            .can_read()
            .then(|| forward_get(target.clone(), name.clone(), detour.wrap.clone(), cache));
        let setter = detour
            .property
            .can_write()
            .then(|| forward_set(target, name));
        (getter, setter)
    };
    emit_property(builder, &mut detour.property, resolved.refs, getter, setter)
}

fn define_disposal(
    builder: &mut dyn TypeBuilder,
    disposal: &mut DisposalMember,
    config: &SynthesisConfig,
) -> Result<()> {
    let body = {
        let scope = EmitScope::new(builder, disposal.method.name(), config);
        let disposed_name = disposal
            .disposed_field()
            .unwrap_or(config.disposed_field_name.as_str());
        let plan = DisposePlan {
            disposed: scope.field(disposed_name)?,
            target: scope.field(disposal.target_field())?,
            children: disposal
                .children()
                .iter()
                .map(|child| scope.field(child))
                .collect::<Result<Vec<_>>>()?,
            pre_release: disposal.pre_release.clone(),
            release: disposal.release.clone(),
            post_release: disposal.post_release.clone(),
        };
        dispose_body(plan)
    };
    emit_method(builder, &mut disposal.method, Some(body))
}

fn define_finalizer(builder: &mut dyn TypeBuilder, finalizer: &mut FinalizerMember) -> Result<()> {
    let dispose = builder
        .method(finalizer.disposal_method())
        .ok_or_else(|| Error::missing(builder.name(), finalizer.disposal_method()))?;
    finalizer.token = Some(builder.set_finalizer(finalizer_body(dispose))?);
    finalizer.defined = true;
    Ok(())
}
