use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, OnceLock, RwLock},
};

use tracing::trace;

use crate::{
    codegen::{MethodBody, StaticBody},
    descriptor::{AttributeInstance, FieldAttributes, Literal},
    host::{default::HostState, ConstructorDef, FieldDef, MethodDef, PropertyDef, TypeBuilder},
    runtime::{
        CompiledType, CompiledTypeRc, ConstructorHandle, Dispatch, FieldHandle, FieldStorage,
        MethodHandle, PropertyHandle, StaticSlots,
    },
    token::Token,
    typesystem::{CapabilityRc, MethodSig, PropertySig, TypeSig, Value},
    Error, Result,
};

/// Builder of one type on the [`crate::host::DefaultHost`].
pub struct DefaultTypeBuilder {
    host: Arc<HostState>,
    token: Token,
    name: String,
    base: Option<CompiledTypeRc>,
    capabilities: Vec<CapabilityRc>,
    attributes: Vec<AttributeInstance>,
    fields: Vec<FieldHandle>,
    next_slot: usize,
    statics: StaticSlots,
    properties: Vec<Arc<PropertyHandle>>,
    methods: Vec<Arc<MethodHandle>>,
    constructors: Vec<Arc<ConstructorHandle>>,
    static_init: Option<StaticBody>,
    finalizer: Option<MethodBody>,
}

impl DefaultTypeBuilder {
    pub(crate) fn new(
        host: Arc<HostState>,
        token: Token,
        name: String,
        base: Option<CompiledTypeRc>,
    ) -> Self {
        let next_slot = base.as_ref().map_or(0, |base| base.slot_count());
        DefaultTypeBuilder {
            host,
            token,
            name,
            base,
            capabilities: Vec::new(),
            attributes: Vec::new(),
            fields: Vec::new(),
            next_slot,
            statics: Arc::new(RwLock::new(Vec::new())),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            static_init: None,
            finalizer: None,
        }
    }

    /// Every capability of the sealed type: the base's, then the declared ones with everything
    /// they inherit, without duplicates.
    fn flatten_capabilities(&self) -> Vec<CapabilityRc> {
        let inherited = self
            .base
            .iter()
            .flat_map(|base| base.capabilities().iter().cloned());
        let declared = self
            .capabilities
            .iter()
            .flat_map(|capability| capability.iter_self_and_inherited());

        let mut flattened: Vec<CapabilityRc> = Vec::new();
        for capability in inherited.chain(declared) {
            if !flattened.iter().any(|c| c.name() == capability.name()) {
                flattened.push(capability);
            }
        }
        flattened
    }

    fn resolve_property(&self, capability: &CapabilityRc, sig: &PropertySig) -> Result<Dispatch> {
        let explicit: Vec<&Arc<PropertyHandle>> = self
            .properties
            .iter()
            .filter(|p| {
                p.index == sig.index
                    && p.overrides
                        .iter()
                        .any(|o| o.name == sig.name && o.capability.name() == capability.name())
            })
            .collect();

        let candidates = if explicit.is_empty() {
            self.properties
                .iter()
                .filter(|p| {
                    p.overrides.is_empty()
                        && p.name == sig.name
                        && p.ty == sig.ty
                        && p.index == sig.index
                })
                .collect()
        } else {
            explicit
        };

        let member = format!("{}.{}", capability.name(), sig.name);
        match candidates.as_slice() {
            [property] => {
                if sig.get && !property.can_read() {
                    return Err(Error::missing(&self.name, format!("{member}.get")));
                }
                if sig.set && !property.can_write() {
                    return Err(Error::missing(&self.name, format!("{member}.set")));
                }
                Ok(Dispatch::Property((*property).clone()))
            }
            [] => self.inherited_dispatch(capability, &sig.name, |base| {
                base.property(&sig.name)
                    .filter(|p| p.ty == sig.ty && p.index == sig.index)
                    .map(|p| Dispatch::Property(p.clone()))
            }),
            many => Err(Error::AmbiguousDescriptor {
                member,
                candidates: many.len(),
            }),
        }
    }

    fn resolve_method(
        &self,
        capability: &CapabilityRc,
        sig: &MethodSig,
    ) -> Result<Arc<MethodHandle>> {
        let matches_sig = |m: &MethodHandle| {
            m.name == sig.name
                && m.params.len() == sig.params.len()
                && m.params.iter().zip(&sig.params).all(|(p, ty)| p.ty() == ty)
        };

        let explicit: Vec<&Arc<MethodHandle>> = self
            .methods
            .iter()
            .filter(|m| {
                m.overrides
                    .iter()
                    .any(|o| o.name == sig.name && o.capability.name() == capability.name())
            })
            .collect();

        // Overloads of one capability method are told apart by their parameters.
        let candidates: Vec<&Arc<MethodHandle>> = if explicit.is_empty() {
            self.methods
                .iter()
                .filter(|m| m.overrides.is_empty() && matches_sig(m))
                .collect()
        } else if explicit.len() > 1 {
            explicit.into_iter().filter(|m| matches_sig(m)).collect()
        } else {
            explicit
        };

        match candidates.as_slice() {
            [method] => Ok((*method).clone()),
            [] => self
                .base
                .as_ref()
                .and_then(|base| {
                    base.dispatch(capability.name(), &sig.name)
                        .and_then(|d| d.methods().iter().find(|m| matches_sig(m)).cloned())
                        .or_else(|| {
                            base.hierarchy()
                                .flat_map(|ty| ty.methods().iter())
                                .find(|m| matches_sig(m))
                                .cloned()
                        })
                })
                .ok_or_else(|| {
                    Error::missing(&self.name, format!("{}.{}", capability.name(), sig.name))
                }),
            many => Err(Error::AmbiguousDescriptor {
                member: format!("{}.{}", capability.name(), sig.name),
                candidates: many.len(),
            }),
        }
    }

    /// Falls back to the base type: its dispatch entry first, then a matching member by name.
    fn inherited_dispatch<F>(&self, capability: &CapabilityRc, member: &str, by_name: F) -> Result<Dispatch>
    where
        F: FnOnce(&CompiledTypeRc) -> Option<Dispatch>,
    {
        self.base
            .as_ref()
            .and_then(|base| {
                base.dispatch(capability.name(), member)
                    .cloned()
                    .or_else(|| by_name(base))
            })
            .ok_or_else(|| Error::missing(&self.name, format!("{}.{member}", capability.name())))
    }

    fn build_dispatch(&self, capabilities: &[CapabilityRc]) -> Result<HashMap<(String, String), Dispatch>> {
        let mut dispatch = HashMap::new();
        for capability in capabilities {
            for sig in capability.properties() {
                let target = self.resolve_property(capability, sig)?;
                dispatch.insert((capability.name().to_string(), sig.name.clone()), target);
            }
            for sig in capability.methods() {
                let method = self.resolve_method(capability, sig)?;
                match dispatch.entry((capability.name().to_string(), sig.name.clone())) {
                    Entry::Occupied(mut entry) => entry.get_mut().push_overload(method),
                    Entry::Vacant(entry) => {
                        entry.insert(Dispatch::Method(method));
                    }
                }
            }
        }
        Ok(dispatch)
    }
}

impl TypeBuilder for DefaultTypeBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> Option<&CompiledTypeRc> {
        self.base.as_ref()
    }

    fn define_field(&mut self, def: FieldDef) -> Result<FieldHandle> {
        if self.fields.iter().any(|f| f.name == def.name) {
            return Err(Error::InvalidDescriptor(format!(
                "field '{}' is already defined on '{}'",
                def.name, self.name
            )));
        }

        let storage = if def.flags.contains(FieldAttributes::STATIC) {
            let mut statics = self.statics.write()?;
            statics.push(def.ty.default_value());
            FieldStorage::Static(self.statics.clone(), statics.len() - 1)
        } else {
            self.next_slot += 1;
            FieldStorage::Instance(self.next_slot - 1)
        };

        let handle = FieldHandle {
            token: self.host.next_token(Token::FIELD),
            name: def.name,
            ty: def.ty,
            flags: def.flags,
            storage,
            attributes: def.attributes.into(),
        };
        trace!(ty = %self.name, field = %handle.name, token = %handle.token, "field defined");
        self.fields.push(handle.clone());
        Ok(handle)
    }

    fn field(&self, name: &str) -> Option<FieldHandle> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.name == name)
            .cloned()
            .or_else(|| self.base.as_ref().and_then(|base| base.field(name).cloned()))
    }

    fn define_property(&mut self, def: PropertyDef) -> Result<Arc<PropertyHandle>> {
        let handle = Arc::new(PropertyHandle {
            token: self.host.next_token(Token::PROPERTY),
            name: def.name,
            ty: def.ty,
            index: def.index,
            getter: def.getter,
            setter: def.setter,
            overrides: def.overrides,
            attributes: def.attributes,
        });
        trace!(ty = %self.name, property = %handle.name, token = %handle.token, "property defined");
        self.properties.push(handle.clone());
        Ok(handle)
    }

    fn property(&self, name: &str) -> Option<Arc<PropertyHandle>> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .or_else(|| self.base.as_ref().and_then(|base| base.property(name).cloned()))
    }

    fn define_method(&mut self, def: MethodDef) -> Result<Arc<MethodHandle>> {
        let handle = Arc::new(MethodHandle {
            token: self.host.next_token(Token::METHOD),
            name: def.name,
            return_type: def.return_type,
            params: def.params,
            flags: def.flags,
            body: def.body,
            overrides: def.overrides,
            attributes: def.attributes,
        });
        trace!(ty = %self.name, method = %handle.name, token = %handle.token, "method defined");
        self.methods.push(handle.clone());
        Ok(handle)
    }

    fn method(&self, name: &str) -> Option<Arc<MethodHandle>> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .or_else(|| self.base.as_ref().and_then(|base| base.method(name).cloned()))
    }

    fn define_constructor(&mut self, def: ConstructorDef) -> Result<Arc<ConstructorHandle>> {
        let handle = Arc::new(ConstructorHandle {
            token: self.host.next_token(Token::METHOD),
            params: def.params,
            body: def.body,
        });
        trace!(ty = %self.name, token = %handle.token, "constructor defined");
        self.constructors.push(handle.clone());
        Ok(handle)
    }

    fn set_static_initializer(&mut self, body: StaticBody) -> Result<Token> {
        if self.static_init.is_some() {
            return Err(Error::InvalidDescriptor(format!(
                "'{}' already has a static initializer",
                self.name
            )));
        }
        self.static_init = Some(body);
        Ok(self.host.next_token(Token::METHOD))
    }

    fn set_finalizer(&mut self, body: MethodBody) -> Result<Token> {
        if self.finalizer.is_some() {
            return Err(Error::InvalidDescriptor(format!(
                "'{}' already has a finalizer",
                self.name
            )));
        }
        self.finalizer = Some(body);
        Ok(self.host.next_token(Token::METHOD))
    }

    fn add_capability(&mut self, capability: CapabilityRc) {
        if !self
            .capabilities
            .iter()
            .any(|c| c.name() == capability.name())
        {
            self.capabilities.push(capability);
        }
    }

    fn set_attribute(&mut self, attribute: AttributeInstance) {
        self.attributes.push(attribute);
    }

    fn embed_literal(&self, literal: &Literal) -> Result<Value> {
        literal.to_value()
    }

    fn seal(self: Box<Self>) -> Result<CompiledTypeRc> {
        let capabilities = self.flatten_capabilities();
        let dispatch = self.build_dispatch(&capabilities)?;
        let finalizer = self
            .finalizer
            .clone()
            .or_else(|| self.base.as_ref().and_then(|base| base.finalizer().cloned()));

        let this = *self;
        let ty = Arc::new(CompiledType {
            token: this.token,
            name: this.name,
            base: this.base,
            capabilities,
            attributes: this.attributes,
            fields: this.fields,
            slot_count: this.next_slot,
            properties: this.properties,
            methods: this.methods,
            constructors: this.constructors,
            static_init: this.static_init,
            static_state: OnceLock::new(),
            statics: this.statics,
            finalizer,
            dispatch,
        });
        this.host.register(ty.clone());
        trace!(ty = %ty.name(), token = %ty.token(), "type sealed");
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::accessor::{field_getter, field_setter},
        host::{CodeHost, DefaultHost},
        runtime::MemberRef,
        typesystem::CapabilityBuilder,
    };

    fn builder(host: &DefaultHost, name: &str) -> Box<dyn TypeBuilder> {
        host.initialize().unwrap();
        host.define_type(name, None).unwrap()
    }

    fn backed_property(builder: &mut dyn TypeBuilder, name: &str, ty: TypeSig) -> PropertyDef {
        let field = builder
            .define_field(FieldDef {
                name: format!("m_{name}"),
                ty: ty.clone(),
                flags: FieldAttributes::PRIVATE,
                attributes: Vec::new(),
            })
            .unwrap();
        PropertyDef {
            name: name.to_string(),
            ty,
            index: Vec::new(),
            getter: Some(field_getter(field.clone())),
            setter: Some(field_setter(field)),
            overrides: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_seal_missing_capability_member() {
        let host = DefaultHost::new();
        let named = CapabilityBuilder::new("INamed").property("Name", TypeSig::String).build();
        let mut builder = builder(&host, "Nameless");
        builder.add_capability(named);
        assert!(matches!(builder.seal(), Err(Error::MissingMember { .. })));
    }

    #[test]
    fn test_seal_implicit_dispatch() {
        let host = DefaultHost::new();
        let named = CapabilityBuilder::new("INamed").property("Name", TypeSig::String).build();
        let mut builder = builder(&host, "Named");
        let def = backed_property(builder.as_mut(), "Name", TypeSig::String);
        builder.define_property(def).unwrap();
        builder.add_capability(named);

        let ty = builder.seal().unwrap();
        assert!(ty.implements("INamed"));
        assert!(matches!(ty.dispatch("INamed", "Name"), Some(Dispatch::Property(_))));
    }

    #[test]
    fn test_seal_ambiguous_explicit_dispatch() {
        let host = DefaultHost::new();
        let named = CapabilityBuilder::new("INamed").property("Name", TypeSig::String).build();
        let mut builder = builder(&host, "Twice");
        for suffix in ["A", "B"] {
            let mut def = backed_property(builder.as_mut(), &format!("Name{suffix}"), TypeSig::String);
            def.overrides.push(MemberRef {
                capability: named.clone(),
                name: "Name".to_string(),
            });
            builder.define_property(def).unwrap();
        }
        builder.add_capability(named);
        assert!(matches!(
            builder.seal(),
            Err(Error::AmbiguousDescriptor { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_read_only_cannot_satisfy_setter() {
        let host = DefaultHost::new();
        let named = CapabilityBuilder::new("INamed").property("Name", TypeSig::String).build();
        let mut builder = builder(&host, "ReadOnly");
        let mut def = backed_property(builder.as_mut(), "Name", TypeSig::String);
        def.setter = None;
        builder.define_property(def).unwrap();
        builder.add_capability(named);
        assert!(matches!(builder.seal(), Err(Error::MissingMember { .. })));
    }

    #[test]
    fn test_slots_follow_base() {
        let host = DefaultHost::new();
        let mut base = builder(&host, "Base");
        base.define_field(FieldDef {
            name: "a".into(),
            ty: TypeSig::I4,
            flags: FieldAttributes::PRIVATE,
            attributes: Vec::new(),
        })
        .unwrap();
        let base = base.seal().unwrap();

        let mut derived = host.define_type("Derived", Some(base)).unwrap();
        let field = derived
            .define_field(FieldDef {
                name: "b".into(),
                ty: TypeSig::I4,
                flags: FieldAttributes::PRIVATE,
                attributes: Vec::new(),
            })
            .unwrap();
        assert!(matches!(field.storage, FieldStorage::Instance(1)));
        assert!(derived.field("a").is_some());
        assert!(derived
            .define_field(FieldDef {
                name: "b".into(),
                ty: TypeSig::I4,
                flags: FieldAttributes::PRIVATE,
                attributes: Vec::new(),
            })
            .is_err());

        let derived = derived.seal().unwrap();
        assert_eq!(derived.slot_count(), 2);
        assert_eq!(derived.layout().len(), 2);
    }
}
