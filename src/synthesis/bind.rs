use crate::{
    descriptor::MemberDescriptor,
    runtime::CompiledType,
    token::Token,
    Error, Result,
};

fn lost(ty: &CompiledType, member: &MemberDescriptor) -> Error {
    Error::Error(format!(
        "member '{}' of '{}' has no compiled counterpart",
        member.name(),
        ty.name()
    ))
}

/// Binds every defined member to its handle on the sealed type, by token.
///
/// Static initializers and finalizers have no handle and are skipped.
pub(crate) fn bind_members(ty: &CompiledType, members: &[MemberDescriptor]) -> Result<()> {
    for member in members {
        let Some(token) = member.token() else {
            return Err(lost(ty, member));
        };
        bind_member(ty, member, token)?;
    }
    Ok(())
}

fn bind_member(ty: &CompiledType, member: &MemberDescriptor, token: Token) -> Result<()> {
    match member {
        MemberDescriptor::Field(m) => {
            let handle = ty.field_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.bound.set(handle.clone());
        }
        MemberDescriptor::Property(m) => {
            let handle = ty.property_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.bound.set(handle.clone());
        }
        MemberDescriptor::DetourProperty(m) => {
            let handle = ty.property_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.property.bound.set(handle.clone());
        }
        MemberDescriptor::Method(m) => {
            let handle = ty.method_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.bound.set(handle.clone());
        }
        MemberDescriptor::DetourMethod(m) => {
            let handle = ty.method_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.method.bound.set(handle.clone());
        }
        MemberDescriptor::Disposal(m) => {
            let handle = ty.method_by_token(token).ok_or_else(|| lost(ty, member))?;
            let _ = m.method.bound.set(handle.clone());
        }
        MemberDescriptor::Constructor(m) if !m.is_static() => {
            let handle = ty
                .constructor_by_token(token)
                .ok_or_else(|| lost(ty, member))?;
            let _ = m.bound.set(handle.clone());
        }
        MemberDescriptor::Constructor(_) | MemberDescriptor::Finalizer(_) => {}
    }
    Ok(())
}
