use super::{Kind, TypeCode};
use crate::error::{CorbaError, CorbaResult};
use std::collections::HashMap;
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref PRIMITIVES: HashMap<Kind, TypeCode> = build_primitives();
    static ref REGISTRY: RwLock<HashMap<String, TypeCode>> = RwLock::new(HashMap::new());
}

fn build_primitives() -> HashMap<Kind, TypeCode> {
    let mut m = HashMap::new();
    let entries: &[(Kind, &str, &str)] = &[
        (Kind::Null, "IDL:omg.org/CORBA/Null:1.0", "null"),
        (Kind::Void, "IDL:omg.org/CORBA/Void:1.0", "void"),
        (Kind::Short, "IDL:omg.org/CORBA/Short:1.0", "short"),
        (Kind::UShort, "IDL:omg.org/CORBA/UShort:1.0", "unsigned short"),
        (Kind::Long, "IDL:omg.org/CORBA/Long:1.0", "long"),
        (Kind::ULong, "IDL:omg.org/CORBA/ULong:1.0", "unsigned long"),
        (Kind::LongLong, "IDL:omg.org/CORBA/LongLong:1.0", "long long"),
        (Kind::ULongLong, "IDL:omg.org/CORBA/ULongLong:1.0", "unsigned long long"),
        (Kind::Float, "IDL:omg.org/CORBA/Float:1.0", "float"),
        (Kind::Double, "IDL:omg.org/CORBA/Double:1.0", "double"),
        (Kind::Boolean, "IDL:omg.org/CORBA/Boolean:1.0", "boolean"),
        (Kind::Char, "IDL:omg.org/CORBA/Char:1.0", "char"),
        (Kind::Octet, "IDL:omg.org/CORBA/Octet:1.0", "octet"),
        (Kind::Any, "IDL:omg.org/CORBA/Any:1.0", "any"),
        (Kind::TypeCode, "IDL:omg.org/CORBA/TypeCode:1.0", "TypeCode"),
        (Kind::Object, "IDL:omg.org/CORBA/Object:1.0", "Object"),
        (Kind::String, "IDL:string:1.0", "string"),
    ];
    for (kind, repo_id, name) in entries {
        m.insert(*kind, TypeCode::primitive(*kind, repo_id, name));
    }
    m
}

/// Returns the process-wide singleton for a primitive `Kind`.
///
/// # Panics
/// Panics if `kind` is not one of the primitive kinds (struct/union/enum/etc. have no singleton).
pub fn get_basic(kind: Kind) -> TypeCode {
    PRIMITIVES
        .get(&kind)
        .cloned()
        .unwrap_or_else(|| panic!("{kind:?} is not a basic TypeCode kind"))
}

/// Looks up a previously created composite TypeCode by repository id.
pub fn get_by_id(repo_id: &str) -> Option<TypeCode> {
    if let Some(t) = PRIMITIVES.values().find(|t| t.repo_id() == repo_id) {
        return Some(t.clone());
    }
    REGISTRY.read().expect("typecode registry poisoned").get(repo_id).cloned()
}

/// Registers a TypeCode built outside of `create_*`, e.g. for externally-constructed descriptors.
pub fn register(tc: TypeCode) {
    REGISTRY
        .write()
        .expect("typecode registry poisoned")
        .insert(tc.repo_id().to_string(), tc);
}

/// Idempotent-by-repo_id creation used by `TypeCode::create_*`: returns the existing descriptor if
/// one is already registered under `repo_id` and its kind matches, builds and registers a fresh one
/// otherwise, and errors if the existing descriptor's kind disagrees.
pub(super) fn create_composite(
    kind: Kind,
    repo_id: &str,
    _name: &str,
    build: impl FnOnce(&str) -> TypeCode,
) -> CorbaResult<TypeCode> {
    let mut guard = REGISTRY.write().expect("typecode registry poisoned");
    if let Some(existing) = guard.get(repo_id) {
        return if existing.kind() == kind {
            Ok(existing.clone())
        } else {
            Err(CorbaError::TypeCodeKindMismatch {
                repo_id: repo_id.to_string(),
            })
        };
    }
    let tc = build(repo_id);
    guard.insert(repo_id.to_string(), tc.clone());
    Ok(tc)
}
