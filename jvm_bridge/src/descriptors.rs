//! Descriptor cache — foreign types and members, resolved once.
//!
//! Lifecycle:
//!   1. `DescriptorCache::resolve` runs at startup over a fixed table of
//!      `TypeSpec`s. The first failure aborts resolution, releases whatever
//!      was already resolved and is returned as a `DescriptorError`.
//!   2. After that the cache is read-only. Lookups never touch the runtime.
//!   3. `teardown` (or drop) releases every type handle exactly once.
//!
//! `java/lang/Throwable.getMessage()` is always resolved first; the
//! exception translator is built from it.

use tracing::{debug, info};

use crate::error::{DescriptorError, ForeignError};
use crate::exception::{clear_pending, ExceptionTranslator};
use crate::runtime::ForeignRuntime;

pub const THROWABLE: &str = "java/lang/Throwable";
pub const CONSTRUCTOR: &str = "<init>";

const THROWABLE_SPEC: TypeSpec = TypeSpec {
    name: THROWABLE,
    members: &[MemberSpec::method("getMessage", "()Ljava/lang/String;")],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Method,
    StaticField,
}

impl MemberKind {
    fn label(self) -> &'static str {
        match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
            MemberKind::StaticField => "static field",
        }
    }
}

/// One member to resolve: name, JVM signature and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberSpec {
    pub name: &'static str,
    pub signature: &'static str,
    pub kind: MemberKind,
}

impl MemberSpec {
    pub const fn constructor(signature: &'static str) -> Self {
        Self {
            name: CONSTRUCTOR,
            signature,
            kind: MemberKind::Constructor,
        }
    }

    pub const fn method(name: &'static str, signature: &'static str) -> Self {
        Self {
            name,
            signature,
            kind: MemberKind::Method,
        }
    }

    pub const fn static_field(name: &'static str, signature: &'static str) -> Self {
        Self {
            name,
            signature,
            kind: MemberKind::StaticField,
        }
    }
}

/// A foreign type and the members of it the application calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: &'static str,
    pub members: &'static [MemberSpec],
}

enum Member<R: ForeignRuntime> {
    Method(R::Method),
    Field(R::Field),
}

struct CachedMember<R: ForeignRuntime> {
    spec: MemberSpec,
    member: Member<R>,
}

struct CachedType<R: ForeignRuntime> {
    name: &'static str,
    ty: R::Type,
    members: Vec<CachedMember<R>>,
}

/// Populate-once, read-many table of resolved descriptors.
pub struct DescriptorCache<R: ForeignRuntime> {
    runtime: R,
    types: Vec<CachedType<R>>,
    translator: ExceptionTranslator<R>,
    torn_down: bool,
}

impl<R: ForeignRuntime> DescriptorCache<R> {
    /// Resolve `java/lang/Throwable` plus every type and member in `specs`.
    ///
    /// A type listed more than once is looked up once; its member lists
    /// are merged.
    pub fn resolve(runtime: &R, specs: &[TypeSpec]) -> Result<Self, DescriptorError> {
        let mut types: Vec<CachedType<R>> = Vec::new();

        for spec in std::iter::once(&THROWABLE_SPEC).chain(specs) {
            if let Err(err) = resolve_into(runtime, spec, &mut types) {
                release_all(runtime, &mut types);
                return Err(err);
            }
        }

        let get_message = match lookup_method(&types, THROWABLE, "getMessage") {
            Ok(method) => method,
            Err(err) => {
                release_all(runtime, &mut types);
                return Err(err);
            }
        };

        let member_count: usize = types.iter().map(|t| t.members.len()).sum();
        info!(
            types = types.len(),
            members = member_count,
            "foreign descriptors resolved"
        );

        Ok(Self {
            runtime: runtime.clone(),
            translator: ExceptionTranslator::new(runtime.clone(), get_message),
            types,
            torn_down: false,
        })
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn translator(&self) -> &ExceptionTranslator<R> {
        &self.translator
    }

    /// The resolved handle for `type_name`.
    pub fn type_of(&self, type_name: &str) -> Result<&R::Type, DescriptorError> {
        self.find(type_name).map(|t| &t.ty)
    }

    /// The constructor registered for `type_name`.
    pub fn constructor(&self, type_name: &str) -> Result<R::Method, DescriptorError> {
        self.method(type_name, CONSTRUCTOR)
    }

    /// A registered method (or constructor) of `type_name`.
    pub fn method(&self, type_name: &str, member: &str) -> Result<R::Method, DescriptorError> {
        self.ensure_live()?;
        lookup_method(&self.types, type_name, member)
    }

    /// A registered static field of `type_name`.
    pub fn static_field(&self, type_name: &str, member: &str) -> Result<R::Field, DescriptorError> {
        let cached = self.find_member(type_name, member)?;
        match cached.member {
            Member::Field(field) => Ok(field),
            Member::Method(_) => Err(kind_mismatch(type_name, cached, MemberKind::StaticField)),
        }
    }

    /// Number of resolved types, including `java/lang/Throwable`.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release every cached type handle. Subsequent calls are no-ops and
    /// subsequent lookups fail with `DescriptorError::TornDown`.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let released = self.types.len();
        release_all(&self.runtime, &mut self.types);
        self.torn_down = true;
        info!(types = released, "foreign descriptors released");
    }

    fn ensure_live(&self) -> Result<(), DescriptorError> {
        if self.torn_down {
            Err(DescriptorError::TornDown)
        } else {
            Ok(())
        }
    }

    fn find(&self, type_name: &str) -> Result<&CachedType<R>, DescriptorError> {
        self.ensure_live()?;
        find_type(&self.types, type_name)
    }

    fn find_member(
        &self,
        type_name: &str,
        member: &str,
    ) -> Result<&CachedMember<R>, DescriptorError> {
        self.ensure_live()?;
        find_member(&self.types, type_name, member)
    }
}

impl<R: ForeignRuntime> Drop for DescriptorCache<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn resolve_into<R: ForeignRuntime>(
    runtime: &R,
    spec: &TypeSpec,
    types: &mut Vec<CachedType<R>>,
) -> Result<(), DescriptorError> {
    let index = match types.iter().position(|t| t.name == spec.name) {
        Some(index) => index,
        None => {
            let Some(ty) = runtime.find_type(spec.name) else {
                return Err(DescriptorError::TypeNotFound {
                    type_name: spec.name.to_string(),
                    cause: failure_cause(runtime, types),
                });
            };
            debug!(type_name = spec.name, "resolved foreign type");
            types.push(CachedType {
                name: spec.name,
                ty,
                members: Vec::new(),
            });
            types.len() - 1
        }
    };

    for member_spec in spec.members {
        let cached = &types[index];
        if cached.members.iter().any(|m| m.spec == *member_spec) {
            continue;
        }
        let Some(member) = resolve_member(runtime, &cached.ty, member_spec) else {
            return Err(DescriptorError::MemberNotFound {
                type_name: spec.name.to_string(),
                member: member_spec.name.to_string(),
                signature: member_spec.signature.to_string(),
                cause: failure_cause(runtime, types),
            });
        };
        debug!(
            type_name = spec.name,
            member = member_spec.name,
            signature = member_spec.signature,
            "resolved foreign member"
        );
        types[index].members.push(CachedMember {
            spec: *member_spec,
            member,
        });
    }
    Ok(())
}

/// Clear the exception left by a failed lookup. Once `getMessage` itself
/// is resolved the message is recovered, before that it is dropped.
fn failure_cause<R: ForeignRuntime>(runtime: &R, types: &[CachedType<R>]) -> ForeignError {
    match lookup_method(types, THROWABLE, "getMessage") {
        Ok(get_message) => ExceptionTranslator::new(runtime.clone(), get_message)
            .check_and_clear()
            .err()
            .unwrap_or(ForeignError::Unreadable),
        Err(_) => clear_pending(runtime),
    }
}

fn resolve_member<R: ForeignRuntime>(
    runtime: &R,
    ty: &R::Type,
    spec: &MemberSpec,
) -> Option<Member<R>> {
    match spec.kind {
        MemberKind::Constructor | MemberKind::Method => runtime
            .find_method(ty, spec.name, spec.signature)
            .map(Member::Method),
        MemberKind::StaticField => runtime
            .find_static_field(ty, spec.name, spec.signature)
            .map(Member::Field),
    }
}

fn release_all<R: ForeignRuntime>(runtime: &R, types: &mut Vec<CachedType<R>>) {
    for cached in types.drain(..) {
        debug!(type_name = cached.name, "releasing foreign type");
        runtime.release_type(cached.ty);
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn find_type<'a, R: ForeignRuntime>(
    types: &'a [CachedType<R>],
    type_name: &str,
) -> Result<&'a CachedType<R>, DescriptorError> {
    types
        .iter()
        .find(|t| t.name == type_name)
        .ok_or_else(|| DescriptorError::Unregistered {
            type_name: type_name.to_string(),
            member: String::new(),
        })
}

fn find_member<'a, R: ForeignRuntime>(
    types: &'a [CachedType<R>],
    type_name: &str,
    member: &str,
) -> Result<&'a CachedMember<R>, DescriptorError> {
    find_type(types, type_name)?
        .members
        .iter()
        .find(|m| m.spec.name == member)
        .ok_or_else(|| DescriptorError::Unregistered {
            type_name: type_name.to_string(),
            member: member.to_string(),
        })
}

fn lookup_method<R: ForeignRuntime>(
    types: &[CachedType<R>],
    type_name: &str,
    member: &str,
) -> Result<R::Method, DescriptorError> {
    let cached = find_member(types, type_name, member)?;
    match cached.member {
        Member::Method(method) => Ok(method),
        Member::Field(_) => Err(kind_mismatch(type_name, cached, MemberKind::Method)),
    }
}

fn kind_mismatch<R: ForeignRuntime>(
    type_name: &str,
    cached: &CachedMember<R>,
    expected: MemberKind,
) -> DescriptorError {
    DescriptorError::KindMismatch {
        type_name: type_name.to_string(),
        member: cached.spec.name.to_string(),
        expected: expected.label(),
        actual: cached.spec.kind.label(),
    }
}
