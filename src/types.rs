//! Type identity and dispatch keys

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

/// Identity of a Rust type, paired with its name for diagnostics.
///
/// Equality and hashing only look at the [`TypeId`]; the name is carried so
/// errors such as a missing handler can report the types involved.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Returns the identity of `T`
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as reported by [`std::any::type_name`]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Ordered tuple of types selecting one handler operation.
///
/// For an extraction plan the first element is the subject's own type,
/// followed by the declared type of each slot. For an operation it is the
/// list of its parameter types.
///
/// The hash is computed once when the key is built, so table lookups on the
/// dispatch path compare a `u64` first and only walk the tuple on a hash match.
#[derive(Clone)]
pub struct DispatchKey {
    types: Arc<[TypeInfo]>,
    hash: u64,
}

impl DispatchKey {
    pub fn new(types: Vec<TypeInfo>) -> Self {
        let mut hasher = FxHasher::default();
        for ty in &types {
            ty.id.hash(&mut hasher);
        }
        Self {
            types: types.into(),
            hash: hasher.finish(),
        }
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    /// The first type of the tuple: the dispatch subject's own type
    pub fn subject(&self) -> Option<TypeInfo> {
        self.types.first().copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl PartialEq for DispatchKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.types == other.types
    }
}

impl Eq for DispatchKey {}

impl Hash for DispatchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.iter()).finish()
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, ty) in self.types.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(ty.name)?;
        }
        f.write_str(")")
    }
}
