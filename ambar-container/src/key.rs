//! Type identification keys.
//!
//! [`TypeKey`] identifies a service type within the container. It wraps a
//! [`TypeId`] and carries the structural information Rust cannot recover
//! at runtime: whether the type is a closed generic (and over what) or a
//! collection of some element type.
//!
//! [`CacheKey`] identifies a cached instance: the requested type paired with
//! whatever actually produced it.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::sync::Arc;

use crate::generic::Closed;
use crate::instance::Instance;

/// Identifies a type in the container.
///
/// Equality and hashing use the [`TypeId`] only, so a key built with
/// [`TypeKey::of`] and one built with [`TypeKey::closed`] for the same type
/// are the same key.
///
/// # Examples
/// ```
/// use ambar_container::key::TypeKey;
///
/// trait Mailer {}
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert!(!key.is_abstract());
///
/// // Trait objects cannot be instantiated by value
/// assert!(TypeKey::of::<dyn Mailer>().is_abstract());
/// ```
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    is_abstract: bool,
    shape: Shape,
}

#[derive(Clone)]
enum Shape {
    Plain,
    Closed {
        definition: Box<TypeKey>,
        arguments: Vec<TypeKey>,
    },
    Collection {
        element: Box<TypeKey>,
        assemble: fn(Vec<Instance>) -> Instance,
    },
}

impl TypeKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            is_abstract: is_unsized::<T>(),
            shape: Shape::Plain,
        }
    }

    /// Creates a key for a closed generic type, remembering its open
    /// definition and type arguments.
    ///
    /// Lookups that find no registration for `T` itself fall back to an
    /// open registration of `T::Definition`.
    pub fn closed<T: Closed + ?Sized>() -> Self {
        Self {
            shape: Shape::Closed {
                definition: Box::new(TypeKey::of::<T::Definition>()),
                arguments: T::arguments(),
            },
            ..Self::of::<T>()
        }
    }

    /// Creates a key for "a collection of `T`", which the container
    /// materializes as `Vec<Arc<T>>`.
    pub fn collection_of<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self::collection::<T>(TypeKey::of::<T>())
    }

    /// Like [`TypeKey::collection_of`], for a closed generic element type.
    pub fn closed_collection_of<T: Closed + ?Sized + Send + Sync>() -> Self {
        Self::collection::<T>(TypeKey::closed::<T>())
    }

    fn collection<T: ?Sized + Send + Sync + 'static>(element: TypeKey) -> Self {
        Self {
            shape: Shape::Collection {
                element: Box::new(element),
                assemble: assemble::<T>,
            },
            ..Self::of::<Vec<Arc<T>>>()
        }
    }

    /// Returns the [`TypeId`] of this type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` for unsized types (trait objects, slices, `str`),
    /// which can be requested but never constructed directly.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// The open generic definition, for closed generic keys.
    pub fn definition(&self) -> Option<&TypeKey> {
        match &self.shape {
            Shape::Closed { definition, .. } => Some(definition),
            _ => None,
        }
    }

    /// The type arguments, for closed generic keys. Empty otherwise.
    pub fn arguments(&self) -> &[TypeKey] {
        match &self.shape {
            Shape::Closed { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// The element type, for collection keys.
    pub fn element(&self) -> Option<&TypeKey> {
        match &self.shape {
            Shape::Collection { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Returns `true` if this key identifies type `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Packs resolved elements into the collection value for this key.
    pub(crate) fn assemble(&self, items: Vec<Instance>) -> Option<Instance> {
        match &self.shape {
            Shape::Collection { assemble, .. } => Some(assemble(items)),
            _ => None,
        }
    }
}

// Pointers to unsized types are fat.
fn is_unsized<T: ?Sized>() -> bool {
    size_of::<*const T>() != size_of::<*const ()>()
}

fn assemble<T: ?Sized + Send + Sync + 'static>(items: Vec<Instance>) -> Instance {
    let values: Vec<Arc<T>> = items.iter().filter_map(Instance::downcast::<T>).collect();
    Instance::new(Arc::new(values))
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// What produced a cached instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Producer {
    /// Constructor activation of this implementation type.
    Type(TypeKey),
    /// A prebuilt instance or factory, identified by its registration id.
    Registration(u64),
}

/// Identity of a cached instance: requested type plus producer.
///
/// Two registrations for the same requested type with different
/// implementations never share a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service: TypeKey,
    pub producer: Producer,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.producer {
            Producer::Type(implementation) if *implementation == self.service => {
                write!(f, "{}", self.service)
            }
            Producer::Type(implementation) => {
                write!(f, "{} (as {})", implementation, self.service)
            }
            Producer::Registration(id) => write!(f, "{} (registration #{id})", self.service),
        }
    }
}
