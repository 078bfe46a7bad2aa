use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed identifier of a matsim-style entity, e.g. `Id<Link>` or `Id<Person>`.
///
/// The id wraps a reference counted external string. Cloning an id only clones the pointer. Ids
/// are not interned in a global store, so that several simulations can live in one process. Equality,
/// hashing and ordering use the external string. This matters for the tie-breaks of the queue
/// model, which compare ids in descending order.
pub struct Id<T> {
    _type_marker: PhantomData<fn() -> T>,
    external: Arc<str>,
}

impl<T> Id<T> {
    pub fn create(external: &str) -> Self {
        Self {
            _type_marker: PhantomData,
            external: Arc::from(external),
        }
    }

    pub fn external(&self) -> &str {
        &self.external
    }

    /// Reinterprets the id as an id of another type. Used where matsim uses the same external id for
    /// different entities, e.g. a person and its car.
    pub fn cast<U>(&self) -> Id<U> {
        Id {
            _type_marker: PhantomData,
            external: self.external.clone(),
        }
    }
}

impl<T> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Id::create(value)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            _type_marker: PhantomData,
            external: self.external.clone(),
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.external == other.external
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.external.hash(state);
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.external.cmp(&other.external)
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.external)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.external)
    }
}
