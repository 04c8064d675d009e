use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// Shared implementation object, as stored in scope caches
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Freshly constructed implementation object, before it is shared
pub type BoxedInstance = Box<dyn Any + Send + Sync>;

/// Contract view of an instance: a boxed `Arc<C>` for the requested contract `C`
pub(crate) type Erased = Box<dyn Any + Send + Sync>;

/// Value used to narrow a lookup to one of several bindings of the same contract.
///
/// Any `PartialEq + Debug` value works as a key; enums are the usual choice.
/// Keys of different types never compare equal.
#[derive(Clone)]
pub struct LookupKey {
    value: Arc<dyn Any + Send + Sync>,
    eq: fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> bool,
    repr: String,
}

fn eq_as<K: PartialEq + 'static>(left: &(dyn Any + Send + Sync), right: &(dyn Any + Send + Sync)) -> bool {
    match (left.downcast_ref::<K>(), right.downcast_ref::<K>()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

impl LookupKey {
    #[must_use]
    pub fn new<K>(key: K) -> Self
    where
        K: PartialEq + Debug + Send + Sync + 'static,
    {
        Self {
            repr: format!("{key:?}"),
            value: Arc::new(key),
            eq: eq_as::<K>,
        }
    }
}

impl PartialEq for LookupKey {
    fn eq(&self, other: &Self) -> bool {
        (self.eq)(&*self.value, &*other.value)
    }
}

impl Debug for LookupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LookupKey").field(&format_args!("{}", self.repr)).finish()
    }
}

impl Display for LookupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

#[cfg(test)]
mod tests {
    use super::{LookupKey, TypeInfo};

    #[derive(Debug, PartialEq)]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, PartialEq)]
    enum Shade {
        Red,
    }

    #[test]
    fn test_type_info_short_name() {
        assert_eq!(TypeInfo::of::<Color>().short_name(), "Color");
        assert_eq!(TypeInfo::of::<u8>().short_name(), "u8");
        assert_eq!(TypeInfo::of::<Color>(), TypeInfo::of::<Color>());
        assert_ne!(TypeInfo::of::<Color>(), TypeInfo::of::<Shade>());
    }

    #[test]
    fn test_lookup_key_eq() {
        assert_eq!(LookupKey::new(Color::Red), LookupKey::new(Color::Red));
        assert_ne!(LookupKey::new(Color::Red), LookupKey::new(Color::Blue));
        assert_ne!(LookupKey::new(Color::Red), LookupKey::new(Shade::Red));
        assert_eq!(LookupKey::new(Color::Blue).to_string(), "Blue");
    }
}
