use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Unbound generic shape, such as `IBox<_>`.
///
/// Rust has no runtime handle for an unbound generic type,
/// so a definition is named by a marker type together with the number of type parameters it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenericDef {
    pub info: TypeInfo,
    pub arity: usize,
}

impl GenericDef {
    #[inline]
    #[must_use]
    pub fn of<M: ?Sized + 'static>(arity: usize) -> Self {
        Self {
            info: TypeInfo::of::<M>(),
            arity,
        }
    }
}

impl Display for GenericDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.info.short_name())?;
        for i in 0..self.arity {
            if i > 0 {
                write!(f, ",")?;
            }
        }
        write!(f, ">")
    }
}

/// Definition with its type arguments bound
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenericShape {
    pub definition: GenericDef,
    pub arguments: Vec<TypeInfo>,
}

impl GenericShape {
    #[must_use]
    pub fn new(definition: GenericDef, arguments: Vec<TypeInfo>) -> Self {
        Self { definition, arguments }
    }

    /// Same arguments bound to another definition
    #[must_use]
    pub(crate) fn rebind(&self, definition: GenericDef) -> Self {
        Self {
            definition,
            arguments: self.arguments.clone(),
        }
    }
}

/// Closed generic type that can report the definition it was instantiated from.
///
/// Implemented for generic contracts (usually `dyn Trait<T>`) and implementations taking part in open generic bindings.
pub trait GenericType: 'static {
    fn definition() -> GenericDef;

    fn arguments() -> Vec<TypeInfo>;

    #[inline]
    #[must_use]
    fn shape() -> GenericShape {
        GenericShape::new(Self::definition(), Self::arguments())
    }
}

#[cfg(test)]
mod tests {
    use super::{GenericDef, GenericType};
    use crate::any::TypeInfo;

    enum PairDef {}

    struct Pair<A, B>(A, B);

    impl<A: 'static, B: 'static> GenericType for Pair<A, B> {
        fn definition() -> GenericDef {
            GenericDef::of::<PairDef>(2)
        }

        fn arguments() -> Vec<TypeInfo> {
            vec![TypeInfo::of::<A>(), TypeInfo::of::<B>()]
        }
    }

    #[test]
    fn test_shape() {
        let shape = Pair::<u8, String>::shape();

        assert_eq!(shape.definition, GenericDef::of::<PairDef>(2));
        assert_eq!(shape.arguments, vec![TypeInfo::of::<u8>(), TypeInfo::of::<String>()]);
        assert_ne!(shape, Pair::<String, u8>::shape());
        assert_eq!(shape.definition.to_string(), "PairDef<,>");
    }
}
