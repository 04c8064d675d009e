use super::{build::AnalyzeErrorKind, instantiate::InstantiateErrorKind, path::DependencyPath, InjectionPoint};
use crate::any::{LookupKey, TypeInfo};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No binding found for {ty}")]
    NotFound { ty: TypeInfo },
    #[error("No binding found for {ty} with key {key}")]
    NotFoundWithKey { ty: TypeInfo, key: LookupKey },
    #[error("Circular dependency detected: {path}")]
    Circular { path: DependencyPath },
    #[error("Cannot construct open generic {ty}")]
    OpenGeneric { ty: TypeInfo },
    #[error("Open generic binding of {contract} resolves to {implementation}, but no closed instantiation of it is declared")]
    MissingGenericInstantiation { contract: TypeInfo, implementation: TypeInfo },
    #[error("Neither a precompiled injector nor a type declaration is available for {ty}")]
    NoInjector { ty: TypeInfo },
    #[error("Failed to construct {ty}: {inner}")]
    Construction {
        ty: TypeInfo,
        #[source]
        inner: InstantiateErrorKind,
    },
    #[error("Incorrect instance type, expected: {expected}")]
    IncorrectType { expected: TypeInfo },
    #[error("Resolution chain is deeper than {0}")]
    DepthExceeded(usize),
    #[error("Scope is disposed")]
    Disposed,
    #[error(transparent)]
    Analyze(#[from] AnalyzeErrorKind),
    #[error("{owner} ({point}) -> {inner}")]
    Dependency {
        owner: TypeInfo,
        point: InjectionPoint,
        #[source]
        inner: Box<ResolveErrorKind>,
    },
}

impl ResolveErrorKind {
    /// Error without the dependency annotations added while it propagated
    #[must_use]
    pub fn innermost(&self) -> &Self {
        let mut err = self;
        while let Self::Dependency { inner, .. } = err {
            err = &**inner;
        }
        err
    }

    /// Returns `true` if the error says that `ty` itself has no binding,
    /// not one of its transitive dependencies
    #[must_use]
    pub fn is_not_found_of(&self, ty: TypeInfo) -> bool {
        match self {
            Self::NotFound { ty: missing } | Self::NotFoundWithKey { ty: missing, .. } => *missing == ty,
            Self::Dependency { inner, .. } => {
                matches!(**inner, Self::NotFound { ty: missing } | Self::NotFoundWithKey { ty: missing, .. } if missing == ty)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResolveErrorKind;
    use crate::{any::TypeInfo, errors::InjectionPoint};

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_annotated_display() {
        let err = ResolveErrorKind::Dependency {
            owner: TypeInfo::of::<A>(),
            point: InjectionPoint::ConstructorParameter("b"),
            inner: Box::new(ResolveErrorKind::Dependency {
                owner: TypeInfo::of::<B>(),
                point: InjectionPoint::Field("c"),
                inner: Box::new(ResolveErrorKind::NotFound { ty: TypeInfo::of::<C>() }),
            }),
        };

        let message = err.to_string();
        assert!(message.contains("constructor parameter `b`"));
        assert!(message.contains("field `c`"));
        assert!(message.ends_with(&format!("No binding found for {}", TypeInfo::of::<C>())));
        assert!(matches!(err.innermost(), ResolveErrorKind::NotFound { ty } if *ty == TypeInfo::of::<C>()));
        assert!(!err.is_not_found_of(TypeInfo::of::<C>()));
        assert!(!err.is_not_found_of(TypeInfo::of::<B>()));
    }

    #[test]
    fn test_is_not_found_of() {
        let err = ResolveErrorKind::Dependency {
            owner: TypeInfo::of::<A>(),
            point: InjectionPoint::Factory,
            inner: Box::new(ResolveErrorKind::NotFound { ty: TypeInfo::of::<B>() }),
        };

        assert!(err.is_not_found_of(TypeInfo::of::<B>()));
        assert!(ResolveErrorKind::NotFound { ty: TypeInfo::of::<A>() }.is_not_found_of(TypeInfo::of::<A>()));
    }
}
