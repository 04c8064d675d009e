use crate::{any::TypeInfo, generic::GenericDef};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeErrorKind {
    #[error("More than one constructor of {ty} is marked for injection")]
    AmbiguousMarkedConstructor { ty: TypeInfo },
    #[error("{ty} has {count} constructors with {parameters} parameters, mark one of them for injection")]
    AmbiguousConstructor { ty: TypeInfo, count: usize, parameters: usize },
    #[error("{ty} has more than one inject method: `{first}` and `{second}`")]
    MultipleInjectMethods {
        ty: TypeInfo,
        first: &'static str,
        second: &'static str,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    #[error("Conflict: more than one singleton binding of {implementation} is registered for {contract}")]
    DuplicateSingleton { contract: TypeInfo, implementation: TypeInfo },
    #[error(transparent)]
    Analyze(#[from] AnalyzeErrorKind),
    #[error("Open generic {contract} takes {contract_arity} arguments, but {implementation} takes {implementation_arity}")]
    OpenGenericArity {
        contract: TypeInfo,
        contract_arity: usize,
        implementation: TypeInfo,
        implementation_arity: usize,
    },
    #[error("Contract {contract} is not closed over the same type arguments as {implementation}")]
    InconsistentGenericContract { contract: TypeInfo, implementation: TypeInfo },
    #[error("Open generic {contract} can't be used as a contract of {implementation}, use an open generic binding instead")]
    OpenGenericContract { contract: TypeInfo, implementation: TypeInfo },
}

impl BuildErrorKind {
    #[must_use]
    pub(crate) fn open_generic_arity(contract: GenericDef, implementation: GenericDef) -> Self {
        Self::OpenGenericArity {
            contract: contract.info,
            contract_arity: contract.arity,
            implementation: implementation.info,
            implementation_arity: implementation.arity,
        }
    }
}
