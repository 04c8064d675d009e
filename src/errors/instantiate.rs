use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument {position} has incorrect type, expected: {expected}")]
    IncorrectArgument { position: usize, expected: TypeInfo },
    #[error("Argument {position} is missing or was already taken")]
    MissingArgument { position: usize },
    #[error("Incorrect instance type, expected: {expected}")]
    IncorrectInstance { expected: TypeInfo },
    #[error("No accessible constructor for {ty}")]
    NoConstructor { ty: TypeInfo },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
