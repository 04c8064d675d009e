use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Place through which a dependency is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    /// Direct request to a scope
    Request,
    /// Argument of a factory function
    Factory,
    ConstructorParameter(&'static str),
    Field(&'static str),
    Property(&'static str),
    MethodParameter { method: &'static str, parameter: &'static str },
}

impl InjectionPoint {
    /// Name used to match named parameter overrides
    #[must_use]
    pub const fn name(&self) -> Option<&'static str> {
        match self {
            Self::Request | Self::Factory => None,
            Self::ConstructorParameter(name) | Self::Field(name) | Self::Property(name) => Some(name),
            Self::MethodParameter { parameter, .. } => Some(parameter),
        }
    }
}

impl Display for InjectionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Factory => write!(f, "factory argument"),
            Self::ConstructorParameter(name) => write!(f, "constructor parameter `{name}`"),
            Self::Field(name) => write!(f, "field `{name}`"),
            Self::Property(name) => write!(f, "property `{name}`"),
            Self::MethodParameter { method, parameter } => write!(f, "method `{method}` parameter `{parameter}`"),
        }
    }
}

/// One edge of a dependency chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub from: TypeInfo,
    pub via: InjectionPoint,
    pub to: TypeInfo,
}

/// Edges of a circular dependency in the order they were traversed.
/// The first hop starts and the last hop ends at the repeated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPath(pub Vec<Hop>);

impl DependencyPath {
    #[inline]
    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.0
    }
}

impl Display for DependencyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(first) = self.0.first() else {
            return Ok(());
        };
        write!(f, "{}", first.from.short_name())?;
        for Hop { via, to, .. } in &self.0 {
            write!(f, " -[{via}]-> {}", to.short_name())?;
        }
        Ok(())
    }
}
