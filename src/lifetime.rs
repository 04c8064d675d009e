use core::fmt::{self, Display, Formatter};

/// Reuse policy of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// A new instance on every resolution. Never cached, never finalized by a scope.
    Transient,
    /// One instance for the scope tree rooted at the scope whose registry holds the binding
    Singleton,
    /// One instance per scope
    Scoped,
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
        })
    }
}
