mod build;
mod instantiate;
mod path;
mod resolve;

pub use build::{AnalyzeErrorKind, BuildErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use path::{DependencyPath, Hop, InjectionPoint};
pub use resolve::ResolveErrorKind;
