mod registry;

pub mod entry_getters;

pub use registry::{install, AutoInjectors};
