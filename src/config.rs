/// Config for a scope tree
/// ## Fields
/// - `max_depth`:
///   Maximum length of one resolution chain.
///   Exceeding it fails the resolution with [`crate::ResolveErrorKind::DepthExceeded`].
///
/// - `validate_on_build`:
///   If `true`, the injection metadata of every introspected implementation is analyzed when the registry is built,
///   so ambiguous markings are reported by [`crate::RegistryBuilder::build`] instead of the first resolution.
///
/// Child scopes inherit the config of their parent.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub max_depth: usize,
    pub validate_on_build: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 1024,
            validate_on_build: true,
        }
    }
}
