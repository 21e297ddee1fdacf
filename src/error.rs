//! Error types for `ValMap`.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An absent key was passed to `set` while `prevent_undefined_key` is on.
    #[error(
        "Using an absent key will result in false positive lookups for missing keys. \
         If you really need this, set `prevent_undefined_key` to false on this ValMap."
    )]
    InvalidKey,

    #[error("Invalid initializer, expected a sequence of [key, value] pairs: {0}")]
    InvalidArgument(String),
}
