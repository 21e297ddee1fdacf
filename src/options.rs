//! Per-map configuration.

use serde::{Deserialize, Serialize};

/// Options controlling key resolution, mutable after construction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValMapOptions {
    /// Skip a key's custom textual representation and hash it structurally.
    pub disable_to_string_hash: bool,

    /// Reject the absent key in `set`. With the guard off, every lookup of
    /// an unregistered key resolves to the absent key's entry.
    pub prevent_undefined_key: bool,
}

impl Default for ValMapOptions {
    fn default() -> Self {
        Self {
            disable_to_string_hash: false,
            prevent_undefined_key: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn defaults() {
        let o = ValMapOptions::default();
        assert!(!o.disable_to_string_hash);
        assert!(o.prevent_undefined_key);
    }

    /// Missing fields fall back to the defaults.
    #[test]
    fn deserialize_partial() {
        let o: ValMapOptions = serde_json::from_str(r#"{"disable_to_string_hash":true}"#).unwrap();
        assert!(o.disable_to_string_hash);
        assert!(o.prevent_undefined_key);

        let o: ValMapOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(o, ValMapOptions::default());
    }
}
