#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! With the `policy-config` feature, a [`SyncConfig`] can be loaded from TOML
//! or JSON; missing keys fall back to [`SyncConfig::default`].
//!
//! ```toml
//! rollback_on_error = true
//! multi_select_veto = true
//! strict_removal = false
//! ```

/// Behavioural switches of the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SyncConfig {
    /// Restore every peer to its pre-round state when applying a change to
    /// any of them fails. When off, peers updated before the failure keep the
    /// change and the rest stay behind.
    pub rollback_on_error: bool,
    /// Strip additions the sender's own filter rejects when they come from an
    /// interactive multi-select, and deselect them from the sender on the next
    /// idle turn.
    pub multi_select_veto: bool,
    /// Treat removing an item a peer should hold, but does not, as a contract
    /// violation. When off, the miss is logged and skipped.
    pub strict_removal: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rollback_on_error: true,
            multi_select_veto: true,
            strict_removal: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rollback_on_error(mut self, enabled: bool) -> Self {
        self.rollback_on_error = enabled;
        self
    }

    #[must_use]
    pub fn multi_select_veto(mut self, enabled: bool) -> Self {
        self.multi_select_veto = enabled;
        self
    }

    #[must_use]
    pub fn strict_removal(mut self, enabled: bool) -> Self {
        self.strict_removal = enabled;
        self
    }
}

/// Errors from loading a [`SyncConfig`].
#[cfg(feature = "policy-config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML sync config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON sync config: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "policy-config")]
impl SyncConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(src)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_and_transactional() {
        let config = SyncConfig::default();
        assert!(config.rollback_on_error);
        assert!(config.multi_select_veto);
        assert!(config.strict_removal);
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::new()
            .rollback_on_error(false)
            .multi_select_veto(false)
            .strict_removal(false);
        assert_eq!(
            config,
            SyncConfig {
                rollback_on_error: false,
                multi_select_veto: false,
                strict_removal: false,
            }
        );
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_partial_falls_back_to_defaults() {
        let config = SyncConfig::from_toml_str("strict_removal = false").unwrap();
        assert!(!config.strict_removal);
        assert!(config.rollback_on_error);
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn json_round_trip_and_errors() {
        let config = SyncConfig::from_json_str(r#"{"multi_select_veto": false}"#).unwrap();
        assert!(!config.multi_select_veto);
        assert!(matches!(
            SyncConfig::from_toml_str("rollback_on_error = 3"),
            Err(ConfigError::Toml(_))
        ));
    }
}
