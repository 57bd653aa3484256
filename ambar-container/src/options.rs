//! Container configuration.
//!
//! [`ContainerOptions`] deserializes from any serde format; missing fields
//! take their defaults.

use serde::{Deserialize, Serialize};

/// Behavior switches for a root container and all of its scopes.
///
/// # Examples
/// ```
/// use ambar_container::options::ContainerOptions;
///
/// let options = ContainerOptions::default().validate_scopes(true);
/// assert!(options.validate_scopes);
/// assert!(options.track_transient_disposables);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Fail when a singleton under construction resolves a scoped service,
    /// which it would otherwise keep alive past its scope.
    pub validate_scopes: bool,

    /// Record disposable transients in the resolving scope so they are
    /// disposed with it. When off, the caller owns them entirely.
    pub track_transient_disposables: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            validate_scopes: false,
            track_transient_disposables: true,
        }
    }
}

impl ContainerOptions {
    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn track_transient_disposables(mut self, enabled: bool) -> Self {
        self.track_transient_disposables = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error as ValueError, MapDeserializer};

    fn from_pairs(pairs: Vec<(&'static str, bool)>) -> ContainerOptions {
        let deserializer = MapDeserializer::<_, ValueError>::new(pairs.into_iter());
        ContainerOptions::deserialize(deserializer).unwrap()
    }

    #[test]
    fn defaults() {
        let options = ContainerOptions::default();
        assert!(!options.validate_scopes);
        assert!(options.track_transient_disposables);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let options = from_pairs(vec![("validate_scopes", true)]);
        assert!(options.validate_scopes);
        assert!(options.track_transient_disposables);
    }

    #[test]
    fn all_fields() {
        let options = from_pairs(vec![
            ("validate_scopes", false),
            ("track_transient_disposables", false),
        ]);
        assert_eq!(options, ContainerOptions::default().track_transient_disposables(false));
    }
}
