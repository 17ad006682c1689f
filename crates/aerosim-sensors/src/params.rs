//! Plugin parameter block.
//!
//! Scene files describe plugin parameters as untyped text; a plugin asks for
//! each one with the type it expects and a default where one makes sense.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use aerosim_types::SimError;

/// String key/value parameters handed to a plugin at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginParams {
    values: BTreeMap<String, String>,
}

impl PluginParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`][Self::insert].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Parse `key` as `T`.  `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] when the value does not parse.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, SimError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.values
            .get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| SimError::InvalidParameter {
                    key: key.to_string(),
                    details: format!("{raw:?}: {e}"),
                })
            })
            .transpose()
    }

    /// Parse `key` as `T`, falling back to `default` when absent.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, SimError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Parse `key` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingParameter`] when the key is absent.
    pub fn require<T>(&self, key: &str) -> Result<T, SimError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)?
            .ok_or_else(|| SimError::MissingParameter(key.to_string()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for PluginParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_trims_whitespace() {
        let params = PluginParams::new().with("horPosStdDev", " 2.5\n");
        assert_eq!(params.get::<f64>("horPosStdDev").unwrap(), Some(2.5));
    }

    #[test]
    fn absent_key_uses_default() {
        let params = PluginParams::new();
        assert_eq!(params.get_or("verVelStdDev", 0.1).unwrap(), 0.1);
        assert_eq!(params.get::<f64>("verVelStdDev").unwrap(), None);
    }

    #[test]
    fn require_reports_missing_key() {
        let params = PluginParams::new();
        let err = params.require::<String>("linkName").unwrap_err();
        assert_eq!(err, SimError::MissingParameter("linkName".to_string()));
    }

    #[test]
    fn unparsable_value_is_invalid() {
        let params = PluginParams::new().with("seed", "forty-two");
        let err = params.get::<u64>("seed").unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { ref key, .. } if key == "seed"));
    }

    #[test]
    fn collects_from_pairs() {
        let params: PluginParams = [("robotNamespace", "firefly"), ("linkName", "firefly/gps_link")]
            .into_iter()
            .collect();
        assert!(params.has("robotNamespace"));
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["linkName", "robotNamespace"]);
    }
}
