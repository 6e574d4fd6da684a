//! Evaluation settings for one run of the join driver.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for the generic join driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Stop after this many results
    pub limit: Option<usize>,
    /// Reject, up front, a variable order in which some variable has no
    /// constraint able to bind it
    pub validate_plan: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            limit: None,
            validate_plan: true,
        }
    }
}

impl JoinConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_validation(mut self, validate_plan: bool) -> Self {
        self.validate_plan = validate_plan;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() -> anyhow::Result<()> {
        let config = JoinConfig::from_json(r#"{ "limit": 10 }"#)?;
        assert_eq!(config.limit, Some(10));
        assert!(config.validate_plan);
        Ok(())
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            JoinConfig::from_json("{ limit: "),
            Err(crate::error::JoinError::Config(_))
        ));
    }
}
