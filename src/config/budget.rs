//! Budget cap configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-provider cap overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCaps {
    pub monthly_cap_usd: Option<f64>,
    pub daily_cap_usd: Option<f64>,
}

/// Budget enforcement configuration.
///
/// Every provider gets the default monthly cap unless overridden; the daily
/// cap derives from the monthly one unless set explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Monthly spending cap per provider, USD.
    pub monthly_cap_usd: f64,
    /// Optional daily cap applied to every provider without an override.
    pub daily_cap_usd: Option<f64>,
    /// Per-provider overrides, keyed by provider id.
    pub overrides: HashMap<String, ProviderCaps>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            monthly_cap_usd: 60.0,
            daily_cap_usd: None,
            overrides: HashMap::new(),
        }
    }
}

impl BudgetConfig {
    pub fn monthly_cap(&self, provider: &str) -> f64 {
        self.overrides
            .get(provider)
            .and_then(|c| c.monthly_cap_usd)
            .unwrap_or(self.monthly_cap_usd)
    }

    /// Daily cap: explicit override, else the global daily cap, else monthly/30.
    pub fn daily_cap(&self, provider: &str) -> f64 {
        self.overrides
            .get(provider)
            .and_then(|c| c.daily_cap_usd)
            .or(self.daily_cap_usd)
            .unwrap_or_else(|| self.monthly_cap(provider) / 30.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.monthly_cap_usd < 0.0 {
            return Err("monthly_cap_usd must be >= 0.0".to_string());
        }
        if matches!(self.daily_cap_usd, Some(d) if d < 0.0) {
            return Err("daily_cap_usd must be >= 0.0".to_string());
        }
        for (provider, caps) in &self.overrides {
            if matches!(caps.monthly_cap_usd, Some(m) if m < 0.0)
                || matches!(caps.daily_cap_usd, Some(d) if d < 0.0)
            {
                return Err(format!("caps for '{}' must be >= 0.0", provider));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_config_defaults() {
        let config = BudgetConfig::default();
        assert_eq!(config.monthly_cap_usd, 60.0);
        assert!(config.daily_cap_usd.is_none());
    }

    #[test]
    fn daily_cap_derives_from_monthly() {
        let config = BudgetConfig::default();
        assert!((config.daily_cap("openai") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let mut config = BudgetConfig::default();
        config.overrides.insert(
            "openai".to_string(),
            ProviderCaps {
                monthly_cap_usd: Some(90.0),
                daily_cap_usd: Some(5.0),
            },
        );

        assert_eq!(config.monthly_cap("openai"), 90.0);
        assert_eq!(config.daily_cap("openai"), 5.0);
        assert_eq!(config.monthly_cap("local"), 60.0);
    }

    #[test]
    fn validation_rejects_negative_caps() {
        let config = BudgetConfig {
            monthly_cap_usd: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = BudgetConfig::default();
        config.overrides.insert(
            "openai".to_string(),
            ProviderCaps {
                monthly_cap_usd: None,
                daily_cap_usd: Some(-0.5),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budget_config_serialization() {
        let config = BudgetConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let deserialized: BudgetConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.monthly_cap_usd, deserialized.monthly_cap_usd);
    }
}
