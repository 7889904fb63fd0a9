use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::decimal::Markup;
use crate::errors::{Result, ShopError};

/// shop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub pricing: PricingConfig,
    pub locale: LocaleConfig,
    pub catalog: CatalogConfig,
    pub accounts: AccountConfig,
}

/// one selectable tenor and its price multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TenorOption {
    pub days: u32,
    pub markup: Markup,
}

/// installment pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub tenors: Vec<TenorOption>,
    /// number of days billed together for weekly collection
    pub weekly_billing_days: u32,
}

/// locale boundary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// offset of the shop's calendar day from utc, in hours
    pub utc_offset_hours: i32,
}

/// catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub products_per_page: usize,
}

/// account policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub min_password_len: usize,
}

impl ShopConfig {
    /// standard configuration: five tenors, six-day week, western indonesia time
    pub fn standard() -> Self {
        Self {
            pricing: PricingConfig {
                tenors: vec![
                    TenorOption { days: 60, markup: Markup::from_decimal(dec!(1.20)) },
                    TenorOption { days: 90, markup: Markup::from_decimal(dec!(1.25)) },
                    TenorOption { days: 120, markup: Markup::from_decimal(dec!(1.30)) },
                    TenorOption { days: 150, markup: Markup::from_decimal(dec!(1.35)) },
                    TenorOption { days: 180, markup: Markup::from_decimal(dec!(1.40)) },
                ],
                weekly_billing_days: 6,
            },
            locale: LocaleConfig { utc_offset_hours: 7 },
            catalog: CatalogConfig { products_per_page: 12 },
            accounts: AccountConfig { min_password_len: 6 },
        }
    }

    /// load and validate from json
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ShopConfig =
            serde_json::from_str(json).map_err(|e| ShopError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// look up the multiplier for a tenor
    pub fn tenor(&self, days: u32) -> Result<&TenorOption> {
        self.pricing
            .tenors
            .iter()
            .find(|t| t.days == days)
            .ok_or(ShopError::UnrecognizedTenor { days })
    }

    pub fn validate(&self) -> Result<()> {
        if self.pricing.tenors.is_empty() {
            return Err(invalid("at least one tenor is required"));
        }

        let mut seen = HashSet::new();
        for option in &self.pricing.tenors {
            if option.days == 0 {
                return Err(invalid("tenor days must be positive"));
            }
            if option.markup.as_decimal() <= rust_decimal::Decimal::ZERO {
                return Err(invalid(&format!("markup for {} days must be positive", option.days)));
            }
            if !seen.insert(option.days) {
                return Err(invalid(&format!("duplicate tenor: {} days", option.days)));
            }
        }

        if self.pricing.weekly_billing_days == 0 {
            return Err(invalid("weekly billing days must be positive"));
        }
        if !(-12..=14).contains(&self.locale.utc_offset_hours) {
            return Err(invalid("utc offset out of range"));
        }
        if self.catalog.products_per_page == 0 {
            return Err(invalid("products per page must be positive"));
        }

        Ok(())
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn invalid(message: &str) -> ShopError {
    ShopError::InvalidConfiguration {
        message: message.to_string(),
    }
}
