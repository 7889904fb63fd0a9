use serde::{Deserialize, Serialize};

use crate::config::{ShopConfig, TenorOption};
use crate::decimal::{Markup, Money};
use crate::errors::{Result, ShopError};
use crate::types::PaymentFrequency;

/// priced installment terms for one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentQuote {
    pub principal: Money,
    pub tenor: u32,
    pub frequency: PaymentFrequency,
    pub markup: Markup,
    /// rounded-up daily share of the marked-up price
    pub per_diem: Money,
    /// amount collected per visit
    pub installment: Money,
}

/// installment pricing over a fixed tenor table
#[derive(Debug, Clone)]
pub struct InstallmentCalculator {
    tenors: Vec<TenorOption>,
    weekly_billing_days: u32,
}

impl InstallmentCalculator {
    pub fn from_config(config: &ShopConfig) -> Self {
        Self {
            tenors: config.pricing.tenors.clone(),
            weekly_billing_days: config.pricing.weekly_billing_days,
        }
    }

    /// the five standard tenors with a six-day week
    pub fn standard() -> Self {
        Self::from_config(&ShopConfig::standard())
    }

    /// tenors offered, in table order
    pub fn tenor_options(&self) -> &[TenorOption] {
        &self.tenors
    }

    pub fn markup(&self, tenor_days: u32) -> Result<Markup> {
        self.tenors
            .iter()
            .find(|t| t.days == tenor_days)
            .map(|t| t.markup)
            .ok_or(ShopError::UnrecognizedTenor { days: tenor_days })
    }

    /// price the installment for a principal, tenor and frequency
    pub fn quote(
        &self,
        principal: Money,
        tenor_days: u32,
        frequency: PaymentFrequency,
    ) -> Result<InstallmentQuote> {
        if !principal.is_positive() {
            return Err(ShopError::InvalidAmount { amount: principal });
        }
        let markup = self.markup(tenor_days)?;

        let too_large = || ShopError::InvalidAmount { amount: principal };
        let per_diem = principal
            .checked_mul_markup(markup)
            .and_then(|price| price.checked_div_u32(tenor_days))
            .ok_or_else(too_large)?
            .ceil();
        let installment = match frequency {
            PaymentFrequency::Daily => per_diem,
            PaymentFrequency::Weekly => per_diem
                .checked_mul_u32(self.weekly_billing_days)
                .ok_or_else(too_large)?,
        };
        // ledger totals multiply the installment by at most the tenor
        installment.checked_mul_u32(tenor_days).ok_or_else(too_large)?;

        Ok(InstallmentQuote {
            principal,
            tenor: tenor_days,
            frequency,
            markup,
            per_diem,
            installment,
        })
    }
}

/// installment amount under the standard tenor table
pub fn installment(principal: Money, tenor_days: u32, frequency: PaymentFrequency) -> Result<Money> {
    InstallmentCalculator::standard()
        .quote(principal, tenor_days, frequency)
        .map(|q| q.installment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_installment() {
        let principal = Money::from_major(1_000_000);

        let daily = installment(principal, 60, PaymentFrequency::Daily).unwrap();
        assert_eq!(daily, Money::from_major(20_000));

        let weekly = installment(principal, 60, PaymentFrequency::Weekly).unwrap();
        assert_eq!(weekly, Money::from_major(120_000));
    }

    #[test]
    fn test_per_diem_rounds_up() {
        // 750,000 * 1.25 / 90 = 10,416.67
        let quote = InstallmentCalculator::standard()
            .quote(Money::from_major(750_000), 90, PaymentFrequency::Daily)
            .unwrap();
        assert_eq!(quote.per_diem, Money::from_major(10_417));
        assert_eq!(quote.markup.as_decimal(), dec!(1.25));

        // rounding happens before the weekly multiplication
        let weekly = InstallmentCalculator::standard()
            .quote(Money::from_major(750_000), 90, PaymentFrequency::Weekly)
            .unwrap();
        assert_eq!(weekly.installment, Money::from_major(62_502));
    }

    #[test]
    fn test_every_tenor_yields_positive_whole_amounts() {
        let calculator = InstallmentCalculator::standard();
        let principals = [1, 7, 999, 150_000, 2_345_678, 99_999_999];

        for option in calculator.tenor_options() {
            for principal in principals {
                for frequency in [PaymentFrequency::Daily, PaymentFrequency::Weekly] {
                    let quote = calculator
                        .quote(Money::from_major(principal), option.days, frequency)
                        .unwrap();
                    assert!(quote.installment.is_positive());
                    assert!(quote.installment.is_whole());
                }
            }
        }
    }

    #[test]
    fn test_unrecognized_tenor_rejected() {
        assert_matches!(
            installment(Money::from_major(1_000_000), 30, PaymentFrequency::Daily),
            Err(ShopError::UnrecognizedTenor { days: 30 })
        );
    }

    #[test]
    fn test_non_positive_principal_rejected() {
        assert_matches!(
            installment(Money::ZERO, 60, PaymentFrequency::Daily),
            Err(ShopError::InvalidAmount { .. })
        );
        assert_matches!(
            installment(Money::from_major(-5), 60, PaymentFrequency::Daily),
            Err(ShopError::InvalidAmount { .. })
        );
    }

    #[test]
    fn test_unrepresentable_price_rejected() {
        let principal = Money::from_str_exact("79228162514264337593543950335").unwrap();
        let calculator = InstallmentCalculator::standard();
        for option in calculator.tenor_options() {
            for frequency in [PaymentFrequency::Daily, PaymentFrequency::Weekly] {
                assert_matches!(
                    calculator.quote(principal, option.days, frequency),
                    Err(ShopError::InvalidAmount { amount }) if amount == principal
                );
            }
        }

        // the price fits but the full-term total would not
        let principal = Money::from_str_exact("50000000000000000000000000000").unwrap();
        assert_matches!(
            calculator.quote(principal, 180, PaymentFrequency::Weekly),
            Err(ShopError::InvalidAmount { .. })
        );
    }

    #[test]
    fn test_configured_week_length() {
        let mut config = ShopConfig::standard();
        config.pricing.weekly_billing_days = 7;
        let quote = InstallmentCalculator::from_config(&config)
            .quote(Money::from_major(1_000_000), 60, PaymentFrequency::Weekly)
            .unwrap();
        assert_eq!(quote.installment, Money::from_major(140_000));
    }
}
