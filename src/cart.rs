use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::installment::{InstallmentCalculator, InstallmentQuote};
use crate::order::Order;
use crate::records::Product;
use crate::types::{AddressChoice, ConsumerRef, PaymentFrequency, ProductId};

/// one cart entry; lines are never edited, only added or removed
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub line_id: Uuid,
    pub product_id: ProductId,
    pub product_name: String,
    pub quote: InstallmentQuote,
}

impl CartLine {
    pub fn tenor(&self) -> u32 {
        self.quote.tenor
    }

    pub fn frequency(&self) -> PaymentFrequency {
        self.quote.frequency
    }

    pub fn installment(&self) -> Money {
        self.quote.installment
    }
}

/// client-side draft of orders to place
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// price the product at the chosen terms and append a line
    pub fn add(
        &mut self,
        calculator: &InstallmentCalculator,
        product: &Product,
        tenor_days: u32,
        frequency: PaymentFrequency,
    ) -> Result<Uuid> {
        let quote = calculator.quote(product.principal, tenor_days, frequency)?;
        let line_id = Uuid::new_v4();
        self.lines.push(CartLine {
            line_id,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quote,
        });
        Ok(line_id)
    }

    pub fn remove(&mut self, line_id: Uuid) -> Result<CartLine> {
        let index = self
            .lines
            .iter()
            .position(|line| line.line_id == line_id)
            .ok_or(ShopError::CartLineNotFound { line_id })?;
        Ok(self.lines.remove(index))
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// sum of the first installment of every line
    pub fn first_installments(&self) -> Money {
        self.lines.iter().map(CartLine::installment).sum()
    }

    /// one independent order per line, shipping to the snapshotted address
    pub fn draft_orders(
        &self,
        consumer: &ConsumerRef,
        address: &str,
        choice: AddressChoice,
        placed_at: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        if self.lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        let address = address.trim();
        if address.is_empty() {
            let field = match choice {
                AddressChoice::Home => "home_address",
                AddressChoice::Business => "business_address",
            };
            return Err(ShopError::missing_field(field));
        }
        Ok(self
            .lines
            .iter()
            .map(|line| {
                Order::place(
                    &line.quote,
                    line.product_name.clone(),
                    consumer.clone(),
                    address,
                    placed_at,
                )
            })
            .collect())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
