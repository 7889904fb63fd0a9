use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::installment::InstallmentQuote;
use crate::types::{
    CollectorRef, ConsumerRef, OrderId, OrderStatus, PaymentFrequency, Stamp, UserId,
};

/// one collected installment; its position in the ledger is its installment number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub paid_at: Stamp,
    /// display name of whoever collected it
    pub collected_by: String,
    #[serde(default)]
    pub collector_uid: Option<UserId>,
}

/// an installment order (bill)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub placed_at: Stamp,
    /// snapshot of the product name at checkout
    pub product_name: String,
    pub tenor: u32,
    pub frequency: PaymentFrequency,
    pub installment: Money,
    pub status: OrderStatus,
    #[serde(default)]
    pub assigned_collector: Option<CollectorRef>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(flatten)]
    pub consumer: ConsumerRef,
    pub shipping_address: String,
}

impl Order {
    /// new order in `Processing` with an empty ledger
    pub fn place(
        quote: &InstallmentQuote,
        product_name: impl Into<String>,
        consumer: ConsumerRef,
        shipping_address: impl Into<String>,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            placed_at: Stamp::At(placed_at),
            product_name: product_name.into(),
            tenor: quote.tenor,
            frequency: quote.frequency,
            installment: quote.installment,
            status: OrderStatus::Processing,
            assigned_collector: None,
            payments: Vec::new(),
            consumer,
            shipping_address: shipping_address.into(),
        }
    }

    /// manual status step; only dispatch and delivery are manual
    pub fn advance(&mut self, target: OrderStatus) -> Result<OrderStatus> {
        let from = self.status;
        let allowed = target != OrderStatus::PaidOff && from.next() == Some(target);
        if !allowed {
            return Err(ShopError::InvalidTransition { from, to: target });
        }
        self.status = target;
        Ok(from)
    }

    /// assign (or re-assign) the collector; returns whether anything changed
    pub fn assign_collector(&mut self, collector: CollectorRef) -> Result<bool> {
        if self.status != OrderStatus::Delivered {
            return Err(ShopError::AssignmentNotAllowed { status: self.status });
        }
        if self.assigned_collector.as_ref() == Some(&collector) {
            return Ok(false);
        }
        self.assigned_collector = Some(collector);
        Ok(true)
    }

    /// check that `collector` may record the next installment
    pub fn ensure_payable_by(&self, collector: &UserId) -> Result<()> {
        if self.status == OrderStatus::PaidOff || self.paid_count() >= self.tenor as usize {
            return Err(ShopError::AlreadySettled { order_id: self.id.clone() });
        }
        if self.status != OrderStatus::Delivered {
            return Err(ShopError::NotDelivered {
                order_id: self.id.clone(),
                status: self.status,
            });
        }
        match &self.assigned_collector {
            None => Err(ShopError::NoCollectorAssigned { order_id: self.id.clone() }),
            Some(assigned) if &assigned.uid != collector => Err(ShopError::NotAssignedCollector {
                order_id: self.id.clone(),
                collector: collector.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// ledger and status after appending `payment`
    pub fn with_payment(&self, payment: Payment) -> (Vec<Payment>, OrderStatus) {
        let mut payments = self.payments.clone();
        payments.push(payment);
        let status = if payments.len() >= self.tenor as usize {
            OrderStatus::PaidOff
        } else {
            self.status
        };
        (payments, status)
    }

    pub fn paid_count(&self) -> usize {
        self.payments.len()
    }

    pub fn remaining(&self) -> usize {
        (self.tenor as usize).saturating_sub(self.payments.len())
    }

    pub fn is_settled(&self) -> bool {
        self.status == OrderStatus::PaidOff
    }

    pub fn last_payment(&self) -> Option<&Payment> {
        self.payments.last()
    }

    /// total collected so far
    pub fn collected(&self) -> Money {
        self.installment * self.paid_count() as u32
    }

    pub fn is_assigned_to(&self, collector: &UserId) -> bool {
        self.assigned_collector
            .as_ref()
            .map(|c| &c.uid == collector)
            .unwrap_or(false)
    }

    pub fn check_invariants(&self) -> Result<()> {
        let paid = self.payments.len();
        let tenor = self.tenor as usize;
        if paid > tenor {
            return Err(ShopError::CorruptRecord {
                message: format!("order {} has {} payments for tenor {}", self.id, paid, tenor),
            });
        }
        if (paid == tenor) != (self.status == OrderStatus::PaidOff) {
            return Err(ShopError::CorruptRecord {
                message: format!(
                    "order {} is {} with {} of {} payments",
                    self.id, self.status, paid, tenor
                ),
            });
        }
        Ok(())
    }
}
