//! Payment ledger.
//!
//! Recording an installment appends to the order's payment sequence and, on the
//! final installment, closes the order, all in one conditional write. The write
//! is guarded on the ledger length the collector observed and on the order
//! still being `delivered`, so two collectors racing on the same order (or one
//! collector tapping twice) can never append the same installment twice or
//! push an order past its tenor.

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde_json::Value;
use tracing::{info, warn};

use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::locale::{stable_sort_by, Locale};
use crate::order::{Order, Payment};
use crate::store::{self, Document, DocumentStore, Precondition, Record, StoreError, Stored};
use crate::types::{CollectorRef, DocKey, OrderId, OrderStatus, Stamp, UserId};

/// a validated payment waiting to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCommit {
    key: DocKey,
    order_id: OrderId,
    observed_len: usize,
    remaining: usize,
    payments: Vec<Payment>,
    status: OrderStatus,
    installment: Money,
    collector: UserId,
    paid_at: DateTime<Utc>,
}

impl PaymentCommit {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// 1-based number of the installment this commit records
    pub fn installment_number(&self) -> usize {
        self.payments.len()
    }
}

/// outcome of a recorded payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub collector: UserId,
    pub installment_number: usize,
    pub amount: Money,
    pub remaining: usize,
    pub status: OrderStatus,
    pub paid_at: DateTime<Utc>,
}

impl PaymentReceipt {
    pub fn settled(&self) -> bool {
        self.status == OrderStatus::PaidOff
    }
}

pub struct PaymentLedger;

impl PaymentLedger {
    /// validate against the observed order and build the write
    pub fn prepare(
        stored: &Stored<Order>,
        collector: &CollectorRef,
        now: DateTime<Utc>,
    ) -> Result<PaymentCommit> {
        let order = &stored.record;
        order.ensure_payable_by(&collector.uid)?;

        let (payments, status) = order.with_payment(Payment {
            paid_at: Stamp::At(now),
            collected_by: collector.name.clone(),
            collector_uid: Some(collector.uid.clone()),
        });
        Ok(PaymentCommit {
            key: stored.key.clone(),
            order_id: order.id.clone(),
            observed_len: order.paid_count(),
            remaining: remaining_after(order.tenor, payments.len()),
            payments,
            status,
            installment: order.installment,
            collector: collector.uid.clone(),
            paid_at: now,
        })
    }

    /// write the payment if nobody else has touched the ledger since `prepare`
    pub fn commit(store: &dyn DocumentStore, commit: PaymentCommit) -> Result<PaymentReceipt> {
        let mut fields = Document::new();
        fields.insert(
            "payments".to_string(),
            serde_json::to_value(&commit.payments).map_err(StoreError::from)?,
        );
        fields.insert(
            "status".to_string(),
            Value::from(commit.status.as_tag()),
        );
        let guard = [
            Precondition::array_len("payments", commit.observed_len),
            Precondition::field_equals("status", OrderStatus::Delivered.as_tag()),
        ];

        match store.update_if(Order::COLLECTION, &commit.key, fields, &guard) {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                return Err(Self::classify_conflict(store, &commit));
            }
            Err(err) => return Err(err.into()),
        }

        let receipt = PaymentReceipt {
            installment_number: commit.installment_number(),
            order_id: commit.order_id,
            collector: commit.collector,
            amount: commit.installment,
            remaining: commit.remaining,
            status: commit.status,
            paid_at: commit.paid_at,
        };
        info!(
            order_id = %receipt.order_id,
            collector = %receipt.collector,
            installment = receipt.installment_number,
            remaining = receipt.remaining,
            "payment recorded"
        );
        if receipt.settled() {
            info!(order_id = %receipt.order_id, "order paid off");
        }
        Ok(receipt)
    }

    fn classify_conflict(store: &dyn DocumentStore, commit: &PaymentCommit) -> ShopError {
        let current = match store::load::<Order>(store, &commit.key) {
            Ok(current) => current,
            Err(err) => return err.into(),
        };
        match current {
            None => ShopError::OrderNotFound {
                order_id: commit.order_id.clone(),
            },
            Some(order) if order.is_settled() => {
                warn!(order_id = %commit.order_id, "payment rejected, order already settled");
                ShopError::AlreadySettled {
                    order_id: commit.order_id.clone(),
                }
            }
            Some(_) => {
                warn!(order_id = %commit.order_id, "payment rejected, ledger changed since read");
                ShopError::ConcurrentUpdate {
                    order_id: commit.order_id.clone(),
                }
            }
        }
    }
}

/// load, validate and commit one installment payment
pub fn record_payment(
    store: &dyn DocumentStore,
    order_id: &OrderId,
    collector: &CollectorRef,
    time: &SafeTimeProvider,
) -> Result<PaymentReceipt> {
    let stored = store::find::<Order>(store, "id", order_id.as_str())?.ok_or_else(|| {
        ShopError::OrderNotFound {
            order_id: order_id.clone(),
        }
    })?;
    let commit = PaymentLedger::prepare(&stored, collector, time.now())?;
    PaymentLedger::commit(store, commit)
}

/// one payment in a collector's history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub order_id: OrderId,
    pub product_name: String,
    pub consumer_name: String,
    pub installment_number: usize,
    pub amount: Money,
    pub paid_at: Stamp,
}

/// who a history scan attributes payments to
#[derive(Debug, Clone, Copy)]
pub struct Attribution<'a> {
    pub uid: &'a UserId,
    pub name: &'a str,
    pub email: &'a str,
}

impl Attribution<'_> {
    fn owns(&self, payment: &Payment) -> bool {
        match &payment.collector_uid {
            Some(uid) => uid == self.uid,
            // legacy payments only carry the collector's display name
            None => payment.collected_by == self.name || payment.collected_by == self.email,
        }
    }
}

/// every payment attributed to the collector across all orders, newest first
pub fn collection_history<'o>(
    orders: impl IntoIterator<Item = &'o Order>,
    collector: Attribution<'_>,
    locale: &Locale,
) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = orders
        .into_iter()
        .flat_map(|order| {
            order
                .payments
                .iter()
                .enumerate()
                .filter(move |(_, payment)| collector.owns(payment))
                .map(move |(i, payment)| HistoryEntry {
                    order_id: order.id.clone(),
                    product_name: order.product_name.clone(),
                    consumer_name: order.consumer.name.clone(),
                    installment_number: i + 1,
                    amount: order.installment,
                    paid_at: payment.paid_at.clone(),
                })
        })
        .collect();
    stable_sort_by(&mut entries, |a, b| locale.newest_stamp_first(&a.paid_at, &b.paid_at));
    entries
}

/// orders still being collected by `collector`
pub fn is_active_for(order: &Order, collector: &UserId) -> bool {
    order.is_assigned_to(collector) && !order.is_settled()
}

/// active orders whose latest payment carries today's display date
pub fn collected_today<'o>(
    orders: impl IntoIterator<Item = &'o Order>,
    collector: &UserId,
    today_label: &str,
    locale: &Locale,
) -> usize {
    orders
        .into_iter()
        .filter(|order| is_active_for(order, collector))
        .filter(|order| {
            order
                .last_payment()
                .map(|p| locale.display(&p.paid_at) == today_label)
                .unwrap_or(false)
        })
        .count()
}

fn remaining_after(tenor: u32, paid: usize) -> usize {
    (tenor as usize).saturating_sub(paid)
}
