//! serializable projections handed to the presentation layer
use serde::Serialize;

use crate::decimal::Money;
use crate::locale::Locale;
use crate::order::Order;
use crate::records::ConsumerProfile;
use crate::types::{OrderId, OrderStatus, PaymentFrequency, UserId};

/// one bill with its collection progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillView {
    pub order_id: OrderId,
    pub product_name: String,
    pub consumer_name: String,
    pub status: OrderStatus,
    pub frequency: PaymentFrequency,
    pub installment: Money,
    pub installment_label: String,
    pub tenor: u32,
    pub paid: usize,
    pub remaining: usize,
    pub progress_percent: u32,
    pub collected: Money,
    pub collector: Option<String>,
    pub placed_on: String,
    pub shipping_address: String,
    pub payments: Vec<PaymentLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLine {
    pub number: usize,
    pub date: String,
    pub collected_by: String,
}

impl BillView {
    pub fn from_order(order: &Order, locale: &Locale) -> Self {
        let paid = order.paid_count();
        let progress_percent = if order.tenor == 0 {
            0
        } else {
            ((paid.min(order.tenor as usize) * 100) / order.tenor as usize) as u32
        };
        BillView {
            order_id: order.id.clone(),
            product_name: order.product_name.clone(),
            consumer_name: order.consumer.name.clone(),
            status: order.status,
            frequency: order.frequency,
            installment: order.installment,
            installment_label: locale.installment_label(order.installment, order.frequency),
            tenor: order.tenor,
            paid,
            remaining: order.remaining(),
            progress_percent,
            collected: order.collected(),
            collector: order.assigned_collector.as_ref().map(|c| c.name.clone()),
            placed_on: locale.display(&order.placed_at),
            shipping_address: order.shipping_address.clone(),
            payments: order
                .payments
                .iter()
                .enumerate()
                .map(|(i, p)| PaymentLine {
                    number: i + 1,
                    date: locale.display(&p.paid_at),
                    collected_by: p.collected_by.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// administrator's order list row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub placed_on: String,
    pub product_name: String,
    /// consumer's current full name, or the snapshot when the profile is gone
    pub consumer_name: String,
    pub sales_name: Option<String>,
    pub status: OrderStatus,
    pub installment_label: String,
    pub collector: Option<String>,
    pub shipping_address: String,
}

impl OrderLine {
    pub fn from_order(order: &Order, profile: Option<&ConsumerProfile>, locale: &Locale) -> Self {
        let consumer_name = profile
            .map(|p| p.full_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(order.consumer.name.as_str())
            .to_string();
        let sales_name = profile
            .map(|p| p.sales_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        OrderLine {
            order_id: order.id.clone(),
            placed_on: locale.display(&order.placed_at),
            product_name: order.product_name.clone(),
            consumer_name,
            sales_name,
            status: order.status,
            installment_label: locale.installment_label(order.installment, order.frequency),
            collector: order.assigned_collector.as_ref().map(|c| c.name.clone()),
            shipping_address: order.shipping_address.clone(),
        }
    }
}

/// rows sharing a display date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateGroup<T> {
    pub label: String,
    pub lines: Vec<T>,
}

/// group already-sorted rows into runs of equal labels
pub fn group_by_label<T>(rows: Vec<T>, label: impl Fn(&T) -> &str) -> Vec<DateGroup<T>> {
    let mut groups: Vec<DateGroup<T>> = Vec::new();
    for row in rows {
        let row_label = label(&row).to_string();
        match groups.last_mut() {
            Some(group) if group.label == row_label => group.lines.push(row),
            _ => groups.push(DateGroup {
                label: row_label,
                lines: vec![row],
            }),
        }
    }
    groups
}

/// one page of a listing; pages are numbered from 1
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn slice(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total = all.len();
        let total_pages = total.div_ceil(per_page);
        let items = all
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Page {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// a consumer's billing standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    NoOrders,
    /// at least one order not yet paid off
    Running,
    Settled,
}

impl Standing {
    pub fn of<'o>(orders: impl IntoIterator<Item = &'o Order>) -> Self {
        let mut any = false;
        for order in orders {
            if !order.is_settled() {
                return Standing::Running;
            }
            any = true;
        }
        if any {
            Standing::Settled
        } else {
            Standing::NoOrders
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumerEntry {
    pub uid: UserId,
    pub email: String,
    #[serde(flatten)]
    pub profile: ConsumerProfile,
    pub standing: Standing,
    pub order_count: usize,
}

/// collector's day at a glance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub active: usize,
    pub collected_today: usize,
    pub pending_today: usize,
}
