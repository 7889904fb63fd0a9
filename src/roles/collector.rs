use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{find_order, matches_search, ShopContext};
use crate::errors::{Result, ShopError};
use crate::events::{Event, EventStore};
use crate::ledger::{self, Attribution, HistoryEntry, PaymentReceipt};
use crate::order::Order;
use crate::records::UserRecord;
use crate::store::{Feed, Query};
use crate::types::{CollectorRef, OrderId, UserId};
use crate::views::{BillView, DailyStats};

/// a collection agent's round: own active bills, payments, history
pub struct CollectorRound<'a> {
    ctx: ShopContext<'a>,
    uid: UserId,
    record: UserRecord,
    orders: Feed<Order>,
    consumers: Feed<UserRecord>,
    events: EventStore,
}

impl<'a> CollectorRound<'a> {
    pub(crate) fn open(ctx: ShopContext<'a>, uid: UserId, record: UserRecord) -> Result<Self> {
        Ok(Self {
            orders: Feed::open(ctx.store, Query::all())?,
            consumers: Feed::open(ctx.store, Query::all().where_eq("role", "consumer"))?,
            ctx,
            uid,
            record,
            events: EventStore::new(),
        })
    }

    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    /// how this collector appears on orders and payments
    pub fn me(&self) -> CollectorRef {
        self.record.collector_ref(&self.uid)
    }

    fn all_orders(&self) -> Vec<Order> {
        self.orders.current().into_iter().map(|s| s.record).collect()
    }

    fn current_names(&self) -> BTreeMap<UserId, String> {
        self.consumers
            .current()
            .into_iter()
            .map(|s| (UserId::new(s.key.as_str()), s.record.profile.full_name))
            .filter(|(_, name)| !name.trim().is_empty())
            .collect()
    }

    /// own unsettled bills, searchable by the consumer's current name
    pub fn active_bills(&self, search: &str) -> Vec<BillView> {
        let names = self.current_names();
        self.all_orders()
            .iter()
            .filter(|o| ledger::is_active_for(o, &self.uid))
            .filter_map(|o| {
                let name = names.get(&o.consumer.uid).unwrap_or(&o.consumer.name);
                if !matches_search(&[name.as_str()], search) {
                    return None;
                }
                let mut view = BillView::from_order(o, &self.ctx.locale);
                view.consumer_name = name.clone();
                Some(view)
            })
            .collect()
    }

    pub fn record_payment(&mut self, order_id: &OrderId) -> Result<PaymentReceipt> {
        let receipt = ledger::record_payment(self.ctx.store, order_id, &self.me(), self.ctx.time)?;
        self.events.emit(Event::PaymentRecorded {
            order_id: receipt.order_id.clone(),
            collector: receipt.collector.clone(),
            installment_number: receipt.installment_number,
            amount: receipt.amount,
            timestamp: receipt.paid_at,
        });
        if receipt.settled() {
            self.events.emit(Event::OrderPaidOff {
                order_id: receipt.order_id.clone(),
                total_collected: receipt.amount * receipt.installment_number as u32,
                timestamp: receipt.paid_at,
            });
        }
        Ok(receipt)
    }

    /// every payment this collector recorded, newest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        let orders = self.all_orders();
        let who = Attribution {
            uid: &self.uid,
            name: self.record.display_name(),
            email: &self.record.email,
        };
        let entries = ledger::collection_history(&orders, who, &self.ctx.locale);
        debug!(collector = %self.uid, entries = entries.len(), "history loaded");
        entries
    }

    pub fn daily_stats(&self) -> DailyStats {
        let orders = self.all_orders();
        let active = orders
            .iter()
            .filter(|o| ledger::is_active_for(o, &self.uid))
            .count();
        let collected_today = ledger::collected_today(
            &orders,
            &self.uid,
            &self.ctx.today_label(),
            &self.ctx.locale,
        );
        let stats = DailyStats {
            active,
            collected_today,
            pending_today: active.saturating_sub(collected_today),
        };
        info!(
            collector = %self.uid,
            active = stats.active,
            collected = stats.collected_today,
            "daily stats"
        );
        stats
    }

    /// detail of a bill assigned to this collector
    pub fn bill(&self, order_id: &OrderId) -> Result<BillView> {
        let order = find_order(self.ctx.store, order_id)?.record;
        if !order.is_assigned_to(&self.uid) {
            return Err(ShopError::NotAssignedCollector {
                order_id: order_id.clone(),
                collector: self.uid.clone(),
            });
        }
        Ok(BillView::from_order(&order, &self.ctx.locale))
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }
}
