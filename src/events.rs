use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::records::PromoKind;
use crate::types::{OrderId, OrderStatus, ProductId, UserId};

/// all events emitted by shop operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // order lifecycle
    OrderPlaced {
        order_id: OrderId,
        consumer: UserId,
        product_name: String,
        tenor: u32,
        installment: Money,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        order_id: OrderId,
        old_status: OrderStatus,
        new_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    CollectorAssigned {
        order_id: OrderId,
        collector: UserId,
        previous: Option<UserId>,
        timestamp: DateTime<Utc>,
    },

    // collection
    PaymentRecorded {
        order_id: OrderId,
        collector: UserId,
        installment_number: usize,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    OrderPaidOff {
        order_id: OrderId,
        total_collected: Money,
        timestamp: DateTime<Utc>,
    },

    // catalog and content
    ProductCreated {
        product_id: ProductId,
        name: String,
        principal: Money,
    },
    ProductUpdated {
        product_id: ProductId,
        name: String,
        principal: Money,
    },
    PromoAdded {
        promo_id: String,
        kind: PromoKind,
    },
    BroadcastSent {
        message: String,
        timestamp: DateTime<Utc>,
    },

    // accounts
    ConsumerRegistered {
        uid: UserId,
        email: String,
    },
    ProfileSaved {
        uid: UserId,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
