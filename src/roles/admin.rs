use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{find_order, matches_search, ShopContext};
use crate::errors::{Result, ShopError};
use crate::events::{Event, EventStore};
use crate::locale::stable_sort_by;
use crate::order::Order;
use crate::records::{Broadcast, Product, ProductDraft, Promo, PromoKind, UserRecord};
use crate::store::{self, Document, Feed, Precondition, Query, Record, StoreError, Stored};
use crate::types::{CollectorRef, OrderId, OrderStatus, ProductId, Role, UserId};
use crate::views::{group_by_label, BillView, ConsumerEntry, DateGroup, OrderLine, Page, Standing};

/// administrator desk: catalog, fulfilment, collector assignment, outreach
pub struct AdminDesk<'a> {
    ctx: ShopContext<'a>,
    uid: UserId,
    record: UserRecord,
    products: Feed<Product>,
    orders: Feed<Order>,
    users: Feed<UserRecord>,
    events: EventStore,
}

impl<'a> AdminDesk<'a> {
    pub(crate) fn open(ctx: ShopContext<'a>, uid: UserId, record: UserRecord) -> Result<Self> {
        Ok(Self {
            products: Feed::open(ctx.store, Query::all())?,
            orders: Feed::open(ctx.store, Query::all())?,
            users: Feed::open(ctx.store, Query::all())?,
            ctx,
            uid,
            record,
            events: EventStore::new(),
        })
    }

    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    pub fn name(&self) -> &str {
        self.record.display_name()
    }

    // catalog

    pub fn products_page(&self, page: usize) -> Page<Product> {
        let products = self.products.current().into_iter().map(|s| s.record).collect();
        Page::slice(products, page, self.ctx.config.catalog.products_per_page)
    }

    pub fn create_product(&mut self, draft: ProductDraft) -> Result<Product> {
        let product = draft.into_product()?;
        self.ctx
            .store
            .add(Product::COLLECTION, store::to_document(&product)?)?;
        info!(product_id = %product.id, name = %product.name, "product created");
        self.events.emit(Event::ProductCreated {
            product_id: product.id.clone(),
            name: product.name.clone(),
            principal: product.principal,
        });
        Ok(product)
    }

    /// replace a product's fields; existing orders keep their snapshots
    pub fn update_product(&mut self, product_id: &ProductId, draft: ProductDraft) -> Result<Product> {
        let stored = store::find::<Product>(self.ctx.store, "id", product_id.as_str())?
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.clone(),
            })?;
        let product = draft.into_product_with_id(product_id.clone())?;
        self.ctx.store.set(
            Product::COLLECTION,
            &stored.key,
            store::to_document(&product)?,
        )?;
        info!(product_id = %product.id, "product updated");
        self.events.emit(Event::ProductUpdated {
            product_id: product.id.clone(),
            name: product.name.clone(),
            principal: product.principal,
        });
        Ok(product)
    }

    // orders

    fn profiles(&self) -> BTreeMap<UserId, UserRecord> {
        self.users
            .current()
            .into_iter()
            .map(|s| (UserId::new(s.key.as_str()), s.record))
            .collect()
    }

    /// every order, newest first, grouped by display date
    pub fn orders_by_date(&self) -> Vec<DateGroup<OrderLine>> {
        let mut orders: Vec<Order> = self.orders.current().into_iter().map(|s| s.record).collect();
        let locale = self.ctx.locale;
        stable_sort_by(&mut orders, |a, b| locale.newest_stamp_first(&a.placed_at, &b.placed_at));

        let profiles = self.profiles();
        let lines = orders
            .iter()
            .map(|order| {
                let profile = profiles.get(&order.consumer.uid).map(|r| &r.profile);
                OrderLine::from_order(order, profile, &locale)
            })
            .collect();
        group_by_label(lines, |line: &OrderLine| line.placed_on.as_str())
    }

    pub fn ship(&mut self, order_id: &OrderId) -> Result<()> {
        self.advance(order_id, OrderStatus::Shipping)
    }

    pub fn mark_delivered(&mut self, order_id: &OrderId) -> Result<()> {
        self.advance(order_id, OrderStatus::Delivered)
    }

    fn advance(&mut self, order_id: &OrderId, target: OrderStatus) -> Result<()> {
        let Stored { key, record: mut order } = find_order(self.ctx.store, order_id)?;
        let from = order.advance(target).inspect_err(|err| {
            warn!(order_id = %order_id, error = %err, "status change rejected");
        })?;

        let mut fields = Document::new();
        fields.insert("status".to_string(), Value::from(target.as_tag()));
        let guard = [Precondition::field_equals("status", from.as_tag())];
        match self.ctx.store.update_if(Order::COLLECTION, &key, fields, &guard) {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                warn!(order_id = %order_id, "status changed since read");
                return Err(ShopError::ConcurrentUpdate {
                    order_id: order_id.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(order_id = %order_id, from = %from, to = %target, "order status changed");
        self.events.emit(Event::StatusChanged {
            order_id: order_id.clone(),
            old_status: from,
            new_status: target,
            timestamp: self.ctx.time.now(),
        });
        Ok(())
    }

    /// users currently holding the collector role
    pub fn collectors(&self) -> Vec<CollectorRef> {
        self.users
            .current()
            .into_iter()
            .filter(|s| s.record.role == Role::Collector)
            .map(|s| s.record.collector_ref(&UserId::new(s.key.as_str())))
            .collect()
    }

    /// assign or re-assign the collector of a delivered order; returns whether
    /// the assignment changed
    pub fn assign_collector(&mut self, order_id: &OrderId, collector_uid: &UserId) -> Result<bool> {
        let collector = self
            .collectors()
            .into_iter()
            .find(|c| &c.uid == collector_uid)
            .ok_or_else(|| ShopError::CollectorNotFound {
                uid: collector_uid.clone(),
            })?;

        let Stored { key, record: mut order } = find_order(self.ctx.store, order_id)?;
        let previous = order.assigned_collector.as_ref().map(|c| c.uid.clone());
        if !order.assign_collector(collector.clone())? {
            debug!(order_id = %order_id, collector = %collector.uid, "collector already assigned");
            return Ok(false);
        }

        let mut fields = Document::new();
        fields.insert(
            "assigned_collector".to_string(),
            serde_json::to_value(&collector).map_err(StoreError::from)?,
        );
        let guard = [Precondition::field_equals("status", OrderStatus::Delivered.as_tag())];
        match self.ctx.store.update_if(Order::COLLECTION, &key, fields, &guard) {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                let status = store::load::<Order>(self.ctx.store, &key)?
                    .map(|o| o.status)
                    .unwrap_or(order.status);
                return Err(ShopError::AssignmentNotAllowed { status });
            }
            Err(err) => return Err(err.into()),
        }

        info!(order_id = %order_id, collector = %collector.uid, "collector assigned");
        self.events.emit(Event::CollectorAssigned {
            order_id: order_id.clone(),
            collector: collector.uid,
            previous,
            timestamp: self.ctx.time.now(),
        });
        Ok(true)
    }

    /// delivered orders nobody collects yet
    pub fn awaiting_collector(&self) -> Vec<OrderLine> {
        let profiles = self.profiles();
        self.orders
            .current()
            .iter()
            .map(|s| &s.record)
            .filter(|o| o.status == OrderStatus::Delivered && o.assigned_collector.is_none())
            .map(|o| {
                let profile = profiles.get(&o.consumer.uid).map(|r| &r.profile);
                OrderLine::from_order(o, profile, &self.ctx.locale)
            })
            .collect()
    }

    /// delivered bills matching `search` on product, consumer or collector name
    pub fn active_bills(&self, search: &str) -> Vec<BillView> {
        self.orders
            .current()
            .iter()
            .map(|s| &s.record)
            .filter(|o| o.status == OrderStatus::Delivered)
            .filter(|o| {
                let collector = o.assigned_collector.as_ref().map_or("", |c| c.name.as_str());
                matches_search(&[o.product_name.as_str(), o.consumer.name.as_str(), collector], search)
            })
            .map(|o| BillView::from_order(o, &self.ctx.locale))
            .collect()
    }

    pub fn bill(&self, order_id: &OrderId) -> Result<BillView> {
        let stored = find_order(self.ctx.store, order_id)?;
        Ok(BillView::from_order(&stored.record, &self.ctx.locale))
    }

    /// consumer profiles with their billing standing
    pub fn consumer_directory(&self) -> Vec<ConsumerEntry> {
        let orders: Vec<Order> = self.orders.current().into_iter().map(|s| s.record).collect();
        self.users
            .current()
            .into_iter()
            .filter(|s| s.record.role == Role::Consumer)
            .map(|s| {
                let uid = UserId::new(s.key.as_str());
                let own: Vec<&Order> = orders.iter().filter(|o| o.consumer.uid == uid).collect();
                ConsumerEntry {
                    standing: Standing::of(own.iter().copied()),
                    order_count: own.len(),
                    uid,
                    email: s.record.email.clone(),
                    profile: s.record.profile,
                }
            })
            .collect()
    }

    // outreach

    pub fn broadcast(&mut self, message: &str) -> Result<Broadcast> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ShopError::missing_field("message"));
        }
        let broadcast = Broadcast {
            message: message.to_string(),
            sent_at: self.ctx.time.now(),
        };
        self.ctx
            .store
            .add(Broadcast::COLLECTION, store::to_document(&broadcast)?)?;
        info!(length = message.len(), "broadcast sent");
        self.events.emit(Event::BroadcastSent {
            message: broadcast.message.clone(),
            timestamp: broadcast.sent_at,
        });
        Ok(broadcast)
    }

    pub fn add_promo(&mut self, kind: PromoKind, url: &str) -> Result<Promo> {
        let promo = Promo::new(kind, url)?;
        self.ctx
            .store
            .add(Promo::COLLECTION, store::to_document(&promo)?)?;
        info!(promo_id = %promo.id, kind = ?promo.kind, "promo added");
        self.events.emit(Event::PromoAdded {
            promo_id: promo.id.clone(),
            kind: promo.kind,
        });
        Ok(promo)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// the user record this desk was opened with
    pub fn record(&self) -> &UserRecord {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::roles::tests::Fixture;
    use crate::roles::{ConsumerCounter, Session};
    use crate::types::{AddressChoice, PaymentFrequency};
    use crate::records::ConsumerProfile;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn admin(fx: &Fixture) -> AdminDesk<'_> {
        match fx.sign_in("admin@example.com") {
            Session::Admin(desk) => desk,
            other => panic!("unexpected session {:?}", other),
        }
    }

    fn draft(name: &str, principal: i64) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: "usaha kecil".to_string(),
            principal: Money::from_major(principal),
            images: ProductDraft::parse_images("https://img/1.jpg"),
        }
    }

    fn profile(name: &str) -> ConsumerProfile {
        ConsumerProfile {
            full_name: name.to_string(),
            business_type: "Warung".to_string(),
            home_address: "Jl. Melati 4".to_string(),
            business_address: "Pasar Baru 12".to_string(),
            phone: "08123456789".to_string(),
            national_id: "3273000000000001".to_string(),
            sales_name: "Andi".to_string(),
        }
    }

    /// registered consumer with a complete profile
    fn consumer<'a>(fx: &'a Fixture, email: &str, name: &str) -> ConsumerCounter<'a> {
        let session = crate::roles::register_consumer(fx.ctx(), &fx.identity, email, "rahasia1").unwrap();
        let Session::Consumer(mut counter) = session else {
            panic!("expected a consumer session");
        };
        counter.save_profile(profile(name)).unwrap();
        counter
    }

    fn setup() -> Fixture {
        let fx = Fixture::new();
        fx.staff("admin@example.com", Role::Admin, "Admin");
        fx.staff("budi@example.com", Role::Collector, "Budi");
        fx
    }

    #[test]
    fn test_catalog_management() {
        let fx = setup();
        let mut desk = admin(&fx);

        let product = desk.create_product(draft("Gerobak Bakso", 1_000_000)).unwrap();
        for i in 0..12 {
            desk.create_product(draft(&format!("Etalase {}", i), 500_000)).unwrap();
        }
        let first = desk.products_page(1);
        assert_eq!(first.items.len(), 12);
        assert_eq!(first.total, 13);
        assert!(first.has_next());
        assert_eq!(desk.products_page(2).items.len(), 1);

        let updated = desk
            .update_product(&product.id, draft("Gerobak Bakso Jumbo", 1_200_000))
            .unwrap();
        assert_eq!(updated.id, product.id);
        assert_eq!(desk.products_page(1).items[0].name, "Gerobak Bakso Jumbo");
        assert_eq!(desk.products_page(1).total, 13);

        assert_matches!(
            desk.update_product(&ProductId::from("PRD-NONE"), draft("X", 1)),
            Err(ShopError::ProductNotFound { .. })
        );
        assert_matches!(
            desk.create_product(draft("Gratis", 0)),
            Err(ShopError::InvalidAmount { .. })
        );
        assert_matches!(desk.events()[0], Event::ProductCreated { .. });
    }

    #[test]
    fn test_fulfilment_and_assignment() {
        let fx = setup();
        let mut desk = admin(&fx);
        let product = desk.create_product(draft("Gerobak Bakso", 1_000_000)).unwrap();

        let mut siti = consumer(&fx, "siti@example.com", "Siti Aminah");
        siti.add_to_cart(&product.id, 60, PaymentFrequency::Daily).unwrap();
        let order_id = siti.checkout(AddressChoice::Home).unwrap()[0].clone();

        let budi_uid = desk.collectors()[0].uid.clone();
        assert_matches!(
            desk.assign_collector(&order_id, &budi_uid),
            Err(ShopError::AssignmentNotAllowed { status: OrderStatus::Processing })
        );
        assert_matches!(
            desk.mark_delivered(&order_id),
            Err(ShopError::InvalidTransition { .. })
        );

        desk.ship(&order_id).unwrap();
        desk.mark_delivered(&order_id).unwrap();
        assert_matches!(desk.ship(&order_id), Err(ShopError::InvalidTransition { .. }));
        assert_eq!(desk.awaiting_collector().len(), 1);

        assert_matches!(
            desk.assign_collector(&order_id, &UserId::from("uid-unknown")),
            Err(ShopError::CollectorNotFound { .. })
        );
        assert!(desk.assign_collector(&order_id, &budi_uid).unwrap());
        assert!(!desk.assign_collector(&order_id, &budi_uid).unwrap());
        assert!(desk.awaiting_collector().is_empty());

        let bills = desk.active_bills("budi");
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].collector.as_deref(), Some("Budi"));
        assert!(desk.active_bills("etalase").is_empty());
        assert_eq!(desk.bill(&order_id).unwrap().remaining, 60);

        let status_changes = desk
            .events()
            .iter()
            .filter(|e| matches!(e, Event::StatusChanged { .. }))
            .count();
        assert_eq!(status_changes, 2);
    }

    #[test]
    fn test_orders_grouped_newest_first_with_current_names() {
        let fx = setup();
        let mut desk = admin(&fx);
        let product = desk.create_product(draft("Gerobak Bakso", 1_000_000)).unwrap();

        let mut siti = consumer(&fx, "siti@example.com", "Siti Aminah");
        siti.add_to_cart(&product.id, 60, PaymentFrequency::Daily).unwrap();
        siti.checkout(AddressChoice::Home).unwrap();

        fx.time.test_control().unwrap().advance(Duration::days(1));
        siti.add_to_cart(&product.id, 90, PaymentFrequency::Weekly).unwrap();
        siti.add_to_cart(&product.id, 120, PaymentFrequency::Daily).unwrap();
        siti.checkout(AddressChoice::Business).unwrap();

        // renaming the profile shows up on the admin list, not in the snapshot
        siti.save_profile(profile("Siti A. Rahma")).unwrap();

        let groups = desk.orders_by_date();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "15 November 2024");
        assert_eq!(groups[0].lines.len(), 2);
        assert_eq!(groups[1].label, "14 November 2024");
        assert_eq!(groups[1].lines[0].consumer_name, "Siti A. Rahma");
        assert_eq!(groups[1].lines[0].sales_name.as_deref(), Some("Andi"));
        assert_eq!(desk.bill(&groups[1].lines[0].order_id).unwrap().consumer_name, "Siti Aminah");
    }

    #[test]
    fn test_consumer_directory_standing() {
        let fx = setup();
        let mut desk = admin(&fx);
        let product = desk.create_product(draft("Gerobak Bakso", 1_000_000)).unwrap();

        let mut siti = consumer(&fx, "siti@example.com", "Siti Aminah");
        consumer(&fx, "rina@example.com", "Rina");
        siti.add_to_cart(&product.id, 60, PaymentFrequency::Daily).unwrap();
        siti.checkout(AddressChoice::Home).unwrap();

        let directory = desk.consumer_directory();
        assert_eq!(directory.len(), 2);
        let siti_entry = directory.iter().find(|e| e.email == "siti@example.com").unwrap();
        assert_eq!(siti_entry.standing, Standing::Running);
        assert_eq!(siti_entry.order_count, 1);
        let rina_entry = directory.iter().find(|e| e.email == "rina@example.com").unwrap();
        assert_eq!(rina_entry.standing, Standing::NoOrders);
        assert_eq!(rina_entry.profile.full_name, "Rina");
    }

    #[test]
    fn test_outreach() {
        let fx = setup();
        let mut desk = admin(&fx);

        assert_matches!(desk.broadcast("   "), Err(ShopError::MissingField { .. }));
        let sent = desk.broadcast(" Libur pasar hari Jumat ").unwrap();
        assert_eq!(sent.message, "Libur pasar hari Jumat");
        assert_eq!(sent.sent_at, fx.time.now());

        desk.add_promo(PromoKind::Video, "https://video/promo").unwrap();
        assert_matches!(desk.add_promo(PromoKind::Image, ""), Err(ShopError::MissingField { .. }));
        assert_eq!(desk.take_events().len(), 2);
        assert!(desk.events().is_empty());
    }
}
