use std::collections::BTreeMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::{find_order, matches_search, user_key, ShopContext};
use crate::cart::{Cart, CartLine};
use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::events::{Event, EventStore};
use crate::installment::InstallmentCalculator;
use crate::locale::{stable_sort_by, Locale};
use crate::order::Order;
use crate::records::{Broadcast, ConsumerProfile, Product, Promo, UserRecord};
use crate::store::{self, Feed, Query, Record, StoreError, WriteOp};
use crate::types::{AddressChoice, ConsumerRef, OrderId, OrderStatus, PaymentFrequency, ProductId, UserId};
use crate::views::BillView;

/// what the consumer lands on: the catalog, or the profile form while the
/// profile is too incomplete to order
#[derive(Debug, Clone, PartialEq)]
pub enum Storefront {
    Catalog(Vec<Product>),
    CompleteProfile(ConsumerProfile),
}

/// a payment collected today on one of the consumer's orders
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotice {
    pub order_id: OrderId,
    pub product_name: String,
    pub installment_number: usize,
    pub amount: Money,
    pub remaining: usize,
}

/// payments per order, the baseline a later snapshot is compared against
pub type PaymentCounts = BTreeMap<OrderId, usize>;

pub fn payment_counts<'o>(orders: impl IntoIterator<Item = &'o Order>) -> PaymentCounts {
    orders
        .into_iter()
        .map(|o| (o.id.clone(), o.paid_count()))
        .collect()
}

/// orders known in `previous` whose ledger grew and whose newest payment is
/// dated today; orders first seen in this snapshot never notify
pub fn payment_notices<'o>(
    orders: impl IntoIterator<Item = &'o Order>,
    previous: &PaymentCounts,
    today_label: &str,
    locale: &Locale,
) -> Vec<PaymentNotice> {
    orders
        .into_iter()
        .filter(|o| previous.get(&o.id).is_some_and(|&before| o.paid_count() > before))
        .filter(|o| {
            o.last_payment()
                .is_some_and(|p| locale.display(&p.paid_at) == today_label)
        })
        .map(|o| PaymentNotice {
            order_id: o.id.clone(),
            product_name: o.product_name.clone(),
            installment_number: o.paid_count(),
            amount: o.installment,
            remaining: o.remaining(),
        })
        .collect()
}

/// consumer storefront: catalog, cart, checkout, own bills, notices
pub struct ConsumerCounter<'a> {
    ctx: ShopContext<'a>,
    uid: UserId,
    record: UserRecord,
    calculator: InstallmentCalculator,
    cart: Cart,
    products: Feed<Product>,
    orders: Feed<Order>,
    broadcasts: Feed<Broadcast>,
    promos: Feed<Promo>,
    seen_payments: PaymentCounts,
    events: EventStore,
}

impl<'a> ConsumerCounter<'a> {
    pub(crate) fn open(ctx: ShopContext<'a>, uid: UserId, record: UserRecord) -> Result<Self> {
        let orders: Feed<Order> =
            Feed::open(ctx.store, Query::all().where_eq("user_id", uid.as_str()))?;
        let seen_payments = payment_counts(orders.current().iter().map(|s| &s.record));
        Ok(Self {
            calculator: InstallmentCalculator::from_config(ctx.config),
            cart: Cart::new(),
            products: Feed::open(ctx.store, Query::all())?,
            broadcasts: Feed::open(ctx.store, Query::all().descending_by("sent_at"))?,
            promos: Feed::open(ctx.store, Query::all())?,
            orders,
            seen_payments,
            ctx,
            uid,
            record,
            events: EventStore::new(),
        })
    }

    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    pub fn profile(&self) -> &ConsumerProfile {
        &self.record.profile
    }

    pub(crate) fn record_event(&mut self, event: Event) {
        self.events.emit(event);
    }

    fn ensure_can_order(&self) -> Result<()> {
        let missing = self.record.profile.missing_for_ordering();
        if missing.is_empty() {
            Ok(())
        } else {
            warn!(uid = %self.uid, missing = ?missing, "ordering blocked on incomplete profile");
            Err(ShopError::ProfileIncomplete { missing })
        }
    }

    /// catalog filtered by product name, or the profile form
    pub fn storefront(&self, search: &str) -> Storefront {
        if !self.record.profile.can_order() {
            return Storefront::CompleteProfile(self.record.profile.clone());
        }
        Storefront::Catalog(
            self.products
                .current()
                .into_iter()
                .map(|s| s.record)
                .filter(|p| matches_search(&[p.name.as_str()], search))
                .collect(),
        )
    }

    /// tenors on offer with their installment for a product
    pub fn price_options(
        &self,
        product_id: &ProductId,
        frequency: PaymentFrequency,
    ) -> Result<Vec<(u32, Money)>> {
        let product = self.product(product_id)?;
        self.calculator
            .tenor_options()
            .iter()
            .map(|t| {
                self.calculator
                    .quote(product.principal, t.days, frequency)
                    .map(|q| (t.days, q.installment))
            })
            .collect()
    }

    pub fn save_profile(&mut self, profile: ConsumerProfile) -> Result<()> {
        profile.validate_for_save()?;
        let mut fields = store::to_document(&profile)?;
        fields.insert("name".to_string(), profile.full_name.clone().into());
        self.ctx
            .store
            .update(UserRecord::COLLECTION, &user_key(&self.uid), fields)?;

        self.record.name = profile.full_name.clone();
        self.record.profile = profile;
        info!(uid = %self.uid, "profile saved");
        self.events.emit(Event::ProfileSaved {
            uid: self.uid.clone(),
        });
        Ok(())
    }

    fn product(&self, product_id: &ProductId) -> Result<Product> {
        self.products
            .current()
            .into_iter()
            .map(|s| s.record)
            .find(|p| &p.id == product_id)
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.clone(),
            })
    }

    pub fn add_to_cart(
        &mut self,
        product_id: &ProductId,
        tenor_days: u32,
        frequency: PaymentFrequency,
    ) -> Result<Uuid> {
        self.ensure_can_order()?;
        let product = self.product(product_id)?;
        self.cart.add(&self.calculator, &product, tenor_days, frequency)
    }

    pub fn remove_from_cart(&mut self, line_id: Uuid) -> Result<CartLine> {
        self.cart.remove(line_id)
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// place one order per cart line in a single atomic batch; the cart is kept
    /// if anything fails
    pub fn checkout(&mut self, choice: AddressChoice) -> Result<Vec<OrderId>> {
        self.ensure_can_order()?;
        let consumer = ConsumerRef {
            uid: self.uid.clone(),
            name: self.record.display_name().to_string(),
            email: self.record.email.clone(),
        };
        let placed_at = self.ctx.time.now();
        let orders = self.cart.draft_orders(
            &consumer,
            self.record.profile.address(choice),
            choice,
            placed_at,
        )?;

        let ops = orders
            .iter()
            .map(|order| {
                Ok(WriteOp::Add {
                    collection: Order::COLLECTION,
                    fields: store::to_document(order)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, StoreError>>()?;
        self.ctx.store.batch_write(ops).inspect_err(|err| {
            warn!(uid = %self.uid, error = %err, "checkout failed, cart kept");
        })?;

        self.cart.clear();
        for order in &orders {
            self.seen_payments.insert(order.id.clone(), 0);
            info!(order_id = %order.id, uid = %self.uid, tenor = order.tenor, "order placed");
            self.events.emit(Event::OrderPlaced {
                order_id: order.id.clone(),
                consumer: self.uid.clone(),
                product_name: order.product_name.clone(),
                tenor: order.tenor,
                installment: order.installment,
                timestamp: placed_at,
            });
        }
        Ok(orders.into_iter().map(|o| o.id).collect())
    }

    fn own_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.current().into_iter().map(|s| s.record).collect();
        let locale = self.ctx.locale;
        stable_sort_by(&mut orders, |a, b| locale.newest_stamp_first(&a.placed_at, &b.placed_at));
        orders
    }

    /// own order history, newest first
    pub fn orders(&self) -> Vec<BillView> {
        self.own_orders()
            .iter()
            .map(|o| BillView::from_order(o, &self.ctx.locale))
            .collect()
    }

    /// own orders not yet paid off
    pub fn active_bills(&self) -> Vec<BillView> {
        self.own_orders()
            .iter()
            .filter(|o| o.status != OrderStatus::PaidOff)
            .map(|o| BillView::from_order(o, &self.ctx.locale))
            .collect()
    }

    /// own bill; other consumers' orders read as not found
    pub fn bill(&self, order_id: &OrderId) -> Result<BillView> {
        let order = find_order(self.ctx.store, order_id)?.record;
        if order.consumer.uid != self.uid {
            return Err(ShopError::OrderNotFound {
                order_id: order_id.clone(),
            });
        }
        Ok(BillView::from_order(&order, &self.ctx.locale))
    }

    /// broadcasts, newest first
    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.broadcasts.current().into_iter().map(|s| s.record).collect()
    }

    pub fn promos(&self) -> Vec<Promo> {
        self.promos.current().into_iter().map(|s| s.record).collect()
    }

    /// notices for payments recorded since the last poll
    pub fn poll_payment_notices(&mut self) -> Vec<PaymentNotice> {
        let orders: Vec<Order> = self.orders.current().into_iter().map(|s| s.record).collect();
        let notices = payment_notices(
            &orders,
            &self.seen_payments,
            &self.ctx.today_label(),
            &self.ctx.locale,
        );
        self.seen_payments = payment_counts(&orders);
        notices
    }

    /// wait for the next change to the consumer's orders and report any
    /// payment collected today
    pub async fn next_payment_notices(&mut self) -> Result<Vec<PaymentNotice>> {
        self.orders.next().await?;
        Ok(self.poll_payment_notices())
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::tests::sample_order;
    use crate::records::ProductDraft;
    use crate::roles::tests::Fixture;
    use crate::roles::{register_consumer, AdminDesk, CollectorRound, Session};
    use crate::types::{Role, Stamp};
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn complete(name: &str) -> ConsumerProfile {
        ConsumerProfile {
            full_name: name.to_string(),
            business_type: "Warung".to_string(),
            home_address: "Jl. Melati 4".to_string(),
            business_address: "Pasar Baru 12".to_string(),
            phone: "08123456789".to_string(),
            national_id: "3273000000000001".to_string(),
            sales_name: String::new(),
        }
    }

    fn register<'a>(fx: &'a Fixture, email: &str) -> ConsumerCounter<'a> {
        match register_consumer(fx.ctx(), &fx.identity, email, "rahasia1").unwrap() {
            Session::Consumer(counter) => counter,
            other => panic!("unexpected session {:?}", other),
        }
    }

    fn admin(fx: &Fixture) -> AdminDesk<'_> {
        match fx.sign_in("admin@example.com") {
            Session::Admin(desk) => desk,
            other => panic!("unexpected session {:?}", other),
        }
    }

    fn collector(fx: &Fixture) -> CollectorRound<'_> {
        match fx.sign_in("budi@example.com") {
            Session::Collector(round) => round,
            other => panic!("unexpected session {:?}", other),
        }
    }

    fn setup() -> (Fixture, ProductId) {
        let fx = Fixture::new();
        fx.staff("admin@example.com", Role::Admin, "Admin");
        fx.staff("budi@example.com", Role::Collector, "Budi");
        let product_id = admin(&fx)
            .create_product(ProductDraft {
                name: "Gerobak Bakso".to_string(),
                description: String::new(),
                principal: Money::from_major(1_000_000),
                images: vec!["https://img/1.jpg".to_string()],
            })
            .unwrap()
            .id;
        (fx, product_id)
    }

    #[test]
    fn test_incomplete_profile_blocks_ordering() {
        let (fx, product_id) = setup();
        let mut siti = register(&fx, "siti@example.com");

        // fresh accounts carry the email as full name but no phone
        assert_matches!(siti.storefront(""), Storefront::CompleteProfile(_));
        assert_matches!(
            siti.add_to_cart(&product_id, 60, PaymentFrequency::Daily),
            Err(ShopError::ProfileIncomplete { missing }) if missing == vec!["phone".to_string()]
        );

        let mut partial = complete("Siti Aminah");
        partial.national_id.clear();
        assert_matches!(siti.save_profile(partial), Err(ShopError::MissingField { .. }));

        siti.save_profile(complete("Siti Aminah")).unwrap();
        assert_matches!(siti.storefront("bakso"), Storefront::Catalog(products) if products.len() == 1);
        assert_matches!(siti.storefront("etalase"), Storefront::Catalog(products) if products.is_empty());
    }

    #[test]
    fn test_checkout_places_independent_orders() {
        let (fx, product_id) = setup();
        let mut siti = register(&fx, "siti@example.com");
        siti.save_profile(complete("Siti Aminah")).unwrap();

        let options = siti.price_options(&product_id, PaymentFrequency::Daily).unwrap();
        assert_eq!(options[0], (60, Money::from_major(20_000)));
        assert_eq!(options.len(), 5);

        assert_matches!(siti.checkout(AddressChoice::Home), Err(ShopError::EmptyCart));
        siti.add_to_cart(&product_id, 60, PaymentFrequency::Daily).unwrap();
        siti.add_to_cart(&product_id, 60, PaymentFrequency::Weekly).unwrap();
        let ids = siti.checkout(AddressChoice::Business).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(siti.cart().is_empty());

        let orders = siti.orders();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.status == OrderStatus::Processing));
        assert!(orders.iter().all(|o| o.shipping_address == "Pasar Baru 12"));
        assert_eq!(siti.active_bills().len(), 2);
        assert_eq!(siti.bill(&ids[1]).unwrap().installment, Money::from_major(120_000));

        let placed = siti
            .events()
            .iter()
            .filter(|e| matches!(e, Event::OrderPlaced { .. }))
            .count();
        assert_eq!(placed, 2);
    }

    #[test]
    fn test_oversized_principal_is_refused_not_priced() {
        let (fx, _) = setup();
        let huge = admin(&fx)
            .create_product(ProductDraft {
                name: "Ruko".to_string(),
                description: String::new(),
                principal: Money::from_str_exact("79228162514264337593543950335").unwrap(),
                images: vec!["https://img/ruko.jpg".to_string()],
            })
            .unwrap();
        let mut siti = register(&fx, "siti@example.com");
        siti.save_profile(complete("Siti Aminah")).unwrap();

        assert_matches!(
            siti.price_options(&huge.id, PaymentFrequency::Daily),
            Err(ShopError::InvalidAmount { .. })
        );
        assert_matches!(
            siti.add_to_cart(&huge.id, 180, PaymentFrequency::Weekly),
            Err(ShopError::InvalidAmount { .. })
        );
        assert!(siti.cart().is_empty());
    }

    #[test]
    fn test_failed_checkout_keeps_cart() {
        let (fx, product_id) = setup();
        let mut siti = register(&fx, "siti@example.com");
        siti.save_profile(complete("Siti Aminah")).unwrap();
        siti.add_to_cart(&product_id, 90, PaymentFrequency::Daily).unwrap();

        fx.store.set_unavailable(Some("offline")).unwrap();
        let err = siti.checkout(AddressChoice::Home).err().unwrap();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Collaborator);
        fx.store.set_unavailable(None).unwrap();

        assert_eq!(siti.cart().len(), 1);
        assert!(siti.orders().is_empty());
        assert_eq!(siti.checkout(AddressChoice::Home).unwrap().len(), 1);
    }

    #[test]
    fn test_orders_are_private() {
        let (fx, product_id) = setup();
        let mut siti = register(&fx, "siti@example.com");
        siti.save_profile(complete("Siti Aminah")).unwrap();
        siti.add_to_cart(&product_id, 60, PaymentFrequency::Daily).unwrap();
        let ids = siti.checkout(AddressChoice::Home).unwrap();

        let mut rina = register(&fx, "rina@example.com");
        rina.save_profile(complete("Rina Wati")).unwrap();
        assert!(rina.orders().is_empty());
        assert_matches!(rina.bill(&ids[0]), Err(ShopError::OrderNotFound { .. }));
    }

    #[test]
    fn test_broadcasts_newest_first_and_promos() {
        let (fx, _) = setup();
        let siti = register(&fx, "siti@example.com");
        let mut desk = admin(&fx);
        desk.broadcast("Pasar buka jam 7").unwrap();
        fx.time.test_control().unwrap().advance(Duration::hours(2));
        desk.broadcast("Penagihan mulai jam 9").unwrap();
        desk.add_promo(crate::records::PromoKind::Image, "https://img/promo.jpg").unwrap();

        let messages: Vec<String> = siti.broadcasts().into_iter().map(|b| b.message).collect();
        assert_eq!(messages, vec!["Penagihan mulai jam 9", "Pasar buka jam 7"]);
        assert_eq!(siti.promos().len(), 1);
    }

    #[test]
    fn test_payment_notices_from_snapshot_diffs() {
        let locale = Locale::jakarta();
        let mut order = sample_order(60);
        let previous = payment_counts([&order]);

        order.payments.push(crate::order::Payment {
            paid_at: Stamp::At(Utc.with_ymd_and_hms(2024, 11, 14, 3, 0, 0).unwrap()),
            collected_by: "Budi".to_string(),
            collector_uid: None,
        });
        let notices = payment_notices([&order], &previous, "14 November 2024", &locale);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].installment_number, 1);
        assert_eq!(notices[0].remaining, 59);

        // a payment dated another day does not notify
        assert!(payment_notices([&order], &previous, "15 November 2024", &locale).is_empty());
        // nor does an order absent from the baseline
        assert!(payment_notices([&order], &PaymentCounts::new(), "14 November 2024", &locale).is_empty());
    }

    #[tokio::test]
    async fn test_consumer_hears_about_collected_payment() {
        let (fx, product_id) = setup();
        let mut siti = register(&fx, "siti@example.com");
        siti.save_profile(complete("Siti Aminah")).unwrap();
        siti.add_to_cart(&product_id, 60, PaymentFrequency::Daily).unwrap();
        let id = siti.checkout(AddressChoice::Home).unwrap().remove(0);

        let mut desk = admin(&fx);
        desk.ship(&id).unwrap();
        desk.mark_delivered(&id).unwrap();
        let budi_uid = desk.collectors()[0].uid.clone();
        desk.assign_collector(&id, &budi_uid).unwrap();

        collector(&fx).record_payment(&id).unwrap();
        let notices = siti.next_payment_notices().await.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].order_id, id);
        assert!(siti.poll_payment_notices().is_empty());
    }
}
