//! Role-scoped sessions.
//!
//! A signed-in account is turned into exactly one of three desks according to
//! the role on its user record. Each desk borrows the shared store, clock and
//! configuration, keeps live feeds of the collections it reads, and exposes
//! only the operations its role may perform.

pub mod admin;
pub mod collector;
pub mod consumer;

pub use admin::AdminDesk;
pub use collector::CollectorRound;
pub use consumer::{ConsumerCounter, PaymentNotice, Storefront};

use hourglass_rs::SafeTimeProvider;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ShopConfig;
use crate::errors::{Result, ShopError};
use crate::events::Event;
use crate::identity::{Identity, IdentityProvider};
use crate::locale::Locale;
use crate::order::Order;
use crate::records::{Promo, UserRecord};
use crate::store::{self, DocumentStore, Query, Record, StoreError, Stored, WriteOp};
use crate::types::{DocKey, OrderId, Role, UserId};

/// handles shared by every desk
#[derive(Clone, Copy)]
pub struct ShopContext<'a> {
    pub store: &'a dyn DocumentStore,
    pub time: &'a SafeTimeProvider,
    pub config: &'a ShopConfig,
    pub locale: Locale,
}

impl<'a> ShopContext<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        time: &'a SafeTimeProvider,
        config: &'a ShopConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            time,
            config,
            locale: Locale::new(&config.locale)?,
        })
    }

    /// today's display label in the shop's locale
    pub fn today_label(&self) -> String {
        self.locale.long_date(self.time.now())
    }
}

/// the signed-in account's desk
pub enum Session<'a> {
    Admin(AdminDesk<'a>),
    Collector(CollectorRound<'a>),
    Consumer(ConsumerCounter<'a>),
}

impl Session<'_> {
    pub fn role(&self) -> Role {
        match self {
            Session::Admin(_) => Role::Admin,
            Session::Collector(_) => Role::Collector,
            Session::Consumer(_) => Role::Consumer,
        }
    }

    pub fn uid(&self) -> &UserId {
        match self {
            Session::Admin(desk) => desk.uid(),
            Session::Collector(round) => round.uid(),
            Session::Consumer(counter) => counter.uid(),
        }
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role())
            .field("uid", self.uid())
            .finish()
    }
}

pub(crate) fn user_key(uid: &UserId) -> DocKey {
    DocKey::new(uid.as_str())
}

/// write the user record for an identity
pub fn enroll(store: &dyn DocumentStore, identity: &Identity, record: &UserRecord) -> Result<()> {
    store.set(
        UserRecord::COLLECTION,
        &user_key(&identity.uid),
        store::to_document(record)?,
    )?;
    info!(uid = %identity.uid, role = ?record.role, "user record written");
    Ok(())
}

/// write the default promos in one batch when the collection is empty;
/// returns what was written
pub fn seed_default_promos(store: &dyn DocumentStore) -> Result<Vec<Promo>> {
    if !store::list::<Promo>(store, &Query::all())?.is_empty() {
        debug!("promos present, nothing to seed");
        return Ok(Vec::new());
    }
    let promos = Promo::defaults();
    let ops = promos
        .iter()
        .map(|promo| {
            Ok(WriteOp::Add {
                collection: Promo::COLLECTION,
                fields: store::to_document(promo)?,
            })
        })
        .collect::<std::result::Result<Vec<_>, StoreError>>()?;
    store.batch_write(ops)?;
    info!(count = promos.len(), "default promos seeded");
    Ok(promos)
}

/// open the desk for an authenticated identity; an identity without a user
/// record is signed out
pub fn open_session<'a>(
    ctx: ShopContext<'a>,
    identity: &dyn IdentityProvider,
    who: &Identity,
) -> Result<Session<'a>> {
    let record = match store::load::<UserRecord>(ctx.store, &user_key(&who.uid))? {
        Some(record) => record,
        None => {
            warn!(uid = %who.uid, "no user record, signing out");
            identity.sign_out()?;
            return Err(ShopError::UnknownAccount {
                uid: who.uid.clone(),
            });
        }
    };

    let session = match record.role {
        Role::Admin => Session::Admin(AdminDesk::open(ctx, who.uid.clone(), record)?),
        Role::Collector => Session::Collector(CollectorRound::open(ctx, who.uid.clone(), record)?),
        Role::Consumer => Session::Consumer(ConsumerCounter::open(ctx, who.uid.clone(), record)?),
    };
    info!(uid = %who.uid, role = ?session.role(), "session opened");
    Ok(session)
}

pub fn sign_in<'a>(
    ctx: ShopContext<'a>,
    identity: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<Session<'a>> {
    let who = identity.sign_in(email, password)?;
    open_session(ctx, identity, &who)
}

/// self-registration: create the account and a `consumer` user record
pub fn register_consumer<'a>(
    ctx: ShopContext<'a>,
    identity: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<Session<'a>> {
    let who = identity.sign_up(email, password)?;
    enroll(ctx.store, &who, &UserRecord::new_consumer(&who.email))?;

    let mut session = open_session(ctx, identity, &who)?;
    if let Session::Consumer(counter) = &mut session {
        counter.record_event(Event::ConsumerRegistered {
            uid: who.uid.clone(),
            email: who.email.clone(),
        });
    }
    Ok(session)
}

/// case-insensitive substring match over any of `fields`; a blank term matches all
pub(crate) fn matches_search(fields: &[&str], term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&term))
}

pub(crate) fn find_order(store: &dyn DocumentStore, order_id: &OrderId) -> Result<Stored<Order>> {
    store::find::<Order>(store, "id", order_id.as_str())?.ok_or_else(|| ShopError::OrderNotFound {
        order_id: order_id.clone(),
    })
}
