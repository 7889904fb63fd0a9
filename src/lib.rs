pub mod cart;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod identity;
pub mod installment;
pub mod ledger;
pub mod locale;
pub mod order;
pub mod records;
pub mod roles;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod views;

// re-export key types
pub use cart::{Cart, CartLine};
pub use config::ShopConfig;
pub use decimal::{Markup, Money};
pub use errors::{ErrorKind, Result, ShopError};
pub use events::{Event, EventStore};
pub use identity::{AuthError, Identity, IdentityProvider, MemoryIdentity};
pub use installment::{InstallmentCalculator, InstallmentQuote};
pub use ledger::{PaymentLedger, PaymentReceipt};
pub use locale::Locale;
pub use order::{Order, Payment};
pub use records::{Broadcast, ConsumerProfile, Product, ProductDraft, Promo, PromoKind, UserRecord};
pub use roles::{
    open_session, register_consumer, seed_default_promos, sign_in, AdminDesk, CollectorRound,
    ConsumerCounter, PaymentNotice, Session, ShopContext, Storefront,
};
pub use store::{DocumentStore, MemoryStore, StoreError};
pub use types::{
    AddressChoice, CollectorRef, ConsumerRef, OrderId, OrderStatus, PaymentFrequency, ProductId,
    Role, Stamp, UserId,
};
pub use views::{BillView, DailyStats, OrderLine};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
