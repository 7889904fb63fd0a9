use thiserror::Error;

use crate::decimal::Money;
use crate::identity::AuthError;
use crate::store::StoreError;
use crate::types::{OrderId, OrderStatus, ProductId, UserId};

/// coarse classification used when surfacing an error to the initiating user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// bad input, rejected before any write
    Validation,
    /// action outside the permitted state or role
    Authorization,
    /// identity or store failure
    Collaborator,
    /// referenced record no longer exists
    NotFound,
}

#[derive(Error, Debug)]
pub enum ShopError {
    // validation
    #[error("missing required field: {field}")]
    MissingField {
        field: String,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("unrecognized tenor: {days} days")]
    UnrecognizedTenor {
        days: u32,
    },

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("profile incomplete, missing: {}", missing.join(", "))]
    ProfileIncomplete {
        missing: Vec<String>,
    },

    // authorization
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("collector can only be assigned to delivered orders, current status is {status}")]
    AssignmentNotAllowed {
        status: OrderStatus,
    },

    #[error("order {order_id} is not delivered yet (status {status})")]
    NotDelivered {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("order {order_id} has no collector assigned")]
    NoCollectorAssigned {
        order_id: OrderId,
    },

    #[error("order {order_id} is not assigned to collector {collector}")]
    NotAssignedCollector {
        order_id: OrderId,
        collector: UserId,
    },

    #[error("order {order_id} already settled")]
    AlreadySettled {
        order_id: OrderId,
    },

    #[error("no user record for account {uid}")]
    UnknownAccount {
        uid: UserId,
    },

    // not found
    #[error("order not found: {order_id}")]
    OrderNotFound {
        order_id: OrderId,
    },

    #[error("product not found: {product_id}")]
    ProductNotFound {
        product_id: ProductId,
    },

    #[error("collector not found: {uid}")]
    CollectorNotFound {
        uid: UserId,
    },

    #[error("cart line not found: {line_id}")]
    CartLineNotFound {
        line_id: uuid::Uuid,
    },

    // collaborators
    #[error("corrupt record: {message}")]
    CorruptRecord {
        message: String,
    },

    #[error("order {order_id} was modified concurrently, reload and retry")]
    ConcurrentUpdate {
        order_id: OrderId,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("identity error: {0}")]
    Auth(#[from] AuthError),
}

impl ShopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShopError::MissingField { .. }
            | ShopError::InvalidAmount { .. }
            | ShopError::UnrecognizedTenor { .. }
            | ShopError::EmptyCart
            | ShopError::InvalidConfiguration { .. }
            | ShopError::ProfileIncomplete { .. } => ErrorKind::Validation,

            ShopError::InvalidTransition { .. }
            | ShopError::AssignmentNotAllowed { .. }
            | ShopError::NotDelivered { .. }
            | ShopError::NoCollectorAssigned { .. }
            | ShopError::NotAssignedCollector { .. }
            | ShopError::AlreadySettled { .. }
            | ShopError::UnknownAccount { .. } => ErrorKind::Authorization,

            ShopError::OrderNotFound { .. }
            | ShopError::ProductNotFound { .. }
            | ShopError::CollectorNotFound { .. }
            | ShopError::CartLineNotFound { .. } => ErrorKind::NotFound,

            ShopError::Store(StoreError::DocumentNotFound { .. }) => ErrorKind::NotFound,
            ShopError::CorruptRecord { .. }
            | ShopError::ConcurrentUpdate { .. }
            | ShopError::Store(_)
            | ShopError::Auth(_) => ErrorKind::Collaborator,
        }
    }

    pub fn missing_field(field: &str) -> Self {
        ShopError::MissingField {
            field: field.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
