//! Purpose: Structured results for operations the caller is expected to branch on.
//! Exports: `Outcome`, `Rejection`, `RejectReason`.
//! Role: Keeps expected refusals out of the error channel.
//! Invariants: A rejected operation performed no write against the store.
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum RejectReason {
    StockNotFound,
    InsufficientQuantity,
    Conflict,
}

impl RejectReason {
    /// Status-like code for callers that present HTTP-style results.
    pub fn status(self) -> u16 {
        match self {
            RejectReason::StockNotFound => 404,
            RejectReason::InsufficientQuantity => 400,
            RejectReason::Conflict => 409,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            RejectReason::StockNotFound => "Stock not found for this product",
            RejectReason::InsufficientQuantity => "Insufficient stock quantity",
            RejectReason::Conflict => "Product with this barcode already exists",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

impl Rejection {
    pub fn new(reason: RejectReason) -> Self {
        Self {
            reason,
            message: reason.default_message().to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        self.reason.status()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Applied {
        value: T,
        status: u16,
        message: String,
    },
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn applied(value: T, status: u16, message: impl Into<String>) -> Self {
        Outcome::Applied {
            value,
            status,
            message: message.into(),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Outcome::Rejected(Rejection::new(reason))
    }

    pub fn status(&self) -> u16 {
        match self {
            Outcome::Applied { status, .. } => *status,
            Outcome::Rejected(rejection) => rejection.status(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Applied { message, .. } => message,
            Outcome::Rejected(rejection) => &rejection.message,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Applied { value, .. } => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Applied { .. } => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }
}
