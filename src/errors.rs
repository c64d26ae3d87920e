use rust_decimal::Decimal;
use thiserror::Error;

/// Why a proposed bid was refused.
///
/// The `Display` text is the business message shown to the bidder and must be
/// surfaced verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidRejection {
    #[error("Invalid bid amount")]
    InvalidAmount,
    #[error("Auction has ended")]
    AuctionEnded,
    #[error("Bid amount must be at least {minimum} {currency}")]
    BelowMinimum { minimum: Decimal, currency: String },
    #[error("Bid amount must be higher than the current highest bid of {current_highest} {currency}")]
    NotHighEnough {
        current_highest: Decimal,
        currency: String,
    },
}

impl BidRejection {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::InvalidAmount => "invalid_amount",
            BidRejection::AuctionEnded => "auction_ended",
            BidRejection::BelowMinimum { .. } => "below_minimum",
            BidRejection::NotHighEnough { .. } => "not_high_enough",
        }
    }
}

/// HTTP error classification
#[derive(Error, Debug, Clone)]
pub enum HttpErrorKind {
    #[error("Client error: {message}")]
    Client { message: String },
    #[error("Rate limited: {message}")]
    RateLimited { message: String },
    #[error("Server error: {message}")]
    Server { message: String },
}

/// Broad error families, used for status mapping and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    ExternalDependency,
    Consistency,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::ExternalDependency => "external_dependency",
            ErrorKind::Consistency => "consistency",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Main crate error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    // === Validation ===
    /// Bid refused by the validator
    #[error("{0}")]
    Rejected(#[from] BidRejection),

    #[error("Auction not found")]
    AuctionNotFound,

    #[error("Cannot end an auction that hasn't started yet")]
    StartsInFuture,

    #[error("Invalid auction: {0}")]
    InvalidAuction(String),

    #[error("Auction {0} is already registered")]
    DuplicateAuction(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid social id: {0}")]
    InvalidSocialId(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Raw on-chain amount cannot be represented in human units
    #[error("Amount {raw} with {decimals} decimals is out of range")]
    AmountOutOfRange { raw: String, decimals: u8 },

    // === Authorization ===
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Only the auction host can end the auction")]
    NotHost,

    // === Consistency ===
    #[error("Auction has already been settled")]
    AlreadySettled,

    #[error("Auction settlement already in progress")]
    SettlementInProgress,

    /// A concurrent bid took the highest slot between validation and commit
    #[error("A higher bid was recorded concurrently; current highest is {current_highest}")]
    BidRaceLost { current_highest: Decimal },

    // === External dependencies ===
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Price oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Identity lookup failed: {0}")]
    IdentityUnavailable(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// HTTP error with status code and classification
    #[error("HTTP error (status {status}): {kind}")]
    Http { status: u16, kind: HttpErrorKind },

    #[error("Generic request error: {0}")]
    GenericRequest(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    // === Internal ===
    #[error("Json parse error: {0}")]
    JsonParse(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Rejected(_)
            | Error::AuctionNotFound
            | Error::StartsInFuture
            | Error::InvalidAuction(_)
            | Error::DuplicateAuction(_)
            | Error::InvalidWallet(_)
            | Error::UserNotFound
            | Error::InvalidSocialId(_)
            | Error::InvalidRequest(_)
            | Error::AmountOutOfRange { .. } => ErrorKind::Validation,
            Error::Unauthenticated | Error::NotHost => ErrorKind::Authorization,
            Error::AlreadySettled | Error::SettlementInProgress | Error::BidRaceLost { .. } => {
                ErrorKind::Consistency
            }
            Error::LedgerUnavailable(_)
            | Error::OracleUnavailable(_)
            | Error::IdentityUnavailable(_)
            | Error::Timeout(_)
            | Error::Http { .. }
            | Error::GenericRequest(_)
            | Error::Rpc { .. }
            | Error::AbiDecode(_) => ErrorKind::ExternalDependency,
            Error::JsonParse(_) | Error::Snapshot(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ExternalDependency
    }

    /// Create an HTTP client error
    pub fn client_error(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            kind: HttpErrorKind::Client {
                message: message.into(),
            },
        }
    }

    /// Create an HTTP server error
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            kind: HttpErrorKind::Server {
                message: message.into(),
            },
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Error::Http {
            status: 429,
            kind: HttpErrorKind::RateLimited {
                message: message.into(),
            },
        }
    }

    pub fn json_parse(msg: impl Into<String>) -> Self {
        Error::JsonParse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejection_messages_are_business_text() {
        let below = BidRejection::BelowMinimum {
            minimum: dec!(12.5),
            currency: "USDC".to_string(),
        };
        assert_eq!(below.to_string(), "Bid amount must be at least 12.5 USDC");

        let err: Error = below.into();
        assert_eq!(err.to_string(), "Bid amount must be at least 12.5 USDC");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(Error::NotHost.kind(), ErrorKind::Authorization);
        assert_eq!(Error::AlreadySettled.kind(), ErrorKind::Consistency);
        assert_eq!(
            Error::BidRaceLost {
                current_highest: dec!(1)
            }
            .kind(),
            ErrorKind::Consistency
        );
        assert!(Error::LedgerUnavailable("down".into()).is_retryable());
        assert!(!Error::AlreadySettled.is_retryable());
        assert!(!Error::Rejected(BidRejection::AuctionEnded).is_retryable());
    }
}
