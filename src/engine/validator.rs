//! Bid validator. Pure: decides over a snapshot and touches nothing.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::{errors::BidRejection, types::Auction};

/// Check a proposed amount against an auction snapshot.
///
/// Rules apply in order and the first failure is returned:
/// 1. amount must be positive
/// 2. `now <= end_time` and not settled
/// 3. amount at least the minimum bid
/// 4. amount strictly above the current highest bid (zero without bids)
pub fn validate_bid(
    amount: Decimal,
    auction: &Auction,
    now: DateTime<Utc>,
) -> Result<(), BidRejection> {
    if amount <= Decimal::ZERO {
        return Err(BidRejection::InvalidAmount);
    }
    if auction.is_settled() || now > auction.end_time {
        return Err(BidRejection::AuctionEnded);
    }
    if amount < auction.minimum_bid {
        return Err(BidRejection::BelowMinimum {
            minimum: auction.minimum_bid,
            currency: auction.currency.clone(),
        });
    }
    let current_highest = auction.current_highest_bid();
    if amount <= current_highest {
        return Err(BidRejection::NotHighEnough {
            current_highest,
            currency: auction.currency.clone(),
        });
    }
    Ok(())
}

/// Convert a client-supplied float. NaN and infinities are `InvalidAmount`.
pub fn amount_from_f64(value: f64) -> Result<Decimal, BidRejection> {
    if !value.is_finite() {
        return Err(BidRejection::InvalidAmount);
    }
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or(BidRejection::InvalidAmount)
}
