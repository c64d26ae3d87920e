use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::errors::BidRejection;
use crate::store::AuctionStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_keep_highest_monotonic() {
    let h = Harness::new();
    h.running("A", USDC, dec!(1)).await;

    // Interleave low and high amounts so many attempts overlap.
    let amounts: Vec<Decimal> = (1..=48u32)
        .map(|i| Decimal::from(if i % 2 == 0 { i } else { 100 - i }))
        .collect();
    let tasks = amounts.iter().enumerate().map(|(i, amount)| {
        let engine = h.engine.clone();
        let amount = *amount;
        tokio::spawn(async move {
            engine
                .place_bid(MirrorBid {
                    auction: LedgerAuctionId::new("A"),
                    bidder: wallet(i as u8 + 1),
                    amount,
                    idempotency_key: None,
                })
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let mut accepted = Vec::new();
    for result in &results {
        match result {
            Ok(record) => accepted.push(record.amount),
            Err(Error::Rejected(BidRejection::NotHighEnough { .. }))
            | Err(Error::BidRaceLost { .. }) => {}
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    let auction = h.auction("A").await;
    let stored: Vec<Decimal> = auction.bids.iter().map(|b| b.amount).collect();
    assert!(stored.windows(2).all(|w| w[0] < w[1]), "stored bids not increasing: {stored:?}");
    assert_eq!(stored.len(), accepted.len());
    assert_eq!(auction.current_highest_bid(), dec!(99));
    assert_eq!(
        accepted.iter().max().copied(),
        Some(auction.current_highest_bid())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_record_one_bid() {
    let h = Harness::new();
    h.running("A", USDC, dec!(1)).await;

    let tasks = (0..16).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move {
            engine
                .place_bid(MirrorBid {
                    auction: LedgerAuctionId::new("A"),
                    bidder: wallet(1),
                    amount: dec!(12),
                    idempotency_key: Some("retry-me".into()),
                })
                .await
        })
    });
    let records: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(records.iter().filter(|r| !r.replayed).count(), 1);
    assert!(records.iter().all(|r| r.amount == dec!(12)));
    assert_eq!(h.auction("A").await.bid_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settles_commit_once() {
    let h = Harness::new();
    h.running("A", USDC, dec!(1)).await;
    h.ledger.set(
        "A",
        vec![entry(wallet(1), usdc_raw(3), ""), entry(wallet(2), usdc_raw(8), "")],
    );

    let tasks = (0..8).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.settle(HOST, &LedgerAuctionId::new("A"), None).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let settled = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(settled, 1);
    assert!(results.iter().all(|r| matches!(
        r,
        Ok(_) | Err(Error::AlreadySettled) | Err(Error::SettlementInProgress)
    )));
    assert_eq!(h.store.winning_bids().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bids_racing_settlement_never_survive_it() {
    let h = Harness::new();
    h.running("A", USDC, dec!(1)).await;
    let ledger_list = vec![entry(wallet(1), usdc_raw(5), "")];
    h.ledger.set("A", ledger_list);

    let bids = (0..24u32).map(|i| {
        let engine = h.engine.clone();
        tokio::spawn(async move {
            engine
                .place_bid(MirrorBid {
                    auction: LedgerAuctionId::new("A"),
                    bidder: wallet(50),
                    amount: Decimal::from(10 + i),
                    idempotency_key: None,
                })
                .await
        })
    });
    let engine = h.engine.clone();
    let settle =
        tokio::spawn(async move { engine.settle(HOST, &LedgerAuctionId::new("A"), None).await });

    for joined in join_all(bids).await {
        match joined.unwrap() {
            Ok(_)
            | Err(Error::Rejected(_))
            | Err(Error::BidRaceLost { .. }) => {}
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }
    settle.await.unwrap().unwrap();

    let auction = h.auction("A").await;
    assert!(auction.is_settled());
    assert_eq!(auction.bid_count(), 1);
    assert_eq!(auction.bids[0].bidder, wallet(1));
    assert_eq!(auction.current_highest_bid(), dec!(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_auctions_do_not_block_each_other() {
    let h = Harness::new();
    for id in ["A", "B", "C"] {
        h.running(id, USDC, dec!(1)).await;
    }
    h.ledger.set("A", vec![entry(wallet(1), usdc_raw(2), "")]);
    h.ledger.pause();

    let engine = h.engine.clone();
    let settling =
        tokio::spawn(async move { engine.settle(HOST, &LedgerAuctionId::new("A"), None).await });
    h.ledger.entered.notified().await;

    let tasks = ["B", "C"].into_iter().flat_map(|id| {
        (1..=5u32).map(move |n| (id, n))
    });
    for (id, n) in tasks {
        h.bid(id, wallet(n as u8), Decimal::from(n)).await.unwrap();
    }
    assert_eq!(h.auction("B").await.bid_count(), 5);
    assert_eq!(h.auction("C").await.bid_count(), 5);

    h.ledger.resume();
    settling.await.unwrap().unwrap();
}
