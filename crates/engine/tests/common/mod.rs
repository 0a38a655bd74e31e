#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use engine::{
    AccountType, Currency, Engine, FixedClock, LedgerStore, MemoryStore, Money,
};
use uuid::Uuid;

pub struct Fixture {
    pub engine: Engine,
    pub clock: Arc<FixedClock>,
    pub user: Uuid,
    pub account: Uuid,
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn usd(amount: &str) -> Money {
    Money::parse(amount, Currency::Usd).unwrap()
}

/// Engine over `store` with one user owning one USD checking account.
pub async fn fixture_with_store(store: Arc<dyn LedgerStore>, now: DateTime<Utc>) -> Fixture {
    let clock = Arc::new(FixedClock::new(now));
    let engine = Engine::builder()
        .store(store)
        .clock(clock.clone())
        .build()
        .await
        .unwrap();
    let user = engine
        .register_user("alice@example.com", "Alice")
        .await
        .unwrap();
    let account = engine
        .open_account(user.id, "Checking", AccountType::Checking, Some(Currency::Usd))
        .await
        .unwrap();
    Fixture {
        engine,
        clock,
        user: user.id,
        account: account.id,
    }
}

pub async fn fixture(now: DateTime<Utc>) -> Fixture {
    fixture_with_store(Arc::new(MemoryStore::new()), now).await
}

/// Signed sum of the live transactions of an account, straight from the ledger.
pub async fn ledger_sum(fx: &Fixture, account: Uuid) -> Money {
    let txs = fx.engine.transactions(fx.user, account, false).await.unwrap();
    Money::sum(txs.iter().map(|tx| tx.signed_amount())).unwrap()
}
