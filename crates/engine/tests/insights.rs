use chrono::Duration;
use engine::{
    AccountType, AnomalyWindow, CancelFlag, Category, Currency, EngineError, Impact, InsightType,
    PostCmd, RuleTier,
};

mod common;

use common::{Fixture, at, fixture, usd};

/// One expense per past week (oldest first) followed by `current` dated
/// yesterday, all in `category`.
async fn weekly_history(fx: &Fixture, category: Category, history: &[&str], current: &str) {
    let now = at(2026, 10, 16);
    for (idx, amount) in history.iter().enumerate() {
        let weeks_back = (history.len() - idx) as i64;
        let when = now - Duration::days(7 * weeks_back + 3);
        fx.engine
            .post(PostCmd::expense(fx.user, fx.account, usd(amount), when).category(category))
            .await
            .unwrap();
    }
    fx.engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd(current), now - Duration::days(1))
                .category(category),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn categorize_is_deterministic_and_explained() {
    let fx = fixture(at(2026, 10, 16)).await;
    let amount = usd("-54.23");
    let first = fx.engine.categorize("Whole Foods Market", amount);
    for _ in 0..10 {
        assert_eq!(fx.engine.categorize("Whole Foods Market", amount), first);
    }
    assert_eq!(first.category, Category::Food);
    assert_eq!(first.tier, RuleTier::Merchant);

    let fallback = fx.engine.categorize("???", usd("-50"));
    assert_eq!(fallback.tier, RuleTier::Default);
    assert_eq!(fallback.category, Category::OtherExpense);
}

#[tokio::test]
async fn grocery_spike_is_flagged_once() {
    let fx = fixture(at(2026, 10, 16)).await;
    weekly_history(&fx, Category::Food, &["50"; 8], "400").await;

    let found = fx
        .engine
        .detect_anomalies(fx.user, None, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let insight = &found[0];
    assert_eq!(insight.insight_type, InsightType::Anomaly);
    assert_eq!(insight.category, Some(Category::Food));
    assert_eq!(insight.impact, Impact::Negative);
    assert!((insight.confidence - 70.0 / 72.0).abs() < 1e-9);
    assert_eq!(insight.data["current_minor"], 40_000);

    let stored = fx.engine.insights(fx.user).await.unwrap();
    assert_eq!(stored, found);
}

#[tokio::test]
async fn spend_within_one_deviation_is_not_flagged() {
    let fx = fixture(at(2026, 10, 16)).await;
    weekly_history(
        &fx,
        Category::Food,
        &["40", "60", "40", "60", "40", "60", "40", "60"],
        "55",
    )
    .await;

    let found = fx
        .engine
        .detect_anomalies(fx.user, None, &CancelFlag::new())
        .await
        .unwrap();
    assert!(found.is_empty());
    assert!(fx.engine.insights(fx.user).await.unwrap().is_empty());
}

#[tokio::test]
async fn scans_are_restartable_and_ignore_voided_spend() {
    let fx = fixture(at(2026, 10, 16)).await;
    weekly_history(&fx, Category::Transport, &["20"; 8], "300").await;
    let window = AnomalyWindow::ending_on(
        at(2026, 10, 16).date_naive(),
        &fx.engine.settings().anomaly,
    )
    .unwrap();

    let first = fx
        .engine
        .detect_anomalies(fx.user, Some(window), &CancelFlag::new())
        .await
        .unwrap();
    let second = fx
        .engine
        .detect_anomalies(fx.user, Some(window), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].data, second[0].data);

    let spike = fx
        .engine
        .transactions(fx.user, fx.account, false)
        .await
        .unwrap()
        .into_iter()
        .find(|tx| tx.amount == usd("300"))
        .unwrap();
    fx.engine.void(fx.user, spike.id).await.unwrap();
    let after = fx
        .engine
        .detect_anomalies(fx.user, Some(window), &CancelFlag::new())
        .await
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn spend_on_deleted_accounts_is_not_scanned() {
    let now = at(2026, 10, 16);
    let fx = fixture(now).await;
    weekly_history(&fx, Category::Food, &["50"; 8], "50").await;
    let card = fx
        .engine
        .open_account(fx.user, "Card", AccountType::Credit, Some(Currency::Usd))
        .await
        .unwrap();
    fx.engine
        .post(
            PostCmd::expense(fx.user, card.id, usd("350"), now - Duration::days(1))
                .category(Category::Food),
        )
        .await
        .unwrap();
    let window =
        AnomalyWindow::ending_on(now.date_naive(), &fx.engine.settings().anomaly).unwrap();

    let before = fx
        .engine
        .detect_anomalies(fx.user, Some(window), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(before.len(), 1);

    fx.engine.delete_account(fx.user, card.id).await.unwrap();
    let after = fx
        .engine
        .detect_anomalies(fx.user, Some(window), &CancelFlag::new())
        .await
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn cancelled_scan_persists_nothing() {
    let fx = fixture(at(2026, 10, 16)).await;
    weekly_history(&fx, Category::Food, &["50"; 8], "400").await;

    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = fx
        .engine
        .detect_anomalies(fx.user, None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
    assert!(fx.engine.insights(fx.user).await.unwrap().is_empty());

    // The ledger itself is never touched by a scan.
    let balance = fx.engine.account(fx.user, fx.account).await.unwrap().balance;
    assert_eq!(balance, usd("-800"));
}
