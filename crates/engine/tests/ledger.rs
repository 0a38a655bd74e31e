use std::sync::Arc;

use chrono::Duration;
use engine::{
    AccountType, Category, Currency, Engine, EngineError, Money, PostCmd, TransactionPatch,
    TransactionType, TransferCmd,
};

mod common;

use common::{at, fixture, ledger_sum, usd};

#[tokio::test]
async fn post_moves_balance_by_signed_amount() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;

    let salary = fx
        .engine
        .post(
            PostCmd::income(fx.user, fx.account, usd("2500.00"), now - Duration::days(2))
                .category(Category::Salary),
        )
        .await
        .unwrap();
    assert_eq!(salary.account(fx.account).unwrap().balance, usd("2500.00"));
    assert!(salary.alerts.is_empty());

    let rent = fx
        .engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd("1200.50"), now - Duration::days(1))
                .category(Category::Housing)
                .description("  March rent ")
                .tags(["Home", "home", " fixed "]),
        )
        .await
        .unwrap();
    let tx = rent.transaction().unwrap();
    assert_eq!(tx.signed_amount(), usd("-1200.50"));
    assert_eq!(tx.description.as_deref(), Some("March rent"));
    assert_eq!(tx.tags, vec!["fixed".to_string(), "home".to_string()]);
    assert_eq!(tx.currency, Currency::Usd);

    let account = fx.engine.account(fx.user, fx.account).await.unwrap();
    assert_eq!(account.balance, usd("1299.50"));
    assert_eq!(ledger_sum(&fx, fx.account).await, account.balance);
}

#[tokio::test]
async fn rejected_posts_leave_the_ledger_untouched() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    fx.engine
        .post(PostCmd::income(fx.user, fx.account, usd("100"), now).category(Category::Salary))
        .await
        .unwrap();

    let zero = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, Money::ZERO, now))
        .await
        .unwrap_err();
    assert!(zero.is_validation());

    let wrong_category = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("5"), now).category(Category::Salary))
        .await
        .unwrap_err();
    assert!(matches!(wrong_category, EngineError::InvalidCategory(_)));

    let future = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("5"), now + Duration::hours(1)))
        .await
        .unwrap_err();
    assert!(future.is_validation());

    let direct_transfer = fx
        .engine
        .post(PostCmd::new(
            fx.user,
            fx.account,
            TransactionType::Transfer,
            usd("5"),
            now,
        ))
        .await
        .unwrap_err();
    assert!(direct_transfer.is_validation());

    let unknown = fx
        .engine
        .post(PostCmd::expense(fx.user, uuid::Uuid::new_v4(), usd("5"), now))
        .await
        .unwrap_err();
    assert!(matches!(unknown, EngineError::NotFound(_)));

    let txs = fx.engine.transactions(fx.user, fx.account, true).await.unwrap();
    assert_eq!(txs.len(), 1);
    let account = fx.engine.account(fx.user, fx.account).await.unwrap();
    assert_eq!(account.balance, usd("100"));
}

#[tokio::test]
async fn closed_and_foreign_accounts_cannot_be_posted_to() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;

    let mallory = fx
        .engine
        .register_user("mallory@example.com", "Mallory")
        .await
        .unwrap();
    let foreign = fx
        .engine
        .post(PostCmd::expense(mallory.id, fx.account, usd("5"), now))
        .await
        .unwrap_err();
    assert!(matches!(foreign, EngineError::NotFound(_)));

    fx.engine.close_account(fx.user, fx.account).await.unwrap();
    let closed = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("5"), now))
        .await
        .unwrap_err();
    assert!(matches!(closed, EngineError::AccountInactive(_)));
    assert!(closed.is_not_found());

    let deleted = fx.engine.delete_account(fx.user, fx.account).await.unwrap();
    assert!(deleted.deleted_at.is_some());
    assert!(fx.engine.accounts(fx.user).await.unwrap().is_empty());
    let gone = fx.engine.account(fx.user, fx.account).await.unwrap_err();
    assert!(matches!(gone, EngineError::NotFound(_)));
}

#[tokio::test]
async fn void_reverses_and_cannot_repeat() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let posted = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("42.10"), now).category(Category::Food))
        .await
        .unwrap();
    let tx_id = posted.transaction().unwrap().id;

    let voided = fx.engine.void(fx.user, tx_id).await.unwrap();
    assert_eq!(voided.account(fx.account).unwrap().balance, Money::ZERO);
    assert!(voided.transaction().unwrap().is_voided());

    let again = fx.engine.void(fx.user, tx_id).await.unwrap_err();
    assert!(matches!(again, EngineError::NotFound(_)));

    assert!(fx.engine.transactions(fx.user, fx.account, false).await.unwrap().is_empty());
    let audit = fx.engine.transactions(fx.user, fx.account, true).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(audit[0].deleted_at.is_some());
}

#[tokio::test]
async fn amend_keeps_identity_and_void_reverses_latest_amount() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let posted = fx
        .engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd("30"), now - Duration::days(3))
                .category(Category::Food)
                .description("lunch"),
        )
        .await
        .unwrap();
    let original = posted.transaction().unwrap().clone();

    let amended = fx
        .engine
        .amend(
            fx.user,
            original.id,
            TransactionPatch::new()
                .amount(usd("45"))
                .category(Category::Entertainment)
                .description(Some("concert".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(amended.account(fx.account).unwrap().balance, usd("-45"));

    let read = fx.engine.transaction(fx.user, original.id).await.unwrap();
    assert_eq!(read.id, original.id);
    assert_eq!(read.sequence, original.sequence);
    assert_eq!(read.amount, usd("45"));
    assert_eq!(read.category, Category::Entertainment);
    assert_eq!(read.description.as_deref(), Some("concert"));
    assert_eq!(read.revision, 1);
    assert_eq!(read.history.len(), 1);
    assert_eq!(read.history[0].amount, usd("30"));
    assert_eq!(read.history[0].category, Category::Food);

    let voided = fx.engine.void(fx.user, original.id).await.unwrap();
    assert_eq!(voided.account(fx.account).unwrap().balance, Money::ZERO);
}

#[tokio::test]
async fn amend_type_change_recategorizes_and_bad_patches_fail() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let posted = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("20"), now).category(Category::Food))
        .await
        .unwrap();
    let id = posted.transaction().unwrap().id;

    let flipped = fx
        .engine
        .amend(
            fx.user,
            id,
            TransactionPatch::new().transaction_type(TransactionType::Income),
        )
        .await
        .unwrap();
    let tx = flipped.transaction().unwrap();
    assert_eq!(tx.transaction_type, TransactionType::Income);
    assert!(engine::categories::validate(TransactionType::Income, tx.category));
    assert_eq!(flipped.account(fx.account).unwrap().balance, usd("20"));

    let empty = fx.engine.amend(fx.user, id, TransactionPatch::new()).await.unwrap_err();
    assert!(empty.is_validation());

    let mismatch = fx
        .engine
        .amend(fx.user, id, TransactionPatch::new().category(Category::Food))
        .await
        .unwrap_err();
    assert!(matches!(mismatch, EngineError::InvalidCategory(_)));

    let into_transfer = fx
        .engine
        .amend(
            fx.user,
            id,
            TransactionPatch::new().transaction_type(TransactionType::Transfer),
        )
        .await
        .unwrap_err();
    assert!(into_transfer.is_validation());

    let read = fx.engine.transaction(fx.user, id).await.unwrap();
    assert_eq!(read.revision, 1);
}

#[tokio::test]
async fn uncategorized_posts_use_the_categorizer() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let posted = fx
        .engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd("54.23"), now)
                .description("Whole Foods Market #1234"),
        )
        .await
        .unwrap();
    assert_eq!(posted.transaction().unwrap().category, Category::Food);

    let other = fx
        .engine
        .post(PostCmd::income(fx.user, fx.account, usd("12"), now).description("zzz"))
        .await
        .unwrap();
    assert_eq!(other.transaction().unwrap().category, Category::OtherIncome);
}

#[tokio::test]
async fn transfers_move_both_balances_and_void_together() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let savings = fx
        .engine
        .open_account(fx.user, "Savings", AccountType::Savings, Some(Currency::Usd))
        .await
        .unwrap();
    fx.engine
        .post(PostCmd::income(fx.user, fx.account, usd("500"), now).category(Category::Salary))
        .await
        .unwrap();

    let moved = fx
        .engine
        .transfer(TransferCmd::new(fx.user, fx.account, savings.id, usd("200"), now).description("save"))
        .await
        .unwrap();
    assert_eq!(moved.transactions.len(), 2);
    assert_eq!(moved.account(fx.account).unwrap().balance, usd("300"));
    assert_eq!(moved.account(savings.id).unwrap().balance, usd("200"));
    let out_leg = &moved.transactions[0];
    let in_leg = &moved.transactions[1];
    assert_eq!(out_leg.transfer_id, in_leg.transfer_id);
    assert_eq!(out_leg.category, Category::Transfer);
    assert_eq!(out_leg.signed_amount(), usd("-200"));
    assert_eq!(in_leg.signed_amount(), usd("200"));

    let amend_leg = fx
        .engine
        .amend(fx.user, in_leg.id, TransactionPatch::new().amount(usd("1")))
        .await
        .unwrap_err();
    assert!(amend_leg.is_validation());

    let voided = fx.engine.void(fx.user, in_leg.id).await.unwrap();
    assert_eq!(voided.transactions.len(), 2);
    assert_eq!(fx.engine.account(fx.user, fx.account).await.unwrap().balance, usd("500"));
    assert_eq!(fx.engine.account(fx.user, savings.id).await.unwrap().balance, Money::ZERO);
    assert!(matches!(
        fx.engine.void(fx.user, out_leg.id).await.unwrap_err(),
        EngineError::NotFound(_)
    ));

    let same = fx
        .engine
        .transfer(TransferCmd::new(fx.user, fx.account, fx.account, usd("1"), now))
        .await
        .unwrap_err();
    assert!(same.is_validation());

    let euros = fx
        .engine
        .open_account(fx.user, "Euro", AccountType::Cash, Some(Currency::Eur))
        .await
        .unwrap();
    let mismatch = fx
        .engine
        .transfer(TransferCmd::new(fx.user, fx.account, euros.id, usd("1"), now))
        .await
        .unwrap_err();
    assert!(mismatch.is_validation());
}

#[tokio::test]
async fn balance_as_of_folds_history() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    for (day, amount) in [(1, "100"), (5, "50"), (10, "25")] {
        fx.engine
            .post(
                PostCmd::income(fx.user, fx.account, usd(amount), at(2026, 3, day))
                    .category(Category::Freelance),
            )
            .await
            .unwrap();
    }
    let middle = fx
        .engine
        .balance_as_of(fx.user, fx.account, at(2026, 3, 6))
        .await
        .unwrap();
    assert_eq!(middle, usd("150"));

    let live = fx.engine.account(fx.user, fx.account).await.unwrap().balance;
    let folded = fx.engine.balance_as_of(fx.user, fx.account, now).await.unwrap();
    assert_eq!(live, folded);
    assert_eq!(live, usd("175"));

    let report = fx.engine.reconcile(fx.user, fx.account).await.unwrap();
    assert!(!report.repaired);
    assert_eq!(report.derived, live);
}

#[tokio::test]
async fn overflowing_post_or_amend_changes_nothing() {
    let now = at(2026, 6, 30);
    let fx = fixture(now).await;
    let near_max = Money::new(Money::MAX_MINOR - 500).unwrap();
    fx.engine
        .post(PostCmd::income(fx.user, fx.account, near_max, now).category(Category::Salary))
        .await
        .unwrap();
    let small = fx
        .engine
        .post(PostCmd::income(fx.user, fx.account, Money::new(500).unwrap(), now))
        .await
        .unwrap();
    let small_id = small.transaction().unwrap().id;
    let full = Money::new(Money::MAX_MINOR).unwrap();
    assert_eq!(small.account(fx.account).unwrap().balance, full);

    let posted = fx
        .engine
        .post(PostCmd::income(fx.user, fx.account, Money::new(1).unwrap(), now))
        .await
        .unwrap_err();
    assert!(matches!(posted, EngineError::Overflow(_)));

    let amended = fx
        .engine
        .amend(
            fx.user,
            small_id,
            TransactionPatch::new().amount(Money::new(501).unwrap()),
        )
        .await
        .unwrap_err();
    assert!(matches!(amended, EngineError::Overflow(_)));

    let account = fx.engine.account(fx.user, fx.account).await.unwrap();
    assert_eq!(account.balance, full);
    assert_eq!(account.balance, ledger_sum(&fx, fx.account).await);
    let ledger = fx.engine.transactions(fx.user, fx.account, true).await.unwrap();
    assert_eq!(ledger.len(), 2);
    let unchanged = fx.engine.transaction(fx.user, small_id).await.unwrap();
    assert_eq!(unchanged.amount, Money::new(500).unwrap());
    assert_eq!(unchanged.revision, 0);
}

#[tokio::test]
async fn concurrent_posts_on_one_account_serialize() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    let engine: Arc<Engine> = Arc::new(fx.engine);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 1..=25_i64 {
        let engine = engine.clone();
        let (user, account) = (fx.user, fx.account);
        tasks.spawn(async move {
            engine
                .post(PostCmd::income(user, account, Money::new(i * 100).unwrap(), now))
                .await
                .map(|_| ())
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let account = engine.account(fx.user, fx.account).await.unwrap();
    assert_eq!(account.balance, Money::new(100 * (25 * 26 / 2)).unwrap());
    let txs = engine.transactions(fx.user, fx.account, false).await.unwrap();
    assert_eq!(txs.len(), 25);
    let mut sequences: Vec<i64> = txs.iter().map(|tx| tx.sequence).collect();
    sequences.dedup();
    assert_eq!(sequences.len(), 25);
}

#[tokio::test]
async fn users_have_unique_emails_and_deleted_users_cannot_act() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;

    let duplicate = fx
        .engine
        .register_user("  ALICE@example.com ", "Alice again")
        .await
        .unwrap_err();
    assert!(matches!(duplicate, EngineError::Conflict(_)));

    let bad = fx.engine.register_user("not-an-email", "Bob").await.unwrap_err();
    assert!(bad.is_validation());

    fx.engine.delete_user(fx.user).await.unwrap();
    let posted = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("5"), now))
        .await
        .unwrap_err();
    assert!(matches!(posted, EngineError::NotFound(_)));

    // The address is free again once the holder is deleted.
    fx.engine
        .register_user("alice@example.com", "Alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn accounts_and_users_can_be_renamed() {
    let now = at(2026, 3, 15);
    let fx = fixture(now).await;
    fx.engine
        .post(PostCmd::income(fx.user, fx.account, usd("40"), now))
        .await
        .unwrap();

    let account = fx
        .engine
        .rename_account(fx.user, fx.account, "  Joint checking ")
        .await
        .unwrap();
    assert_eq!(account.name, "Joint checking");
    assert_eq!(account.balance, usd("40"));
    let blank = fx
        .engine
        .rename_account(fx.user, fx.account, "   ")
        .await
        .unwrap_err();
    assert!(blank.is_validation());
    assert_eq!(
        fx.engine.account(fx.user, fx.account).await.unwrap().name,
        "Joint checking"
    );

    let user = fx.engine.update_user(fx.user, "Alice Liddell").await.unwrap();
    assert_eq!(user.name, "Alice Liddell");
    assert_eq!(user.email, "alice@example.com");
    assert!(fx.engine.update_user(fx.user, "").await.unwrap_err().is_validation());
    assert_eq!(fx.engine.user(fx.user).await.unwrap().name, "Alice Liddell");

    fx.engine.delete_user(fx.user).await.unwrap();
    let gone = fx.engine.update_user(fx.user, "Alice").await.unwrap_err();
    assert!(matches!(gone, EngineError::NotFound(_)));
}
