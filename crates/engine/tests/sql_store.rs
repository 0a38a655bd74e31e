use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use engine::{
    AccountType, BudgetPeriod, BudgetState, CancelFlag, Category, Currency, Engine, GoalCategory,
    LedgerStore, Money, NewBudget, NewGoal, PostCmd, Recurrence, SqlStore, TransactionPatch,
    TransferCmd,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

mod common;

use common::{at, fixture_with_store, ledger_sum, usd};

async fn sql_store() -> (Arc<dyn LedgerStore>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (Arc::new(SqlStore::new(db.clone())), db)
}

#[tokio::test]
async fn ledger_round_trips_through_sqlite() {
    let now = at(2026, 10, 16);
    let (store, _db) = sql_store().await;
    let fx = fixture_with_store(store.clone(), now).await;

    let posted = fx
        .engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd("54.23"), now - Duration::days(2))
                .description("Whole Foods Market")
                .recurrence(Recurrence::Weekly)
                .tags(["groceries", "Family"]),
        )
        .await
        .unwrap();
    let id = posted.transaction().unwrap().id;
    fx.engine
        .amend(fx.user, id, TransactionPatch::new().amount(usd("60")))
        .await
        .unwrap();

    let read = fx.engine.transaction(fx.user, id).await.unwrap();
    assert_eq!(read.category, Category::Food);
    assert_eq!(read.recurrence, Some(Recurrence::Weekly));
    assert_eq!(read.tags, vec!["family".to_string(), "groceries".to_string()]);
    assert_eq!(read.revision, 1);
    assert_eq!(read.history.len(), 1);
    assert_eq!(read.history[0].amount, usd("54.23"));
    assert_eq!(read.amount, usd("60"));

    let savings = fx
        .engine
        .open_account(fx.user, "Savings", AccountType::Savings, Some(Currency::Usd))
        .await
        .unwrap();
    fx.engine
        .post(PostCmd::income(fx.user, fx.account, usd("1000"), now).category(Category::Salary))
        .await
        .unwrap();
    let moved = fx
        .engine
        .transfer(TransferCmd::new(fx.user, fx.account, savings.id, usd("250"), now))
        .await
        .unwrap();
    fx.engine
        .void(fx.user, moved.transactions[1].id)
        .await
        .unwrap();

    let checking = fx.engine.account(fx.user, fx.account).await.unwrap();
    assert_eq!(checking.balance, usd("940"));
    assert_eq!(checking.balance, ledger_sum(&fx, fx.account).await);
    assert_eq!(
        fx.engine.account(fx.user, savings.id).await.unwrap().balance,
        Money::ZERO
    );
    let audit = fx.engine.transactions(fx.user, fx.account, true).await.unwrap();
    assert_eq!(audit.len(), 3);
    assert!(audit.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
}

#[tokio::test]
async fn a_rebuilt_engine_continues_the_sequence() {
    let now = at(2026, 10, 16);
    let (store, _db) = sql_store().await;
    let fx = fixture_with_store(store.clone(), now).await;
    let first = fx
        .engine
        .post(PostCmd::income(fx.user, fx.account, usd("10"), now))
        .await
        .unwrap();
    let before = first.transaction().unwrap().sequence;

    let engine = Engine::builder()
        .store(store)
        .clock(fx.clock.clone())
        .build()
        .await
        .unwrap();
    let second = engine
        .post(PostCmd::income(fx.user, fx.account, usd("10"), now))
        .await
        .unwrap();
    assert!(second.transaction().unwrap().sequence > before);
    assert_eq!(
        engine.account(fx.user, fx.account).await.unwrap().balance,
        usd("20")
    );
}

#[tokio::test]
async fn budgets_goals_and_insights_persist() {
    let now = at(2026, 10, 16);
    let (store, _db) = sql_store().await;
    let fx = fixture_with_store(store, now).await;

    let budget = fx
        .engine
        .create_budget(
            NewBudget::new(
                fx.user,
                "Groceries",
                Category::Food,
                usd("100"),
                BudgetPeriod::Monthly,
                NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            )
            .end_date(NaiveDate::from_ymd_opt(2027, 10, 1).unwrap()),
        )
        .await
        .unwrap();
    let posted = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("80"), now).category(Category::Food))
        .await
        .unwrap();
    assert_eq!(posted.alerts.len(), 2);

    let stored = fx.engine.budget(fx.user, budget.id).await.unwrap();
    let alert_state = stored.alert_state.unwrap();
    assert_eq!(alert_state.highest, BudgetState::Threshold75);
    assert_eq!(alert_state.window_start, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
    assert_eq!(stored.end_date, budget.end_date);

    let again = fx
        .engine
        .post(PostCmd::expense(fx.user, fx.account, usd("1"), now).category(Category::Food))
        .await
        .unwrap();
    assert!(again.alerts.is_empty());

    let goal = fx
        .engine
        .create_goal(
            NewGoal::new(
                fx.user,
                "Trip",
                usd("300"),
                NaiveDate::from_ymd_opt(2027, 5, 1).unwrap(),
                GoalCategory::Vacation,
            )
            .currency(Currency::Usd)
            .description("Lisbon in May"),
        )
        .await
        .unwrap();
    fx.engine.contribute(fx.user, goal.id, usd("120")).await.unwrap();
    let goals = fx.engine.goals(fx.user).await.unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].current, usd("120"));
    assert_eq!(goals[0].category, GoalCategory::Vacation);
    assert_eq!(goals[0].description.as_deref(), Some("Lisbon in May"));

    for week in 1..=8 {
        fx.engine
            .post(
                PostCmd::expense(
                    fx.user,
                    fx.account,
                    usd("15"),
                    now - Duration::days(7 * week + 3),
                )
                .category(Category::Transport),
            )
            .await
            .unwrap();
    }
    fx.engine
        .post(
            PostCmd::expense(fx.user, fx.account, usd("150"), now - Duration::days(1))
                .category(Category::Transport),
        )
        .await
        .unwrap();

    let found = fx
        .engine
        .detect_anomalies(fx.user, None, &CancelFlag::new())
        .await
        .unwrap();
    let transport: Vec<_> = found
        .iter()
        .filter(|i| i.category == Some(Category::Transport))
        .collect();
    assert_eq!(transport.len(), 1);

    let persisted = fx.engine.insights(fx.user).await.unwrap();
    assert_eq!(persisted.len(), found.len());
    let reloaded = persisted
        .iter()
        .find(|i| i.id == transport[0].id)
        .unwrap();
    assert_eq!(reloaded.data, transport[0].data);
    assert_eq!(reloaded.insight_type, transport[0].insight_type);
}
