use chrono::NaiveDate;
use engine::{
    AccountType, AlertSettings, Budget, BudgetAlert, BudgetPatch, BudgetPeriod, BudgetState,
    Category, Clock, Currency, EngineError, GoalCategory, Money, MutationOutcome,
    NewBudget, NewGoal, PostCmd, TransactionPatch,
};

mod common;

use common::{Fixture, at, fixture, usd};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn kinds(alerts: &[BudgetAlert]) -> Vec<BudgetState> {
    alerts.iter().map(|a| a.kind).collect()
}

/// Posts an expense dated at the fixture's current time.
async fn spend(fx: &Fixture, amount: &str, category: Category) -> MutationOutcome {
    fx.engine
        .post(PostCmd::expense(fx.user, fx.account, usd(amount), fx.clock.now()).category(category))
        .await
        .unwrap()
}

async fn food_budget(fx: &Fixture, start: NaiveDate) -> Budget {
    fx.engine
        .create_budget(NewBudget::new(
            fx.user,
            "Groceries",
            Category::Food,
            usd("100"),
            BudgetPeriod::Monthly,
            start,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn threshold_alerts_fire_once_per_upward_crossing() {
    let fx = fixture(at(2026, 10, 16)).await;
    let budget = food_budget(&fx, date(2026, 10, 1)).await;

    let first = spend(&fx, "51", Category::Food).await;
    assert_eq!(kinds(&first.alerts), vec![BudgetState::Threshold50]);
    assert_eq!(first.alerts[0].budget_id, budget.id);
    assert_eq!(first.alerts[0].spent, usd("51"));

    let second = spend(&fx, "44", Category::Food).await;
    assert_eq!(
        kinds(&second.alerts),
        vec![BudgetState::Threshold75, BudgetState::Threshold90]
    );

    let third = spend(&fx, "1", Category::Food).await;
    assert!(third.alerts.is_empty());

    // Other categories never touch the budget.
    let unrelated = spend(&fx, "500", Category::Shopping).await;
    assert!(unrelated.alerts.is_empty());

    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.state, BudgetState::Threshold90);
    assert_eq!(status.spent, usd("96"));
    assert_eq!(status.remaining, usd("4"));
    assert_eq!(status.ratio_bps, 9_600);
    assert!(status.alerts.is_empty());
}

#[tokio::test]
async fn dropping_a_band_is_silent_and_exceeded_still_fires() {
    let fx = fixture(at(2026, 10, 16)).await;
    let budget = food_budget(&fx, date(2026, 10, 1)).await;

    spend(&fx, "51", Category::Food).await;
    let big = spend(&fx, "44", Category::Food).await;
    let big_id = big.transaction().unwrap().id;

    let voided = fx.engine.void(fx.user, big_id).await.unwrap();
    assert!(voided.alerts.is_empty());
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.state, BudgetState::Threshold50);

    // Back above 90% in the same window: already alerted, nothing new.
    let back = spend(&fx, "45", Category::Food).await;
    assert!(back.alerts.is_empty());

    let over = spend(&fx, "10", Category::Food).await;
    assert_eq!(kinds(&over.alerts), vec![BudgetState::Exceeded]);
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.remaining, usd("-6"));
}

#[tokio::test]
async fn amend_reevaluates_old_and_new_category() {
    let fx = fixture(at(2026, 10, 16)).await;
    food_budget(&fx, date(2026, 10, 1)).await;

    let posted = spend(&fx, "20", Category::Shopping).await;
    assert!(posted.alerts.is_empty());

    let moved = fx
        .engine
        .amend(
            fx.user,
            posted.transaction().unwrap().id,
            TransactionPatch::new()
                .category(Category::Food)
                .amount(usd("80")),
        )
        .await
        .unwrap();
    assert_eq!(
        kinds(&moved.alerts),
        vec![BudgetState::Threshold50, BudgetState::Threshold75]
    );
}

#[tokio::test]
async fn deleted_account_spend_leaves_budgets() {
    let fx = fixture(at(2026, 10, 16)).await;
    let budget = food_budget(&fx, date(2026, 10, 1)).await;
    let cash = fx
        .engine
        .open_account(fx.user, "Cash", AccountType::Cash, Some(Currency::Usd))
        .await
        .unwrap();

    let posted = fx
        .engine
        .post(
            PostCmd::expense(fx.user, cash.id, usd("80"), fx.clock.now())
                .category(Category::Food),
        )
        .await
        .unwrap();
    assert_eq!(
        kinds(&posted.alerts),
        vec![BudgetState::Threshold50, BudgetState::Threshold75]
    );
    let ninety = spend(&fx, "10", Category::Food).await;
    assert_eq!(kinds(&ninety.alerts), vec![BudgetState::Threshold90]);

    fx.engine.delete_account(fx.user, cash.id).await.unwrap();
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.spent, usd("10"));
    assert_eq!(status.state, BudgetState::Active);
    assert!(status.alerts.is_empty());

    // 90% was already alerted in this window: climbing back to it is silent.
    assert!(spend(&fx, "70", Category::Food).await.alerts.is_empty());
    let over = spend(&fx, "25", Category::Food).await;
    assert_eq!(kinds(&over.alerts), vec![BudgetState::Exceeded]);
}

#[tokio::test]
async fn monthly_rollover_from_january_31_resets_alerts() {
    let fx = fixture(at(2026, 2, 10)).await;
    let budget = food_budget(&fx, date(2026, 1, 31)).await;

    let jan = spend(&fx, "60", Category::Food).await;
    assert_eq!(kinds(&jan.alerts), vec![BudgetState::Threshold50]);
    assert_eq!(jan.alerts[0].window.start, date(2026, 1, 31));
    assert_eq!(jan.alerts[0].window.end, date(2026, 2, 28));

    fx.clock.set(at(2026, 3, 1));
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.window.start, date(2026, 2, 28));
    assert_eq!(status.window.end, date(2026, 3, 31));
    assert_eq!(status.spent, Money::ZERO);
    assert_eq!(status.state, BudgetState::Active);

    let feb = spend(&fx, "60", Category::Food).await;
    assert_eq!(kinds(&feb.alerts), vec![BudgetState::Threshold50]);
    assert_eq!(feb.alerts[0].window.start, date(2026, 2, 28));
}

#[tokio::test]
async fn leap_year_rollover_lands_on_february_29() {
    let fx = fixture(at(2028, 2, 29)).await;
    let budget = food_budget(&fx, date(2028, 1, 31)).await;
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.window.start, date(2028, 2, 29));
    assert_eq!(status.window.end, date(2028, 3, 31));
}

#[tokio::test]
async fn disabled_thresholds_and_inactive_budgets() {
    let fx = fixture(at(2026, 10, 16)).await;
    let quiet = fx
        .engine
        .create_budget(
            NewBudget::new(
                fx.user,
                "Fun",
                Category::Entertainment,
                usd("100"),
                BudgetPeriod::Weekly,
                date(2026, 10, 12),
            )
            .alerts(AlertSettings {
                at_50: false,
                at_75: false,
                at_90: true,
            }),
        )
        .await
        .unwrap();

    let posted = spend(&fx, "95", Category::Entertainment).await;
    assert_eq!(kinds(&posted.alerts), vec![BudgetState::Threshold90]);

    fx.engine.deactivate_budget(fx.user, quiet.id).await.unwrap();
    let after = spend(&fx, "50", Category::Entertainment).await;
    assert!(after.alerts.is_empty());
    assert!(
        fx.engine
            .evaluate_budget(fx.user, quiet.id)
            .await
            .unwrap_err()
            .is_validation()
    );

    fx.engine.delete_budget(fx.user, quiet.id).await.unwrap();
    assert!(fx.engine.budgets(fx.user).await.unwrap().is_empty());
    assert!(matches!(
        fx.engine.budget(fx.user, quiet.id).await.unwrap_err(),
        EngineError::NotFound(_)
    ));
}

#[tokio::test]
async fn updates_reevaluate_and_keep_alerted_bands() {
    let fx = fixture(at(2026, 10, 16)).await;
    let budget = food_budget(&fx, date(2026, 10, 1)).await;
    spend(&fx, "60", Category::Food).await;

    let raised = fx
        .engine
        .update_budget(fx.user, budget.id, BudgetPatch::new().limit(usd("200")))
        .await
        .unwrap();
    assert_eq!(raised.budget.limit, usd("200"));
    let status = raised.status.unwrap();
    assert_eq!(status.state, BudgetState::Active);
    assert!(status.alerts.is_empty());

    // 60% of the raised limit: 50% was alerted before the update.
    assert!(spend(&fx, "60", Category::Food).await.alerts.is_empty());

    let lowered = fx
        .engine
        .update_budget(fx.user, budget.id, BudgetPatch::new().limit(usd("125")))
        .await
        .unwrap();
    assert_eq!(
        kinds(&lowered.status.unwrap().alerts),
        vec![BudgetState::Threshold75, BudgetState::Threshold90]
    );
    let over = fx
        .engine
        .update_budget(fx.user, budget.id, BudgetPatch::new().limit(usd("100")))
        .await
        .unwrap();
    assert_eq!(kinds(&over.status.unwrap().alerts), vec![BudgetState::Exceeded]);

    let renamed = fx
        .engine
        .update_budget(fx.user, budget.id, BudgetPatch::new().name("  Food  "))
        .await
        .unwrap();
    assert_eq!(renamed.budget.name, "Food");
    let status = renamed.status.unwrap();
    assert_eq!(status.state, BudgetState::Exceeded);
    assert!(status.alerts.is_empty());

    for patch in [
        BudgetPatch::new(),
        BudgetPatch::new().limit(Money::ZERO),
        BudgetPatch::new().name("Food").limit(usd("-1")),
        BudgetPatch::new().name(" "),
    ] {
        assert!(
            fx.engine
                .update_budget(fx.user, budget.id, patch)
                .await
                .unwrap_err()
                .is_validation()
        );
    }
    let stored = fx.engine.budget(fx.user, budget.id).await.unwrap();
    assert_eq!(stored.name, "Food");
    assert_eq!(stored.limit, usd("100"));
}

#[tokio::test]
async fn inactive_budgets_update_quietly_until_activated() {
    let fx = fixture(at(2026, 10, 16)).await;
    let budget = food_budget(&fx, date(2026, 10, 1)).await;
    fx.engine.deactivate_budget(fx.user, budget.id).await.unwrap();
    assert!(spend(&fx, "80", Category::Food).await.alerts.is_empty());

    let updated = fx
        .engine
        .update_budget(fx.user, budget.id, BudgetPatch::new().limit(usd("90")))
        .await
        .unwrap();
    assert!(!updated.budget.active);
    assert_eq!(updated.status, None);

    let active = fx.engine.activate_budget(fx.user, budget.id).await.unwrap();
    assert!(active.active);
    let status = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert_eq!(status.spent, usd("80"));
    assert_eq!(
        kinds(&status.alerts),
        vec![BudgetState::Threshold50, BudgetState::Threshold75]
    );
    let again = fx.engine.evaluate_budget(fx.user, budget.id).await.unwrap();
    assert!(again.alerts.is_empty());
}

#[tokio::test]
async fn budget_validation() {
    let fx = fixture(at(2026, 10, 16)).await;
    let income = fx
        .engine
        .create_budget(NewBudget::new(
            fx.user,
            "Pay",
            Category::Salary,
            usd("100"),
            BudgetPeriod::Monthly,
            date(2026, 10, 1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(income, EngineError::InvalidCategory(_)));

    let backwards = fx
        .engine
        .create_budget(
            NewBudget::new(
                fx.user,
                "Food",
                Category::Food,
                usd("100"),
                BudgetPeriod::Monthly,
                date(2026, 10, 1),
            )
            .end_date(date(2026, 9, 1)),
        )
        .await
        .unwrap_err();
    assert!(backwards.is_validation());

    let stranger = fx
        .engine
        .create_budget(NewBudget::new(
            uuid::Uuid::new_v4(),
            "Food",
            Category::Food,
            usd("100"),
            BudgetPeriod::Monthly,
            date(2026, 10, 1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(stranger, EngineError::NotFound(_)));
}

#[tokio::test]
async fn goals_track_contributions() {
    let fx = fixture(at(2026, 10, 16)).await;
    let goal = fx
        .engine
        .create_goal(NewGoal::new(
            fx.user,
            "Rainy day",
            usd("1000"),
            date(2027, 6, 1),
            GoalCategory::EmergencyFund,
        ))
        .await
        .unwrap();
    assert!(!goal.is_completed());

    let half = fx.engine.contribute(fx.user, goal.id, usd("500")).await.unwrap();
    assert_eq!(half.progress_bps(), 5_000);

    let done = fx.engine.contribute(fx.user, goal.id, usd("600")).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.progress_bps(), 10_000);

    let zero = fx
        .engine
        .contribute(fx.user, goal.id, Money::ZERO)
        .await
        .unwrap_err();
    assert!(zero.is_validation());

    assert_eq!(fx.engine.goals(fx.user).await.unwrap().len(), 1);
    fx.engine.delete_goal(fx.user, goal.id).await.unwrap();
    assert!(fx.engine.goals(fx.user).await.unwrap().is_empty());
}
