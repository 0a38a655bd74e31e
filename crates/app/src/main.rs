use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use engine::{
    AccountType, AlertSettings, AnomalyWindow, BudgetPatch, BudgetPeriod, CancelFlag, Category,
    Currency, Engine, GoalCategory, LedgerStore, MemoryStore, Money, NewBudget, NewGoal, PostCmd,
    Recurrence, SqlStore, TransactionPatch, TransactionType, TransferCmd,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use settings::{Database, Settings};
use uuid::Uuid;

use crate::error::{AppError, Result};

mod error;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Personal finance ledger, budgets and spending insights")]
struct Cli {
    /// Settings file (TOML). `settings.toml` in the working directory is used
    /// when present.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Account(AccountCommand),
    #[command(subcommand)]
    Tx(TxCommand),
    #[command(subcommand)]
    Budget(BudgetCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Suggest a category for a description and signed amount.
    Categorize {
        description: String,
        #[arg(allow_hyphen_values = true)]
        amount: String,
        #[arg(long)]
        currency: Option<Currency>,
    },
    #[command(subcommand)]
    Insights(InsightsCommand),
    /// Manage the sqlite schema. Other commands migrate up on their own.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    Up,
    /// Roll back every migration.
    Down,
    /// Drop all tables and migrate up again.
    Fresh,
    Status,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Change the profile name.
    Update {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: String,
    },
    Delete {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Open {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "checking")]
        kind: AccountType,
        #[arg(long)]
        currency: Option<Currency>,
    },
    Rename {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        name: String,
    },
    Close {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
    },
    Balance {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
        /// Fold the ledger up to this instant (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    Reconcile {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
    },
    Delete {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    Post {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
        #[arg(long, default_value = "expense")]
        kind: TransactionType,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        recurrence: Option<Recurrence>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Void {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        tx: Uuid,
    },
    Amend {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        tx: Uuid,
        #[arg(long)]
        kind: Option<TransactionType>,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    Transfer {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    List {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        include_voided: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    Create {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        limit: String,
        #[arg(long, default_value = "monthly")]
        period: BudgetPeriod,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        currency: Option<Currency>,
        /// Disable the 50% alert.
        #[arg(long)]
        no_alert_50: bool,
        #[arg(long)]
        no_alert_75: bool,
        #[arg(long)]
        no_alert_90: bool,
    },
    /// Change name, limit or alert switches; re-evaluates an active budget.
    Update {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        budget: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        alert_50: Option<bool>,
        #[arg(long)]
        alert_75: Option<bool>,
        #[arg(long)]
        alert_90: Option<bool>,
    },
    Activate {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        budget: Uuid,
    },
    Deactivate {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        budget: Uuid,
    },
    Evaluate {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        budget: Uuid,
    },
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    Create {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        target: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "other")]
        category: GoalCategory,
        #[arg(long)]
        currency: Option<Currency>,
    },
    Contribute {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        goal: Uuid,
        #[arg(long)]
        amount: String,
    },
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum InsightsCommand {
    /// Scan the ledger for unusual category spend and store the findings.
    Anomalies {
        #[arg(long)]
        user: Uuid,
        /// Last day of the current period; defaults to today.
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Command::Db(command) => return manage_schema(&settings.database, command).await,
        command => command,
    };

    let engine = Engine::builder()
        .store(open_store(&settings.database).await?)
        .settings(settings.engine()?)
        .build()
        .await?;

    run(&engine, command).await
}

async fn manage_schema(config: &Database, command: DbCommand) -> Result<()> {
    let Database::Sqlite(path) = config else {
        return Err(AppError::Invalid(
            "schema commands need a sqlite database".to_string(),
        ));
    };
    let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
    match command {
        DbCommand::Up => Migrator::up(&database, None).await?,
        DbCommand::Down => Migrator::down(&database, None).await?,
        DbCommand::Fresh => Migrator::fresh(&database).await?,
        DbCommand::Status => Migrator::status(&database).await?,
    }
    tracing::info!(%path, ?command, "schema command done");
    Ok(())
}

async fn open_store(config: &Database) -> Result<Arc<dyn LedgerStore>> {
    match config {
        Database::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        Database::Sqlite(path) => {
            let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
            Migrator::up(&database, None).await?;
            tracing::info!(%path, "using sqlite store");
            Ok(Arc::new(SqlStore::new(database)))
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn account_currency(engine: &Engine, user: Uuid, account: Uuid) -> Result<Currency> {
    Ok(engine.account(user, account).await?.currency)
}

async fn run(engine: &Engine, command: Command) -> Result<()> {
    let default_currency = engine.settings().default_currency;
    match command {
        Command::User(UserCommand::Register { email, name }) => {
            print(&engine.register_user(&email, &name).await?)
        }
        Command::User(UserCommand::Update { user, name }) => {
            print(&engine.update_user(user, &name).await?)
        }
        Command::User(UserCommand::Delete { user }) => print(&engine.delete_user(user).await?),

        Command::Account(AccountCommand::Open {
            user,
            name,
            kind,
            currency,
        }) => print(&engine.open_account(user, &name, kind, currency).await?),
        Command::Account(AccountCommand::Rename {
            user,
            account,
            name,
        }) => print(&engine.rename_account(user, account, &name).await?),
        Command::Account(AccountCommand::Close { user, account }) => {
            print(&engine.close_account(user, account).await?)
        }
        Command::Account(AccountCommand::Balance { user, account, at }) => {
            let currency = account_currency(engine, user, account).await?;
            let balance = engine
                .balance_as_of(user, account, at.unwrap_or_else(Utc::now))
                .await?;
            print(&serde_json::json!({
                "account_id": account,
                "balance_minor": balance,
                "balance": balance.format(currency),
            }))
        }
        Command::Account(AccountCommand::Reconcile { user, account }) => {
            print(&engine.reconcile(user, account).await?)
        }
        Command::Account(AccountCommand::Delete { user, account }) => {
            print(&engine.delete_account(user, account).await?)
        }

        Command::Tx(TxCommand::Post {
            user,
            account,
            kind,
            amount,
            category,
            description,
            at,
            recurrence,
            tags,
        }) => {
            let currency = account_currency(engine, user, account).await?;
            let amount = Money::parse(&amount, currency)?;
            let mut cmd =
                PostCmd::new(user, account, kind, amount, at.unwrap_or_else(Utc::now)).tags(tags);
            if let Some(category) = category {
                cmd = cmd.category(category);
            }
            if let Some(description) = description {
                cmd = cmd.description(description);
            }
            if let Some(recurrence) = recurrence {
                cmd = cmd.recurrence(recurrence);
            }
            print(&engine.post(cmd).await?)
        }
        Command::Tx(TxCommand::Void { user, tx }) => print(&engine.void(user, tx).await?),
        Command::Tx(TxCommand::Amend {
            user,
            tx,
            kind,
            amount,
            category,
            description,
            at,
        }) => {
            let mut patch = TransactionPatch::new();
            if let Some(kind) = kind {
                patch = patch.transaction_type(kind);
            }
            if let Some(amount) = amount {
                let current = engine.transaction(user, tx).await?;
                patch = patch.amount(Money::parse(&amount, current.currency)?);
            }
            if let Some(category) = category {
                patch = patch.category(category);
            }
            if let Some(description) = description {
                patch = patch.description(Some(description));
            }
            if let Some(at) = at {
                patch = patch.occurred_at(at);
            }
            print(&engine.amend(user, tx, patch).await?)
        }
        Command::Tx(TxCommand::Transfer {
            user,
            from,
            to,
            amount,
            description,
            at,
        }) => {
            let currency = account_currency(engine, user, from).await?;
            let amount = Money::parse(&amount, currency)?;
            let mut cmd = TransferCmd::new(user, from, to, amount, at.unwrap_or_else(Utc::now));
            if let Some(description) = description {
                cmd = cmd.description(description);
            }
            print(&engine.transfer(cmd).await?)
        }
        Command::Tx(TxCommand::List {
            user,
            account,
            include_voided,
        }) => print(&engine.transactions(user, account, include_voided).await?),

        Command::Budget(BudgetCommand::Create {
            user,
            name,
            category,
            limit,
            period,
            start,
            end,
            currency,
            no_alert_50,
            no_alert_75,
            no_alert_90,
        }) => {
            let currency = currency.unwrap_or(default_currency);
            let limit = Money::parse(&limit, currency)?;
            let mut new = NewBudget::new(user, name, category, limit, period, start)
                .currency(currency)
                .alerts(AlertSettings {
                    at_50: !no_alert_50,
                    at_75: !no_alert_75,
                    at_90: !no_alert_90,
                });
            if let Some(end) = end {
                new = new.end_date(end);
            }
            print(&engine.create_budget(new).await?)
        }
        Command::Budget(BudgetCommand::Update {
            user,
            budget,
            name,
            limit,
            alert_50,
            alert_75,
            alert_90,
        }) => {
            let current = engine.budget(user, budget).await?;
            let mut patch = BudgetPatch::new();
            if let Some(name) = name {
                patch = patch.name(name);
            }
            if let Some(limit) = limit {
                patch = patch.limit(Money::parse(&limit, current.currency)?);
            }
            if alert_50.is_some() || alert_75.is_some() || alert_90.is_some() {
                patch = patch.alerts(AlertSettings {
                    at_50: alert_50.unwrap_or(current.alerts.at_50),
                    at_75: alert_75.unwrap_or(current.alerts.at_75),
                    at_90: alert_90.unwrap_or(current.alerts.at_90),
                });
            }
            print(&engine.update_budget(user, budget, patch).await?)
        }
        Command::Budget(BudgetCommand::Activate { user, budget }) => {
            print(&engine.activate_budget(user, budget).await?)
        }
        Command::Budget(BudgetCommand::Deactivate { user, budget }) => {
            print(&engine.deactivate_budget(user, budget).await?)
        }
        Command::Budget(BudgetCommand::Evaluate { user, budget }) => {
            print(&engine.evaluate_budget(user, budget).await?)
        }
        Command::Budget(BudgetCommand::List { user }) => print(&engine.budgets(user).await?),

        Command::Goal(GoalCommand::Create {
            user,
            title,
            description,
            target,
            date,
            category,
            currency,
        }) => {
            let currency = currency.unwrap_or(default_currency);
            let target = Money::parse(&target, currency)?;
            let mut new = NewGoal::new(user, title, target, date, category).currency(currency);
            if let Some(description) = description {
                new = new.description(description);
            }
            print(&engine.create_goal(new).await?)
        }
        Command::Goal(GoalCommand::Contribute { user, goal, amount }) => {
            let currency = engine.goal(user, goal).await?.currency;
            let amount = Money::parse(&amount, currency)?;
            print(&engine.contribute(user, goal, amount).await?)
        }
        Command::Goal(GoalCommand::List { user }) => print(&engine.goals(user).await?),

        Command::Categorize {
            description,
            amount,
            currency,
        } => {
            let amount = Money::parse(&amount, currency.unwrap_or(default_currency))?;
            print(&engine.categorize(&description, amount))
        }

        Command::Insights(InsightsCommand::Anomalies { user, until }) => {
            let window = match until {
                Some(day) => Some(AnomalyWindow::ending_on(day, &engine.settings().anomaly)?),
                None => None,
            };
            let cancel = CancelFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            print(&engine.detect_anomalies(user, window, &cancel).await?)
        }
        Command::Insights(InsightsCommand::List { user }) => print(&engine.insights(user).await?),
        Command::Db(_) => Err(AppError::Invalid(
            "schema commands run without an engine".to_string(),
        )),
    }
}
