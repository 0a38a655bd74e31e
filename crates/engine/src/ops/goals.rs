use uuid::Uuid;

use crate::{EngineError, Goal, Money, NewGoal, ResultEngine};

use super::Engine;

impl Engine {
    pub async fn create_goal(&self, new: NewGoal) -> ResultEngine<Goal> {
        self.require_user(new.user_id).await?;
        let goal = new.into_goal(self.settings.default_currency, self.now())?;
        self.store.save_goal(&goal).await?;
        tracing::info!(goal_id = %goal.id, user_id = %goal.user_id, target = %goal.target.format(goal.currency), "goal created");
        Ok(goal)
    }

    async fn require_goal(&self, user_id: Uuid, goal_id: Uuid) -> ResultEngine<Goal> {
        self.store
            .load_goal(goal_id)
            .await?
            .filter(|g| g.user_id == user_id && g.deleted_at.is_none())
            .ok_or_else(|| EngineError::NotFound(format!("goal {goal_id}")))
    }

    pub async fn goal(&self, user_id: Uuid, goal_id: Uuid) -> ResultEngine<Goal> {
        self.require_goal(user_id, goal_id).await
    }

    pub async fn goals(&self, user_id: Uuid) -> ResultEngine<Vec<Goal>> {
        Ok(self
            .store
            .load_goals(user_id)
            .await?
            .into_iter()
            .filter(|g| g.deleted_at.is_none())
            .collect())
    }

    pub async fn contribute(&self, user_id: Uuid, goal_id: Uuid, amount: Money) -> ResultEngine<Goal> {
        let _guard = self.goal_locks.acquire(goal_id).await?;
        let mut goal = self.require_goal(user_id, goal_id).await?;
        let was_completed = goal.is_completed();
        goal.contribute(amount)?;
        self.store.save_goal(&goal).await?;
        tracing::info!(
            %goal_id,
            amount = %amount.format(goal.currency),
            current = %goal.current.format(goal.currency),
            "goal contribution"
        );
        if goal.is_completed() && !was_completed {
            tracing::info!(%goal_id, "goal completed");
        }
        Ok(goal)
    }

    pub async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> ResultEngine<Goal> {
        let _guard = self.goal_locks.acquire(goal_id).await?;
        let mut goal = self.require_goal(user_id, goal_id).await?;
        goal.deleted_at = Some(self.now());
        self.store.save_goal(&goal).await?;
        tracing::info!(%goal_id, "goal deleted");
        Ok(goal)
    }
}
