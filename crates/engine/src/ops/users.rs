use uuid::Uuid;

use crate::{EngineError, ResultEngine, User};

use super::Engine;

impl Engine {
    /// Registers a user. The e-mail must be unique among users not deleted.
    pub async fn register_user(&self, email: &str, name: &str) -> ResultEngine<User> {
        let user = User::new(email, name, self.now())?;

        let _guard = self.registration.lock().await;
        if self.store.find_user_by_email(&user.email).await?.is_some() {
            return Err(EngineError::Conflict(user.email));
        }
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        self.require_user(user_id).await
    }

    /// Updates the profile name. The e-mail is the identity and stays fixed.
    pub async fn update_user(&self, user_id: Uuid, name: &str) -> ResultEngine<User> {
        let _guard = self.registration.lock().await;
        let mut user = self.require_user(user_id).await?;
        user.rename(name)?;
        self.store.save_user(&user).await?;
        tracing::info!(%user_id, name = %user.name, "user updated");
        Ok(user)
    }

    /// Tombstones the user. Its data is retained but it can no longer act.
    pub async fn delete_user(&self, user_id: Uuid) -> ResultEngine<User> {
        let _guard = self.registration.lock().await;
        let mut user = self.require_user(user_id).await?;
        user.deleted_at = Some(self.now());
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %user.id, "user deleted");
        Ok(user)
    }
}
