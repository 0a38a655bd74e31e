use uuid::Uuid;

use crate::{
    AnomalyScan, AnomalyWindow, CancelFlag, Categorization, EngineError, Money,
    ResultEngine, SpendingInsight,
};

use super::Engine;

impl Engine {
    /// Deterministic category suggestion for a description and signed amount.
    #[must_use]
    pub fn categorize(&self, description: &str, amount: Money) -> Categorization {
        self.categorizer.categorize(description, amount)
    }

    /// Scans the user's ledger for anomalous category spend and persists the
    /// findings in one batch. A raised `cancel` flag aborts the scan with
    /// `Cancelled` and nothing is saved.
    ///
    /// `window` defaults to the configured number of periods ending today.
    pub async fn detect_anomalies(
        &self,
        user_id: Uuid,
        window: Option<AnomalyWindow>,
        cancel: &CancelFlag,
    ) -> ResultEngine<Vec<SpendingInsight>> {
        self.require_user(user_id).await?;
        let now = self.now();
        let window = match window {
            Some(window) => window,
            None => AnomalyWindow::ending_on(now.date_naive(), &self.settings.anomaly)?,
        };

        let ledger = self.ledger_view(user_id).await?;
        let scan = AnomalyScan::new(user_id, &ledger, window, self.settings.anomaly, now)?
            .with_cancel(cancel.clone());
        let insights = match scan.collect::<ResultEngine<Vec<_>>>() {
            Ok(insights) => insights,
            Err(err @ EngineError::Cancelled(_)) => {
                tracing::warn!(%user_id, "anomaly scan cancelled, nothing saved");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if !insights.is_empty() {
            self.store.save_insights(&insights).await?;
        }
        tracing::info!(%user_id, found = insights.len(), window_end = %window.end, "anomaly scan done");
        Ok(insights)
    }

    pub async fn insights(&self, user_id: Uuid) -> ResultEngine<Vec<SpendingInsight>> {
        self.require_user(user_id).await?;
        self.store.load_insights(user_id).await
    }
}
