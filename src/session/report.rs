//! Game-Over Reporting
//!
//! Hands a finished run to the persistence collaborator. Runs off the
//! tick loop; failures are logged and turned into status text, never
//! propagated.

use tracing::{info, warn};

use crate::game::tick::GameOverReport;
use crate::meta::client::MetaClient;
use crate::meta::store::MetaStore;
use crate::GAME_NAME;

/// Submit the score, then bank any essence.
///
/// Returns the messages to flash over the board, in order.
pub async fn report_game_over<S: MetaStore>(client: &MetaClient<S>, report: GameOverReport) -> Vec<String> {
    let mut messages = Vec::new();
    if client.is_guest() {
        return messages;
    }

    if let Err(e) = client.submit_score(GAME_NAME, report.final_score).await {
        warn!("Score submission failed: {}", e);
        messages.push("Score could not be saved".to_string());
    }

    if let Some(essence) = report.essence_earned {
        match client.earn(essence).await {
            Ok(meta) => {
                info!("Banked {} essence ({} total)", essence, meta.essence);
                messages.push(format!("Banked {} essence", essence));
            }
            Err(e) => {
                warn!("Essence banking failed: {}", e);
                messages.push("Essence could not be banked".to_string());
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::ContactKind;
    use crate::meta::store::InMemoryMetaStore;
    use std::sync::Arc;
    use uuid::Uuid;

    fn report(score: u32) -> GameOverReport {
        GameOverReport {
            final_score: score,
            essence_earned: GameOverReport::essence_for(score),
            contact: ContactKind::Hazard,
        }
    }

    #[tokio::test]
    async fn test_report_banks_essence() {
        let store = Arc::new(InMemoryMetaStore::new());
        let profile = Uuid::new_v4();
        let client = MetaClient::new(store.clone(), Some(profile));

        let messages = report_game_over(&client, report(64)).await;
        assert_eq!(messages, vec!["Banked 12 essence".to_string()]);
        assert_eq!(store.fetch_meta(profile).await.unwrap().essence, 12);
        assert_eq!(store.top_scores(GAME_NAME).await[0].score, 64);
    }

    #[tokio::test]
    async fn test_scoreless_run_banks_nothing() {
        let store = Arc::new(InMemoryMetaStore::new());
        let profile = Uuid::new_v4();
        let client = MetaClient::new(store.clone(), Some(profile));

        assert!(report_game_over(&client, report(0)).await.is_empty());
        assert_eq!(store.fetch_meta(profile).await.unwrap().essence, 0);
        assert_eq!(store.top_scores(GAME_NAME).await.len(), 1);
    }

    #[tokio::test]
    async fn test_outage_becomes_status_text() {
        let store = Arc::new(InMemoryMetaStore::new());
        store.set_offline(true);
        let client = MetaClient::new(store, Some(Uuid::new_v4()));

        let messages = report_game_over(&client, report(3)).await;
        assert_eq!(messages, vec![
            "Score could not be saved".to_string(),
            "Essence could not be banked".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_guest_reports_nothing() {
        let store = Arc::new(InMemoryMetaStore::new());
        let client = MetaClient::new(store.clone(), None);

        assert!(report_game_over(&client, report(50)).await.is_empty());
        assert!(store.top_scores(GAME_NAME).await.is_empty());
    }
}
