use std::sync::Arc;

use crate::domain::entities::PartyStatus;
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::{PartyEvent, PlaybackState};
use crate::infrastructure::services::{PartyBroker, PlaybackReplicator};

/// End party input
pub struct EndPartyInput {
    pub user_id: String,
    pub party_id: String,
}

/// End party output
#[derive(Debug)]
pub struct EndPartyOutput {
    pub ended_at: i64,
    /// Final snapshot carried by the terminal event
    pub playback: PlaybackState,
}

/// End party use case
pub struct EndParty<P: PartyRepository + 'static> {
    party_repo: Arc<P>,
    replicator: Arc<PlaybackReplicator<P>>,
    broker: Arc<PartyBroker>,
}

impl<P: PartyRepository + 'static> EndParty<P> {
    pub fn new(
        party_repo: Arc<P>,
        replicator: Arc<PlaybackReplicator<P>>,
        broker: Arc<PartyBroker>,
    ) -> Self {
        Self {
            party_repo,
            replicator,
            broker,
        }
    }

    pub async fn execute(&self, input: EndPartyInput) -> Result<EndPartyOutput, EndPartyError> {
        let party = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .ok_or(EndPartyError::PartyNotFound)?;

        if !party.is_host(&input.user_id) {
            return Err(EndPartyError::Forbidden);
        }
        if !party.is_active() {
            return Err(EndPartyError::PartyEnded);
        }

        let ended_at = chrono::Utc::now().timestamp_millis();
        if !self.party_repo.end_party(&input.party_id, ended_at).await? {
            // Another request ended it first
            return Err(EndPartyError::PartyEnded);
        }

        // No writes after this point
        self.replicator.close(&input.party_id).await;

        // Re-read: a throttled write may have committed since the first read
        let last = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .map(|p| p.playback())
            .unwrap_or_else(|| party.playback());
        let playback = PlaybackState::new(
            last.position,
            false,
            ended_at.max(last.updated_at + 1),
        );
        let delivered = self.broker.publish(PartyEvent::PartyUpdated {
            party_id: input.party_id.clone(),
            status: PartyStatus::Ended,
            playback,
        });
        self.broker.close(&input.party_id);

        tracing::info!(
            "Party {} ended by host ({} subscribers notified)",
            input.party_id,
            delivered
        );

        Ok(EndPartyOutput { ended_at, playback })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EndPartyError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Only the host can end the party")]
    Forbidden,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::entities::{Participant, Party};
    use crate::infrastructure::database::repositories::InMemoryPartyRepository;
    use crate::infrastructure::services::PlaybackError;

    async fn setup() -> (
        Arc<InMemoryPartyRepository>,
        Arc<PartyBroker>,
        Arc<PlaybackReplicator<InMemoryPartyRepository>>,
        EndParty<InMemoryPartyRepository>,
    ) {
        let repo = Arc::new(InMemoryPartyRepository::new());
        let party = Party::new("party".into(), "ABC234".into(), "host".into(), "video".into());
        repo.insert(&party).await.unwrap();
        repo.insert_participant(&Participant::new("party".into(), "host".into()))
            .await
            .unwrap();
        let broker = Arc::new(PartyBroker::new(16));
        let replicator = Arc::new(PlaybackReplicator::new(
            repo.clone(),
            broker.clone(),
            Duration::from_millis(1000),
        ));
        let use_case = EndParty::new(repo.clone(), replicator.clone(), broker.clone());
        (repo, broker, replicator, use_case)
    }

    fn input(user_id: &str) -> EndPartyInput {
        EndPartyInput {
            user_id: user_id.into(),
            party_id: "party".into(),
        }
    }

    #[tokio::test]
    async fn test_guest_cannot_end() {
        let (repo, _broker, _replicator, use_case) = setup().await;
        let err = use_case.execute(input("guest")).await.unwrap_err();
        assert!(matches!(err, EndPartyError::Forbidden));
        assert!(repo.find_by_id("party").await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_end_publishes_terminal_event_and_closes_channel() {
        let (repo, broker, replicator, use_case) = setup().await;
        replicator.sync_all("party", "host", 42.3, true).await.unwrap();
        let mut rx = broker.subscribe("party");

        let output = use_case.execute(input("host")).await.unwrap();
        assert!(!output.playback.is_playing);
        assert_eq!(output.playback.position, 42.3);

        let event = rx.recv().await.unwrap();
        assert!(event.is_terminal());
        assert!(rx.recv().await.is_err());

        let party = repo.find_by_id("party").await.unwrap().unwrap();
        assert_eq!(party.status, PartyStatus::Ended);
        assert_eq!(party.ended_at, Some(output.ended_at));

        let err = replicator.sync_all("party", "host", 1.0, true).await.unwrap_err();
        assert!(matches!(err, PlaybackError::PartyEnded));

        // A subscriber arriving late never gets a live channel
        let mut late = broker.subscribe("party");
        assert!(late.recv().await.is_err());
        assert_eq!(broker.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_end_twice() {
        let (_repo, _broker, _replicator, use_case) = setup().await;
        use_case.execute(input("host")).await.unwrap();
        let err = use_case.execute(input("host")).await.unwrap_err();
        assert!(matches!(err, EndPartyError::PartyEnded));
    }
}
