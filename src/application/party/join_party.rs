use std::sync::Arc;

use crate::domain::entities::{normalize_join_code, Participant, Party};
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::{ParticipantAction, PartyEvent, PlaybackState};
use crate::infrastructure::services::PartyBroker;

/// Join party input
pub struct JoinPartyInput {
    pub user_id: String,
    pub code: String,
}

/// How the caller's participant row was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New participant row
    Joined,
    /// Left row flipped back to present
    Rejoined,
    /// Caller was already present; nothing changed
    AlreadyJoined,
}

/// Join party output
#[derive(Debug)]
pub struct JoinPartyOutput {
    pub party: Party,
    pub playback: PlaybackState,
    pub is_host: bool,
    pub outcome: JoinOutcome,
}

/// Join party use case
pub struct JoinParty<P: PartyRepository> {
    party_repo: Arc<P>,
    broker: Arc<PartyBroker>,
}

impl<P: PartyRepository> JoinParty<P> {
    pub fn new(party_repo: Arc<P>, broker: Arc<PartyBroker>) -> Self {
        Self { party_repo, broker }
    }

    pub async fn execute(&self, input: JoinPartyInput) -> Result<JoinPartyOutput, JoinPartyError> {
        // Malformed codes cannot match anything
        let code = normalize_join_code(&input.code).ok_or(JoinPartyError::PartyNotFound)?;

        // Ended parties are invisible here
        let party = self
            .party_repo
            .find_active_by_code(&code)
            .await?
            .ok_or(JoinPartyError::PartyNotFound)?;

        let now = chrono::Utc::now().timestamp_millis();
        let outcome = match self
            .party_repo
            .find_participant(&party.id, &input.user_id)
            .await?
        {
            Some(existing) if existing.is_present() => {
                self.party_repo
                    .touch_ping(&party.id, &input.user_id, now)
                    .await?;
                JoinOutcome::AlreadyJoined
            }
            Some(_) => {
                if self
                    .party_repo
                    .rejoin_participant(&party.id, &input.user_id, now)
                    .await?
                {
                    JoinOutcome::Rejoined
                } else {
                    // A concurrent join already flipped the row
                    JoinOutcome::AlreadyJoined
                }
            }
            None => {
                let participant = Participant::new(party.id.clone(), input.user_id.clone());
                match self.party_repo.insert_participant(&participant).await {
                    Ok(()) => JoinOutcome::Joined,
                    // Lost a race with a concurrent join by the same user
                    Err(RepositoryError::AlreadyExists(_)) => JoinOutcome::AlreadyJoined,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let action = match outcome {
            JoinOutcome::Joined => Some(ParticipantAction::Joined),
            JoinOutcome::Rejoined => Some(ParticipantAction::Rejoined),
            JoinOutcome::AlreadyJoined => None,
        };
        if let Some(action) = action {
            tracing::info!("User {} {:?} party {}", input.user_id, action, party.id);
            self.broker.publish(PartyEvent::ParticipantsChanged {
                party_id: party.id.clone(),
                user_id: input.user_id.clone(),
                action,
            });
        }

        let is_host = party.is_host(&input.user_id);
        let playback = party.playback();
        Ok(JoinPartyOutput {
            party,
            playback,
            is_host,
            outcome,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JoinPartyError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::repositories::InMemoryPartyRepository;

    async fn setup() -> (Arc<InMemoryPartyRepository>, Arc<PartyBroker>, JoinParty<InMemoryPartyRepository>) {
        let repo = Arc::new(InMemoryPartyRepository::new());
        let party = Party::new("party".into(), "ABC234".into(), "host".into(), "video".into());
        repo.insert(&party).await.unwrap();
        let broker = Arc::new(PartyBroker::new(16));
        let use_case = JoinParty::new(repo.clone(), broker.clone());
        (repo, broker, use_case)
    }

    fn input(code: &str) -> JoinPartyInput {
        JoinPartyInput {
            user_id: "guest".into(),
            code: code.into(),
        }
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let (repo, _broker, use_case) = setup().await;

        let first = use_case.execute(input("ABC234")).await.unwrap();
        assert_eq!(first.outcome, JoinOutcome::Joined);
        assert!(!first.is_host);
        assert!(!first.playback.is_playing);

        let second = use_case.execute(input("abc-234")).await.unwrap();
        assert_eq!(second.outcome, JoinOutcome::AlreadyJoined);
        assert_eq!(second.party.id, first.party.id);

        let rows = repo.list_participants("party").await.unwrap();
        assert_eq!(rows.iter().filter(|p| p.user_id == "guest").count(), 1);
    }

    #[tokio::test]
    async fn test_rejoin_reuses_row() {
        let (repo, broker, use_case) = setup().await;
        use_case.execute(input("ABC234")).await.unwrap();
        let before = repo.find_participant("party", "guest").await.unwrap().unwrap();
        repo.mark_left("party", "guest", 1).await.unwrap();

        let mut rx = broker.subscribe("party");
        let output = use_case.execute(input("ABC234")).await.unwrap();
        assert_eq!(output.outcome, JoinOutcome::Rejoined);

        let rows = repo.list_participants("party").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, before.id);
        assert!(rows[0].left_at.is_none());

        assert!(matches!(
            rx.try_recv().unwrap(),
            PartyEvent::ParticipantsChanged {
                action: ParticipantAction::Rejoined,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_ended_and_malformed_codes_are_not_found() {
        let (repo, _broker, use_case) = setup().await;

        for code in ["ZZZZZZ", "ABC23", "ABC2340", "ABC23O"] {
            let err = use_case.execute(input(code)).await.unwrap_err();
            assert!(matches!(err, JoinPartyError::PartyNotFound), "{code}");
        }

        repo.end_party("party", 1).await.unwrap();
        let err = use_case.execute(input("ABC234")).await.unwrap_err();
        assert!(matches!(err, JoinPartyError::PartyNotFound));
    }
}
