use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::{generate_join_code, Participant, Party};
use crate::domain::repositories::{PartyRepository, RepositoryError};

/// Attempts at finding a join code not held by another active party
const MAX_CODE_ATTEMPTS: usize = 5;

/// Create party input
pub struct CreatePartyInput {
    pub host_id: String,
    pub video_ref: String,
}

/// Create party output
#[derive(Debug)]
pub struct CreatePartyOutput {
    pub party: Party,
}

type CodeSource = Box<dyn Fn() -> String + Send + Sync>;

/// Create party use case
pub struct CreateParty<P: PartyRepository> {
    party_repo: Arc<P>,
    next_code: CodeSource,
}

impl<P: PartyRepository> CreateParty<P> {
    pub fn new(party_repo: Arc<P>) -> Self {
        Self::with_code_source(party_repo, generate_join_code)
    }

    /// Draw join codes from `next_code` instead of the random generator
    pub fn with_code_source(
        party_repo: Arc<P>,
        next_code: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            party_repo,
            next_code: Box::new(next_code),
        }
    }

    pub async fn execute(
        &self,
        input: CreatePartyInput,
    ) -> Result<CreatePartyOutput, CreatePartyError> {
        let video_ref = input.video_ref.trim();
        if video_ref.is_empty() {
            return Err(CreatePartyError::Validation("videoRef is required".into()));
        }

        let mut party = None;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = Party::new(
                Uuid::new_v4().to_string(),
                (self.next_code)(),
                input.host_id.clone(),
                video_ref.to_string(),
            );
            match self.party_repo.insert(&candidate).await {
                Ok(()) => {
                    party = Some(candidate);
                    break;
                }
                Err(RepositoryError::AlreadyExists(_)) => {
                    tracing::debug!(
                        "Join code {} collided (attempt {}/{})",
                        candidate.code,
                        attempt,
                        MAX_CODE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        let party = party.ok_or(CreatePartyError::CodeExhausted)?;

        // Host is the first participant
        self.party_repo
            .insert_participant(&Participant::new(party.id.clone(), input.host_id))
            .await?;

        tracing::info!("Party {} created with code {}", party.id, party.code);

        Ok(CreatePartyOutput { party })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreatePartyError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Could not allocate a unique join code")]
    CodeExhausted,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
