//! In-memory repositories for tests and ephemeral deployments

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::entities::{ChatMessage, Participant, Party, PartyStatus};
use crate::domain::repositories::{ChatRepository, PartyRepository, RepositoryError};
use crate::domain::value_objects::PlaybackState;

#[derive(Default)]
struct Tables {
    parties: HashMap<String, Party>,
    participants: Vec<Participant>,
    next_participant_id: i64,
    playback_writes: usize,
}

/// PartyRepository backed by process memory
#[derive(Default)]
pub struct InMemoryPartyRepository {
    tables: RwLock<Tables>,
}

impl InMemoryPartyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `update_playback` calls
    pub fn playback_writes(&self) -> usize {
        self.tables.read().playback_writes
    }
}

#[async_trait]
impl PartyRepository for InMemoryPartyRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Party>, RepositoryError> {
        Ok(self.tables.read().parties.get(id).cloned())
    }

    async fn find_active_by_code(&self, code: &str) -> Result<Option<Party>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .parties
            .values()
            .find(|p| p.code == code && p.status == PartyStatus::Active)
            .cloned())
    }

    async fn insert(&self, party: &Party) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let code_taken = tables
            .parties
            .values()
            .any(|p| p.code == party.code && p.status == PartyStatus::Active);
        if code_taken || tables.parties.contains_key(&party.id) {
            return Err(RepositoryError::AlreadyExists(format!("party code {}", party.code)));
        }
        tables.parties.insert(party.id.clone(), party.clone());
        Ok(())
    }

    async fn update_playback(
        &self,
        party_id: &str,
        playback: &PlaybackState,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        let updated = match tables.parties.get_mut(party_id) {
            Some(party) if party.is_active() => {
                party.playback_position = playback.position;
                party.is_playing = playback.is_playing;
                party.playback_updated_at = playback.updated_at;
                true
            }
            _ => false,
        };
        if updated {
            tables.playback_writes += 1;
        }
        Ok(updated)
    }

    async fn end_party(&self, party_id: &str, ended_at: i64) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        match tables.parties.get_mut(party_id) {
            Some(party) if party.is_active() => {
                party.status = PartyStatus::Ended;
                party.is_playing = false;
                party.ended_at = Some(ended_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_participant(
        &self,
        party_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .participants
            .iter()
            .find(|p| p.party_id == party_id && p.user_id == user_id)
            .cloned())
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        if tables
            .participants
            .iter()
            .any(|p| p.party_id == participant.party_id && p.user_id == participant.user_id)
        {
            return Err(RepositoryError::AlreadyExists(format!(
                "participant {} in {}",
                participant.user_id, participant.party_id
            )));
        }
        tables.next_participant_id += 1;
        let mut row = participant.clone();
        row.id = tables.next_participant_id;
        tables.participants.push(row);
        Ok(())
    }

    async fn rejoin_participant(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        match tables
            .participants
            .iter_mut()
            .find(|p| p.party_id == party_id && p.user_id == user_id && p.left_at.is_some())
        {
            Some(p) => {
                p.left_at = None;
                p.last_ping_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_left(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        match tables
            .participants
            .iter_mut()
            .find(|p| p.party_id == party_id && p.user_id == user_id && p.left_at.is_none())
        {
            Some(p) => {
                p.left_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_ping(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        match tables
            .participants
            .iter_mut()
            .find(|p| p.party_id == party_id && p.user_id == user_id && p.left_at.is_none())
        {
            Some(p) => {
                p.last_ping_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_participants(&self, party_id: &str) -> Result<Vec<Participant>, RepositoryError> {
        let mut rows: Vec<Participant> = self
            .tables
            .read()
            .participants
            .iter()
            .filter(|p| p.party_id == party_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.joined_at, p.id));
        Ok(rows)
    }

    async fn reap_stale_participants(
        &self,
        cutoff: i64,
        now: i64,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let mut tables = self.tables.write();
        let Tables {
            parties,
            participants,
            ..
        } = &mut *tables;

        let mut reaped = Vec::new();
        for p in participants.iter_mut() {
            let party_active = parties.get(&p.party_id).is_some_and(|party| party.is_active());
            if party_active && p.left_at.is_none() && p.last_ping_at < cutoff {
                p.left_at = Some(now);
                reaped.push(p.clone());
            }
        }
        Ok(reaped)
    }
}

/// ChatRepository backed by process memory
#[derive(Default)]
pub struct InMemoryChatRepository {
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut messages = self.messages.write();
        let stored = ChatMessage {
            id: messages.len() as i64 + 1,
            ..message.clone()
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_recent(
        &self,
        party_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages.read();
        let mut recent: Vec<ChatMessage> = messages
            .iter()
            .rev()
            .filter(|m| m.party_id == party_id)
            .take(limit as usize)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}
