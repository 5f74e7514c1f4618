//! Test doubles for the engine's collaborators.
//!
//! - [`ScriptedClient`] answers chat requests from a script and records them
//! - [`FailingStore`] fails every lookup, for exercising degraded paths

use crate::pack::{CustomVariable, PackTemplate};
use crate::store::{StoreError, StoryStore};
use crate::story::{Character, Location, Story};
use async_trait::async_trait;
use oracle::{ChatClient, ChatRequest, ChatResponse, Error};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One scripted outcome of a chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Reply with this content.
    Reply(String),
    /// Fail as if the connection dropped.
    NetworkError(String),
    /// Fail with an HTTP status.
    ApiError(u16),
}

impl Scripted {
    pub fn reply(content: impl Into<String>) -> Self {
        Scripted::Reply(content.into())
    }
}

/// A chat client that returns scripted outcomes in order.
///
/// Once the script is exhausted every request fails with a network error.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedClient {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client replying with each text in turn.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(Scripted::reply).collect())
    }

    /// Queue another outcome.
    pub fn push(&self, outcome: Scripted) {
        lock(&self.script).push_back(outcome);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn generate_response(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        lock(&self.requests).push(request);
        match lock(&self.script).pop_front() {
            Some(Scripted::Reply(content)) => Ok(ChatResponse {
                content,
                usage: None,
            }),
            Some(Scripted::NetworkError(message)) => Err(Error::Network(message)),
            Some(Scripted::ApiError(status)) => Err(Error::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(Error::Network("no more scripted replies".to_string())),
        }
    }
}

/// A store whose every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Backend("store unavailable".to_string()))
}

#[async_trait]
impl StoryStore for FailingStore {
    async fn story(&self, _story_id: &str) -> Result<Option<Story>, StoreError> {
        unavailable()
    }

    async fn characters(&self, _story_id: &str) -> Result<Vec<Character>, StoreError> {
        unavailable()
    }

    async fn locations(&self, _story_id: &str) -> Result<Vec<Location>, StoreError> {
        unavailable()
    }

    async fn story_pack_id(&self, _story_id: &str) -> Result<Option<String>, StoreError> {
        unavailable()
    }

    async fn pack_template(
        &self,
        _pack_id: &str,
        _template_id: &str,
    ) -> Result<Option<PackTemplate>, StoreError> {
        unavailable()
    }

    async fn pack_variables(&self, _pack_id: &str) -> Result<Vec<CustomVariable>, StoreError> {
        unavailable()
    }
}
