//! Outcome of an access acquisition attempt

use std::collections::HashSet;
use std::sync::Arc;

use crate::request::AccessId;
use crate::token::{AccessToken, GenericAccessToken};

/// Result of asking the manager for access
///
/// Always carries a token. For a denied request the token is inert and
/// already released, and `blocking_tokens` lists the live conflicting
/// tokens that caused the denial.
pub struct AccessResult {
    available: bool,
    token: Arc<dyn AccessToken>,
    blocking_tokens: Vec<Arc<dyn AccessToken>>,
}

impl AccessResult {
    pub(crate) fn granted(token: Arc<dyn AccessToken>) -> Self {
        Self {
            available: true,
            token,
            blocking_tokens: Vec::new(),
        }
    }

    pub(crate) fn denied(id: AccessId, blocking_tokens: Vec<Arc<dyn AccessToken>>) -> Self {
        Self {
            available: false,
            token: Arc::new(GenericAccessToken::released(id)),
            blocking_tokens,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// The granted token, or an inert released token when denied
    pub fn token(&self) -> &Arc<dyn AccessToken> {
        &self.token
    }

    pub fn into_token(self) -> Arc<dyn AccessToken> {
        self.token
    }

    /// Tokens whose release would have allowed the request
    pub fn blocking_tokens(&self) -> &[Arc<dyn AccessToken>] {
        &self.blocking_tokens
    }

    /// Distinct ids of the blocking tokens
    pub fn blocking_ids(&self) -> HashSet<AccessId> {
        self.blocking_tokens
            .iter()
            .map(|token| token.access_id().clone())
            .collect()
    }

    /// Release the granted token, when there is one
    pub fn release(&self) {
        if self.available {
            self.token.release();
        }
    }

    /// Release and cancel the granted token, when there is one
    pub fn release_and_cancel(&self) {
        if self.available {
            self.token.release_and_cancel();
        }
    }
}
