//! Credential acquisition pipeline.
//!
//! `CHECK_CACHE -> RETURN_CACHED`, or `CHECK_CACHE -> SIGNIN -> EXCHANGE -> PERSIST ->
//! RETURN_FRESH`. Every step runs at most once and any failure aborts the run without
//! persisting anything.

use std::sync::Arc;
use tracing::{debug, info};

use crate::common::{AuthRequest, AuthResult};
use crate::credential::CredentialStore;
use crate::saml::AssertionProvider;
use crate::sts::{CredentialExchanger, ExchangeRequest};

/// Envelope produced by a run, tagged with where the credential came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Cached(String),
    Fresh(String),
}

impl AuthOutcome {
    pub fn envelope(&self) -> &str {
        match self {
            AuthOutcome::Cached(envelope) | AuthOutcome::Fresh(envelope) => envelope,
        }
    }
}

pub struct AuthOrchestrator {
    store: CredentialStore,
    assertion_provider: Arc<dyn AssertionProvider>,
    exchanger: Arc<dyn CredentialExchanger>,
}

impl AuthOrchestrator {
    pub fn new(
        store: CredentialStore,
        assertion_provider: Arc<dyn AssertionProvider>,
        exchanger: Arc<dyn CredentialExchanger>,
    ) -> Self {
        Self {
            store,
            assertion_provider,
            exchanger,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub async fn run(&mut self, request: &AuthRequest) -> AuthResult<AuthOutcome> {
        debug!("CHECK_CACHE: profile {}", request.profile());
        self.store.load(request.profile())?;
        debug!(
            "Cached credential complete: {}",
            self.store.credential().is_complete()
        );
        if !self.store.is_expired() {
            info!("Using cached credential for profile {}", request.profile());
            return Ok(AuthOutcome::Cached(self.store.output()?));
        }

        debug!("SIGNIN: role {}", request.role_arn());
        let assertion = self.assertion_provider.signin(request).await?;

        debug!("EXCHANGE: principal {}", assertion.principal_arn);
        let credential = self
            .exchanger
            .exchange(&ExchangeRequest::new(request, &assertion))
            .await?;

        debug!("PERSIST: profile {}", request.profile());
        self.store.set_credential(credential);
        self.store.save()?;

        debug!("RETURN_FRESH: profile {}", request.profile());
        Ok(AuthOutcome::Fresh(self.store.output()?))
    }
}
