use std::collections::BTreeSet;
use std::time::Duration;

use google_gmail1::api::{BatchModifyMessagesRequest, ModifyMessageRequest};
use google_gmail1::hyper_rustls::{self, HttpsConnector};
use google_gmail1::hyper_util::client::legacy::connect::HttpConnector;
use google_gmail1::yup_oauth2::{self, authenticator::Authenticator, InstalledFlowAuthenticator, InstalledFlowReturnMethod};
use google_gmail1::Gmail;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::provider::{MailProvider, ModifyOutcome};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;

/// Gmail messages can only be batch-modified 1000 ids at a time.
const BATCH_SIZE: usize = 1000;
const MAX_RETRIES: u32 = 3;

pub struct GmailProvider {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailProvider {
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>) -> Self {
        Self { hub }
    }

    pub async fn authenticated(
        authenticator: Authenticator<HttpsConnector<HttpConnector>>,
    ) -> AppResult<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| raise_error!(format!("tls setup failed: {e}"), ErrorCode::InternalError))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = google_gmail1::hyper_util::client::legacy::Client::builder(
            google_gmail1::hyper_util::rt::TokioExecutor::new(),
        )
        .build(connector);
        Ok(Self::new(Gmail::new(client, authenticator)))
    }

    async fn with_retry<F, Fut, T>(op_name: &str, mut f: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.code().is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    tracing::warn!(op_name, attempt, "transient provider error, retrying: {}", e.message());
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn batch_modify_chunk(
        &self,
        ids: &[String],
        add: Option<Vec<String>>,
        remove: Option<Vec<String>>,
    ) -> AppResult<()> {
        let timeout = Duration::from_secs(SETTINGS.curator_provider_call_timeout_secs);
        let request = BatchModifyMessagesRequest {
            ids: Some(ids.to_vec()),
            add_label_ids: add,
            remove_label_ids: remove,
        };
        tokio::time::timeout(timeout, async {
            self.hub
                .users()
                .messages_batch_modify(request, "me")
                .add_scope("https://www.googleapis.com/auth/gmail.modify")
                .doit()
                .await
                .map_err(|e| raise_error!(format!("gmail batchModify failed: {e}"), ErrorCode::ProviderTransient))
        })
        .await
        .map_err(|_| raise_error!("gmail batchModify timed out".into(), ErrorCode::ProviderTimeout))?
        .map(|_| ())
    }
}

#[async_trait::async_trait]
impl MailProvider for GmailProvider {
    async fn batch_modify(
        &self,
        message_ids: &[String],
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> AppResult<ModifyOutcome> {
        let add: Option<Vec<String>> = (!add_labels.is_empty())
            .then(|| add_labels.iter().cloned().collect());
        let remove: Option<Vec<String>> = (!remove_labels.is_empty())
            .then(|| remove_labels.iter().cloned().collect());

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for chunk in message_ids.chunks(BATCH_SIZE) {
            match Self::with_retry("batch_modify", || {
                self.batch_modify_chunk(chunk, add.clone(), remove.clone())
            })
            .await
            {
                Ok(()) => succeeded.extend(chunk.iter().cloned()),
                Err(e) => failed.extend(chunk.iter().map(|id| (id.clone(), e.message().to_string()))),
            }
        }
        Ok(ModifyOutcome { succeeded, failed })
    }

    async fn modify(
        &self,
        message_id: &str,
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> AppResult<()> {
        let request = ModifyMessageRequest {
            add_label_ids: (!add_labels.is_empty()).then(|| add_labels.iter().cloned().collect()),
            remove_label_ids: (!remove_labels.is_empty())
                .then(|| remove_labels.iter().cloned().collect()),
        };
        Self::with_retry("modify", || async {
            self.hub
                .users()
                .messages_modify(request.clone(), "me", message_id)
                .add_scope("https://www.googleapis.com/auth/gmail.modify")
                .doit()
                .await
                .map(|_| ())
                .map_err(|e| raise_error!(format!("gmail modify failed: {e}"), ErrorCode::ProviderTransient))
        })
        .await
    }

    async fn trash(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for id in message_ids {
            let result = Self::with_retry("trash", || async {
                self.hub
                    .users()
                    .messages_trash("me", id)
                    .add_scope("https://www.googleapis.com/auth/gmail.modify")
                    .doit()
                    .await
                    .map(|_| ())
                    .map_err(|e| raise_error!(format!("gmail trash failed: {e}"), ErrorCode::ProviderTransient))
            })
            .await;
            match result {
                Ok(()) => succeeded.push(id.clone()),
                Err(e) => failed.push((id.clone(), e.message().to_string())),
            }
        }
        Ok(ModifyOutcome { succeeded, failed })
    }

    async fn delete(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for id in message_ids {
            let result = Self::with_retry("delete", || async {
                self.hub
                    .users()
                    .messages_delete("me", id)
                    .add_scope("https://www.googleapis.com/auth/gmail.modify")
                    .doit()
                    .await
                    .map_err(|e| raise_error!(format!("gmail delete failed: {e}"), ErrorCode::ProviderTransient))
            })
            .await;
            match result {
                Ok(_) => succeeded.push(id.clone()),
                Err(e) => failed.push((id.clone(), e.message().to_string())),
            }
        }
        Ok(ModifyOutcome { succeeded, failed })
    }

    async fn purge_trash(&self) -> AppResult<()> {
        // The Gmail API has no bulk "empty trash" endpoint; trash is purged
        // by listing `in:trash` and permanently deleting each id. Left as
        // the adapter's own responsibility, not the executor's - see open
        // question on trash-vs-permanently-delete semantics.
        let mut page_token: Option<String> = None;
        loop {
            let mut call = self
                .hub
                .users()
                .messages_list("me")
                .q("in:trash")
                .add_scope("https://www.googleapis.com/auth/gmail.modify");
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }
            let (_, response) = call
                .doit()
                .await
                .map_err(|e| raise_error!(format!("gmail list trash failed: {e}"), ErrorCode::ProviderTransient))?;

            let ids: Vec<String> = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect();
            if !ids.is_empty() {
                self.delete(&ids).await?;
            }
            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(())
    }
}

async fn build_authenticator(user_id: &str) -> AppResult<Authenticator<HttpsConnector<HttpConnector>>> {
    let secret = yup_oauth2::ApplicationSecret {
        client_id: SETTINGS.curator_gmail_client_id.clone(),
        client_secret: SETTINGS.curator_gmail_client_secret.clone(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        redirect_uris: vec![SETTINGS.curator_gmail_redirect_uri.clone()],
        project_id: None,
        client_email: None,
        auth_provider_x509_cert_url: None,
        client_x509_cert_url: None,
    };
    InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(DATA_DIR_MANAGER.token_path(user_id))
        .build()
        .await
        .map_err(|e| raise_error!(format!("oauth authenticator init failed for {user_id}: {e}"), ErrorCode::InternalError))
}

/// Defers Gmail hub construction until the first call against a given user,
/// since `AppContext::mail_provider_factory` is synchronous but building an
/// authenticator from a persisted token is not. Each call pays the cost of
/// loading the token and opening an https client fresh - acceptable given
/// how infrequently the factory itself is invoked (once per tool call).
pub struct LazyGmailProvider {
    user_id: String,
}

impl LazyGmailProvider {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }

    async fn connect(&self) -> AppResult<GmailProvider> {
        let authenticator = build_authenticator(&self.user_id).await?;
        GmailProvider::authenticated(authenticator).await
    }
}

#[async_trait::async_trait]
impl MailProvider for LazyGmailProvider {
    async fn batch_modify(&self, message_ids: &[String], add_labels: &BTreeSet<String>, remove_labels: &BTreeSet<String>) -> AppResult<ModifyOutcome> {
        self.connect().await?.batch_modify(message_ids, add_labels, remove_labels).await
    }

    async fn modify(&self, message_id: &str, add_labels: &BTreeSet<String>, remove_labels: &BTreeSet<String>) -> AppResult<()> {
        self.connect().await?.modify(message_id, add_labels, remove_labels).await
    }

    async fn trash(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
        self.connect().await?.trash(message_ids).await
    }

    async fn delete(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
        self.connect().await?.delete(message_ids).await
    }

    async fn purge_trash(&self) -> AppResult<()> {
        self.connect().await?.purge_trash().await
    }
}
