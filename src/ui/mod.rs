//! UI binder: wires console actions to the clients.
//!
//! Every [`Action`] has exactly one handler.  Handlers run the whole async
//! chain on each activation; there is no busy flag, so issuing the same
//! command twice runs it twice concurrently.  Failures end at
//! [`App::dispatch`], which logs them and carries on.

pub mod action;
pub mod view;

use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::cognito::CognitoIdentityExchange;
use crate::credentials::memory::MemoryExchange;
use crate::credentials::CredentialProvider;
use crate::errors::ClientResult;
use crate::identity::cognito::CognitoIdentityProvider;
use crate::identity::memory::MemoryIdentityProvider;
use crate::identity::session_store::{FileSessionStore, MemorySessionStore};
use crate::identity::token::decode_id_claims;
use crate::identity::{missing_field, IdentityClient, UserAttribute};
use crate::order::OrderTracker;
use crate::storage::memory::MemoryObjectStore;
use crate::storage::s3::S3ObjectStore;
use crate::storage::{StorageClient, UploadFile};
use crate::submission::{OrderRequest, SubmissionClient};

pub use action::Action;
pub use view::{TerminalView, View};

/// Name greeted when nobody is logged in.
pub const GUEST: &str = "Guest";

/// All collaborators of the console, created once at start-up.
pub struct App {
    identity: IdentityClient,
    credentials: CredentialProvider,
    storage: StorageClient,
    order: OrderTracker,
    submission: SubmissionClient,
    view: Arc<dyn View>,
    list_max_keys: i32,
    presign_ttl_seconds: u64,
}

impl App {
    pub fn new(
        identity: IdentityClient,
        credentials: CredentialProvider,
        storage: StorageClient,
        submission: SubmissionClient,
        view: Arc<dyn View>,
        config: &Config,
    ) -> Self {
        Self {
            identity,
            credentials,
            storage,
            order: OrderTracker::new(),
            submission,
            view,
            list_max_keys: config.storage.list_max_keys,
            presign_ttl_seconds: config.storage.presign_ttl_seconds,
        }
    }

    /// Collaborators talking to Cognito and S3.
    pub async fn from_config(config: &Config, view: Arc<dyn View>) -> anyhow::Result<Self> {
        let api_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        let identity = IdentityClient::new(
            Arc::new(CognitoIdentityProvider::new(
                api_http.clone(),
                config.cognito_idp_endpoint(),
                config.aws.client_id.clone(),
            )),
            Arc::new(FileSessionStore::new(&config.session.path)),
        );

        let credentials = CredentialProvider::new(
            Arc::new(CognitoIdentityExchange::new(
                api_http,
                config.cognito_identity_endpoint(),
                config.aws.identity_pool_id.clone(),
            )),
            config.login_provider(),
        );

        let store = S3ObjectStore::new(
            credentials.clone(),
            config.aws.region.clone(),
            config.aws.s3_endpoint.clone(),
            config.aws.use_path_style,
            config.storage.chunk_size,
        )
        .await;
        let storage = StorageClient::new(
            Arc::new(store),
            config.aws.bucket.clone(),
            config.aws.key_prefix.clone(),
        );

        let submission = SubmissionClient::new(&config.api.base_url, config.api.timeout_seconds)?;
        Ok(Self::new(
            identity,
            credentials,
            storage,
            submission,
            view,
            config,
        ))
    }

    /// In-process user pool, identity pool and bucket.  Only order
    /// submission still goes over the network.
    pub fn offline(config: &Config, view: Arc<dyn View>) -> anyhow::Result<Self> {
        let issuer = format!("https://{}", config.login_provider());
        let identity = IdentityClient::new(
            Arc::new(MemoryIdentityProvider::new(issuer)),
            Arc::new(MemorySessionStore::new()),
        );
        let credentials =
            CredentialProvider::new(Arc::new(MemoryExchange::new()), config.login_provider());
        let store = MemoryObjectStore::new()
            .with_credentials(credentials.clone())
            .with_chunk_size(config.storage.chunk_size);
        let storage = StorageClient::new(
            Arc::new(store),
            config.aws.bucket.clone(),
            config.aws.key_prefix.clone(),
        );
        let submission = SubmissionClient::new(&config.api.base_url, config.api.timeout_seconds)?;
        info!("Running offline with in-memory identity and storage");
        Ok(Self::new(
            identity,
            credentials,
            storage,
            submission,
            view,
            config,
        ))
    }

    /// Restore the saved session into the credential bridge and greet.
    pub async fn start(&self) {
        let profile = match self.identity.load_saved_session().await {
            Ok(session) => {
                self.credentials.refresh(&session);
                self.identity.profile_of(&session).await
            }
            Err(e) => {
                debug!("Session restore failed: {}", e);
                info!("Cant reload credentials");
                Err(e)
            }
        };

        let name = match &profile {
            Ok(profile) => profile.email().unwrap_or(GUEST),
            Err(_) => GUEST,
        };
        self.view.greet(name);
    }

    /// Run the handler bound to `action`, logging any failure.
    pub async fn dispatch(self: Arc<Self>, action: Action) {
        let label = action.to_string();
        debug!("Dispatching {}", label);
        if let Err(e) = self.handle(action).await {
            warn!("{} failed: {} [{}]", label, e, e.code());
        }
    }

    async fn handle(&self, action: Action) -> ClientResult<()> {
        match action {
            Action::Register {
                email,
                password,
                attributes,
            } => self.register(&email, &password, &attributes).await,
            Action::Confirm { email, code } => {
                self.identity.confirm(&email, &code).await?;
                self.view.notify(&format!("{email} confirmed"));
                Ok(())
            }
            Action::Login { email, password } => {
                let session = self.identity.login(&email, &password).await?;
                self.credentials.refresh(&session);
                self.view.notify(&format!("logged in as {email}"));
                Ok(())
            }
            Action::List => {
                let files = self.storage.list(self.list_max_keys).await?;
                self.view.show_files(&files);
                Ok(())
            }
            Action::Upload { paths } => self.upload_files(paths).await,
            Action::Order => self.submit_order().await,
            Action::Cancel => {
                self.order.cancel().await;
                self.view.notify("order cancelled");
                Ok(())
            }
            Action::Help => {
                self.view.notify(action::HELP);
                Ok(())
            }
            Action::Quit => Ok(()),
        }
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> ClientResult<()> {
        let outcome = self.identity.register(email, password, attributes).await?;
        let message = match (&outcome.user_confirmed, &outcome.code_destination) {
            (true, _) => format!("{email} registered and confirmed"),
            (false, Some(destination)) => {
                format!("{email} registered; confirmation code sent to {destination}")
            }
            (false, None) => format!("{email} registered; awaiting confirmation"),
        };
        self.view.notify(&message);
        Ok(())
    }

    /// Upload every file concurrently.  Each success is added to the
    /// order and previewed as it completes; failures only affect their
    /// own file.
    async fn upload_files(&self, paths: Vec<PathBuf>) -> ClientResult<()> {
        if paths.is_empty() {
            info!("No files chosen");
            self.view.notify("No files chosen");
            return Ok(());
        }

        let user_id = self.credentials.identity_id().await?;
        let results = join_all(paths.iter().map(|path| self.upload_one(&user_id, path))).await;
        let uploaded = results.iter().filter(|r| r.is_ok()).count();
        info!("Uploaded {} of {} files", uploaded, results.len());
        Ok(())
    }

    async fn upload_one(&self, user_id: &str, path: &Path) -> ClientResult<String> {
        let result = self.upload_pipeline(user_id, path).await;
        self.view.clear_progress();
        if let Err(e) = &result {
            warn!("Upload of {} failed: {}", path.display(), e);
        }
        result
    }

    async fn upload_pipeline(&self, user_id: &str, path: &Path) -> ClientResult<String> {
        let file = UploadFile::from_path(path).await?;
        let view = self.view.clone();
        let key = self
            .storage
            .upload(user_id, file, move |percent| view.progress(percent))
            .await?;
        let key = self.order.add(key).await;
        let url = self
            .storage
            .get_presigned_url(&key, self.presign_ttl_seconds)?;
        self.view.add_preview(&url);
        Ok(key)
    }

    async fn submit_order(&self) -> ClientResult<()> {
        let photos = self.order.snapshot().await;
        let token = self.identity.get_access_token().await?;
        let email = decode_id_claims(&token)?
            .email
            .ok_or_else(|| missing_field("id token", "email"))?;

        let response = self
            .submission
            .submit(&token, &OrderRequest { email, photos })
            .await?;
        self.view
            .notify(&format!("order response {}: {}", response.status, response.body));
        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------
