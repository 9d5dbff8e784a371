use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, Envelope, Reply};
use crate::models::{Account, AccountData, LoginData};

use super::endpoint::{ACCOUNT_PATH, LOGIN_PATH, LOGOUT_PATH};

/// The three session writers that run through the backend: bootstrap, login
/// and logout. The fourth, invalidation, lives in the client pipeline.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Resolve the initial session from the account endpoint.
    ///
    /// On the login route no fetch is made and the session settles as
    /// signed out. Any failure also settles as signed out.
    pub async fn bootstrap(&self) -> Option<Account> {
        let context = self.client.context();
        context.session().begin_bootstrap();

        if context.view().is_login_route() {
            debug!("Skipping identity fetch on the login route");
            context.session().finish_bootstrap(None);
            return None;
        }

        let account = match self.client.fetch::<AccountData>(ApiRequest::get(ACCOUNT_PATH)).await {
            Ok(data) => data.user,
            Err(e) => {
                debug!(error = %e, "No active session");
                None
            }
        };
        context.session().finish_bootstrap(account.clone());
        account
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Account, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(&serde_json::json!({
            "username": username,
            "password": password,
        }))?;
        let login: LoginData = self.client.fetch(request).await?;
        let account = login
            .user
            .ok_or_else(|| ApiError::InvalidResponse("Login response carried no user".to_string()))?;

        let context = self.client.context();
        if let Err(e) = context.credentials().store(&login.access_token) {
            warn!(error = %e, "Failed to persist access token");
        }
        context.session().signed_in(account.clone());
        Ok(account)
    }

    /// Sign out on the backend, then always drop the local credential and
    /// identity. The backend outcome is returned for reporting only.
    pub async fn logout(&self) -> Result<Envelope, ApiError> {
        let outcome = self
            .client
            .send(ApiRequest::post(LOGOUT_PATH))
            .await
            .and_then(Reply::into_envelope);
        match &outcome {
            Ok(envelope) if !envelope.is_success() => {
                info!(status = envelope.status_code, "Backend logout rejected")
            }
            Err(e) => warn!(error = %e, "Backend logout failed"),
            Ok(_) => {}
        }

        let context = self.client.context();
        if let Err(e) = context.credentials().clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        context.session().signed_out();
        outcome
    }
}
