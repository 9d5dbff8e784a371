//! Console shell: wires the core context together, runs one command and
//! reports session changes and notices raised while it ran.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use kandox_core::api::{Method, Reply};
use kandox_core::auth::SessionState;
use kandox_core::models::Page;
use kandox_core::notify::{ChannelNotifier, Notice};
use kandox_core::utils::{format_optional, truncate_string};
use kandox_core::{ApiClient, ApiRequest, AuthContext, AuthService, Config, Envelope};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::cli::Commands;

/// Longest reason echoed to the terminal for a failed request.
const MAX_REASON_LENGTH: usize = 200;

pub struct App {
    config: Config,
    auth: AuthService,
    notices: mpsc::UnboundedReceiver<Notice>,
    session: watch::Receiver<SessionState>,
}

impl App {
    pub fn new(config: Config, route: &str) -> Result<Self> {
        let (notifier, notices) = ChannelNotifier::channel();
        let context = AuthContext::from_config(&config)?.with_notifier(Arc::new(notifier));
        context.view().set_route(route);
        let session = context.session().subscribe();

        let client = ApiClient::new(&config, Arc::new(context)).context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            auth: AuthService::new(client),
            notices,
            session,
        })
    }

    pub async fn run(mut self, command: Commands) -> Result<()> {
        let result = self.dispatch(command).await;
        self.report();
        result
    }

    async fn dispatch(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { username, password } => self.login(username, password).await,
            Commands::Logout => self.logout().await,
            Commands::Whoami => self.whoami().await,
            Commands::Request {
                method,
                path,
                data,
                query,
            } => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("Invalid HTTP method: {}", method))?;
                let mut request = ApiRequest::new(method, path);
                if let Some(data) = data {
                    let body: serde_json::Value =
                        serde_json::from_str(&data).context("--data must be valid JSON")?;
                    request = request.json(&body)?;
                }
                self.request(with_query(request, &query)?).await
            }
            Commands::Get { path, query } => {
                self.request(with_query(ApiRequest::get(path), &query)?).await
            }
            Commands::Download { path, output } => {
                let download = self.auth.client().download(&path).await?;
                std::fs::write(&output, &download.bytes)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Saved {} bytes to {}", download.bytes.len(), output.display());
                Ok(())
            }
            Commands::Can { module, method, path } => {
                let Some(account) = self.auth.bootstrap().await else {
                    bail!("Not signed in");
                };
                let allowed = account.has_permission(&module, method.as_deref(), path.as_deref());
                println!("{}", if allowed { "allowed" } else { "denied" });
                Ok(())
            }
        }
    }

    async fn login(&mut self, username: Option<String>, password: Option<String>) -> Result<()> {
        self.auth.client().context().view().set_route(self.config.login_route.clone());

        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(username) => username,
            None => prompt("Username: ")?,
        };
        let password = match password {
            Some(password) => password,
            None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
        };

        let account = self.auth.login(&username, &password).await?;
        println!("Signed in as {} <{}>", account.display_name(), account.email);

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        match self.auth.logout().await {
            Ok(envelope) if !envelope.is_success() => {
                eprintln!("Backend logout failed: {}", reason_of(&envelope));
            }
            Err(e) => eprintln!("Backend logout failed: {}", e),
            Ok(_) => {}
        }
        println!("Signed out");
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        let Some(account) = self.auth.bootstrap().await else {
            bail!("Not signed in");
        };
        println!("{} <{}>", account.display_name(), account.email);
        println!("  id:          {}", account.id);
        println!("  role:        {}", format_optional(Some(&account.role.name), "(none)"));
        println!(
            "  unit:        {}",
            format_optional(account.unit.as_ref().map(|u| u.name.as_str()), "(none)")
        );
        println!("  permissions: {}", account.role.permissions.len());
        if !account.active {
            println!("  (inactive)");
        }
        Ok(())
    }

    async fn request(&self, request: ApiRequest) -> Result<()> {
        match self.auth.client().send(request).await? {
            Reply::Binary(download) => {
                println!("<{} bytes of binary data>", download.bytes.len());
                Ok(())
            }
            Reply::Envelope(envelope) => {
                if let Some(page) = envelope
                    .data
                    .clone()
                    .filter(|data| data.get("meta").is_some() && data.get("result").is_some())
                    .and_then(|data| serde_json::from_value::<Page<serde_json::Value>>(data).ok())
                {
                    eprintln!("{}", page.summary());
                }
                println!("{}", serde_json::to_string_pretty(&envelope)?);
                if !envelope.is_success() {
                    bail!("HTTP {}: {}", envelope.status_code, reason_of(&envelope));
                }
                Ok(())
            }
        }
    }

    /// Print notices and session changes raised during the command.
    fn report(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            if notice.description.is_empty() {
                eprintln!("! {}", notice.title);
            } else {
                eprintln!("! {}: {}", notice.title, notice.description);
            }
        }

        if self.session.has_changed().unwrap_or(false) {
            let state = self.session.borrow_and_update().clone();
            if let Some(reason) = state.invalid_reason {
                info!("Session invalidated during command");
                eprintln!("Session ended: {}", reason);
                eprintln!("Run `kandox login` to sign in again.");
            }
        }
    }
}

fn with_query(mut request: ApiRequest, pairs: &[String]) -> Result<ApiRequest> {
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Query parameter must be key=value: {}", pair);
        };
        request = request.query(key, value);
    }
    Ok(request)
}

fn reason_of(envelope: &Envelope) -> String {
    let reason = envelope
        .reason()
        .unwrap_or_else(|| format!("HTTP {}", envelope.status_code));
    truncate_string(&reason, MAX_REASON_LENGTH)
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("Username is required");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_pairs() {
        let request = with_query(
            ApiRequest::get("/api/v1/users"),
            &["page=2".to_string(), "filter=name~'an'".to_string()],
        )
        .expect("valid pairs");
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("filter".to_string(), "name~'an'".to_string())
            ]
        );
        assert!(with_query(ApiRequest::get("/x"), &["broken".to_string()]).is_err());
    }
}
