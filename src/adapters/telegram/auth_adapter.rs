//! Implements AuthPort using grammers Client.
//!
//! Login codes go through raw `auth.sendCode` / `auth.signIn` so the phone code
//! hash can be persisted and a login can resume after a restart. Two-step
//! verification uses the client's password token flow.

use crate::adapters::telegram::session::TelegramConnector;
use crate::domain::{DomainError, SignInResult};
use crate::ports::AuthPort;
use async_trait::async_trait;
use grammers_client::client::PasswordToken;
use grammers_client::{InvocationError, tl};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Auth adapter. Shares the connection with the messenger via the connector.
pub struct GrammersAuthAdapter {
    connector: Arc<TelegramConnector>,
    /// Token for two-step verification; consumed by check_password.
    password_token: Mutex<Option<PasswordToken>>,
}

impl GrammersAuthAdapter {
    pub fn new(connector: Arc<TelegramConnector>) -> Self {
        Self {
            connector,
            password_token: Mutex::new(None),
        }
    }

    async fn fetch_password_token(&self) -> Result<PasswordToken, DomainError> {
        let client = self.connector.client().await?;
        let tl::enums::account::Password::Password(password) = client
            .invoke(&tl::functions::account::GetPassword {})
            .await
            .map_err(|e| DomainError::Auth(format!("get password: {}", e)))?;
        Ok(PasswordToken::new(password))
    }
}

fn user_label(user: &tl::enums::User) -> String {
    match user {
        tl::enums::User::User(u) => {
            let name = [u.first_name.as_deref(), u.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            match (&u.username, name.is_empty()) {
                (Some(username), true) => format!("@{}", username),
                (_, false) => name,
                (None, true) => u.id.to_string(),
            }
        }
        tl::enums::User::Empty(u) => u.id.to_string(),
    }
}

#[async_trait]
impl AuthPort for GrammersAuthAdapter {
    async fn connect_fresh(&self) -> Result<(), DomainError> {
        self.connector.connect_fresh().await.map(|_| ())
    }

    async fn ensure_connected(&self) -> Result<(), DomainError> {
        self.connector.client().await.map(|_| ())
    }

    async fn disconnect(&self) {
        self.connector.disconnect().await;
    }

    fn has_session_file(&self) -> bool {
        self.connector.session_path().exists()
    }

    async fn set_credentials(&self, api_id: i32, api_hash: &str) {
        self.connector.set_credentials(api_id, api_hash);
    }

    async fn is_authorized(&self) -> Result<bool, DomainError> {
        self.connector
            .client()
            .await?
            .is_authorized()
            .await
            .map_err(|e| DomainError::Auth(e.to_string()))
    }

    async fn send_code(&self, phone: &str) -> Result<String, DomainError> {
        let client = self.connector.client().await?;
        let (api_id, api_hash) = self.connector.credentials();
        let request = tl::functions::auth::SendCode {
            phone_number: phone.to_string(),
            api_id,
            api_hash,
            settings: tl::types::CodeSettings {
                allow_flashcall: false,
                current_number: false,
                allow_app_hash: false,
                allow_missed_call: false,
                allow_firebase: false,
                unknown_number: false,
                logout_tokens: None,
                token: None,
                app_sandbox: None,
            }
            .into(),
        };
        let sent = client
            .invoke(&request)
            .await
            .map_err(|e| DomainError::Auth(format!("send code: {}", e)))?;
        *self.password_token.lock().await = None;
        match sent {
            tl::enums::auth::SentCode::Code(code) => {
                info!("login code requested");
                Ok(code.phone_code_hash)
            }
            _ => Err(DomainError::Auth(
                "send code: unexpected response, no code was issued".into(),
            )),
        }
    }

    async fn sign_in(
        &self,
        phone: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<SignInResult, DomainError> {
        let client = self.connector.client().await?;
        let request = tl::functions::auth::SignIn {
            phone_number: phone.to_string(),
            phone_code_hash: phone_code_hash.to_string(),
            phone_code: Some(code.to_string()),
            email_verification: None,
        };
        match client.invoke(&request).await {
            Ok(tl::enums::auth::Authorization::Authorization(auth)) => Ok(SignInResult::Success {
                user: user_label(&auth.user),
            }),
            Ok(tl::enums::auth::Authorization::SignUpRequired(_)) => Err(DomainError::Auth(
                "Sign-up required. Create an account with the official Telegram app first.".into(),
            )),
            Err(InvocationError::Rpc(rpc)) if rpc.name == "SESSION_PASSWORD_NEEDED" => {
                let token = self.fetch_password_token().await?;
                let hint = token.hint().map(String::from);
                *self.password_token.lock().await = Some(token);
                Ok(SignInResult::PasswordRequired { hint })
            }
            Err(InvocationError::Rpc(rpc)) if rpc.name.starts_with("PHONE_CODE_") => {
                warn!(error = %rpc.name, "login code rejected");
                Err(DomainError::Auth(format!("invalid code: {}", rpc.name)))
            }
            Err(e) => Err(DomainError::Auth(format!("sign in: {}", e))),
        }
    }

    async fn check_password(&self, password: &str) -> Result<String, DomainError> {
        let token = match self.password_token.lock().await.take() {
            Some(token) => token,
            // Process restarted between code and password.
            None => self.fetch_password_token().await?,
        };
        let user = self
            .connector
            .client()
            .await?
            .check_password(token, password.as_bytes())
            .await
            .map_err(|e| DomainError::Auth(format!("check password: {}", e)))?;
        Ok(user.full_name())
    }
}
