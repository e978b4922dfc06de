//! Login state machine: phone → code → optional 2FA → authorized.
//!
//! In-flight state (phone code hash, phone) is persisted so a login survives a
//! restart. Transport failures disconnect best-effort and surface as errors;
//! expected outcomes are explicit `AuthStatus` values.

use crate::domain::{AuthSession, AuthState, AuthStatus, DomainError, SignInResult};
use crate::ports::{AuthPort, AuthStatePort, Store};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct AuthService {
    auth: Arc<dyn AuthPort>,
    store: Arc<dyn Store>,
    has_credentials: Mutex<bool>,
    /// Hash of the last requested code; the store holds a copy for restarts.
    pending_hash: Mutex<Option<String>>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthPort>, store: Arc<dyn Store>, has_credentials: bool) -> Self {
        Self {
            auth,
            store,
            has_credentials: Mutex::new(has_credentials),
            pending_hash: Mutex::new(None),
        }
    }

    pub async fn auth_session(&self) -> Result<AuthSession, DomainError> {
        self.store.load_auth_session().await
    }

    async fn update_session(
        &self,
        f: impl FnOnce(&mut AuthSession) + Send,
    ) -> Result<(), DomainError> {
        let mut session = self.store.load_auth_session().await?;
        f(&mut session);
        self.store.save_auth_session(&session).await
    }

    /// Request a login code on a fresh connection.
    pub async fn send_code(&self, phone: &str) -> Result<AuthStatus, DomainError> {
        if !*self.has_credentials.lock().await {
            return Ok(AuthStatus::MissingCredentials);
        }
        self.auth.disconnect().await;
        let hash = match self.connect_and_send(phone).await {
            Ok(hash) => hash,
            Err(e) => {
                self.auth.disconnect().await;
                return Err(e);
            }
        };
        *self.pending_hash.lock().await = Some(hash.clone());
        let phone = phone.to_string();
        self.update_session(move |s| {
            s.auth_state = AuthState::CodeSent;
            s.phone_code_hash = Some(hash);
            s.auth_phone = Some(phone);
        })
        .await?;
        info!("login code sent");
        Ok(AuthStatus::CodeSent)
    }

    async fn connect_and_send(&self, phone: &str) -> Result<String, DomainError> {
        self.auth.connect_fresh().await?;
        self.auth.send_code(phone).await
    }

    /// Sign in with the received code. `phone` falls back to the one the code was sent to.
    pub async fn verify_code(
        &self,
        phone: Option<&str>,
        code: &str,
    ) -> Result<AuthStatus, DomainError> {
        let session = self.store.load_auth_session().await?;
        let hash = match self.pending_hash.lock().await.clone() {
            Some(hash) => hash,
            None => match session.phone_code_hash.clone() {
                Some(hash) => {
                    info!("recovered phone code hash from store");
                    hash
                }
                None => return Ok(AuthStatus::CodeHashMissing),
            },
        };
        let Some(phone) = phone
            .map(String::from)
            .or_else(|| session.auth_phone.clone())
        else {
            return Ok(AuthStatus::CodeHashMissing);
        };

        let result = match self.sign_in(&phone, &hash, code).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "sign in failed");
                self.auth.disconnect().await;
                return Err(e);
            }
        };
        match result {
            SignInResult::Success { user } => {
                self.mark_authorized().await?;
                info!(user = %user, "authorized");
                Ok(AuthStatus::Authorized { user })
            }
            SignInResult::PasswordRequired { hint } => {
                info!("two-step verification required");
                Ok(AuthStatus::TwoFactorRequired { hint })
            }
        }
    }

    async fn sign_in(
        &self,
        phone: &str,
        hash: &str,
        code: &str,
    ) -> Result<SignInResult, DomainError> {
        self.auth.ensure_connected().await?;
        self.auth.sign_in(phone, hash, code.trim()).await
    }

    /// Complete a login that requires the cloud password.
    pub async fn verify_2fa(&self, password: &str) -> Result<AuthStatus, DomainError> {
        let user = match self.check_password(password).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "password check failed");
                self.auth.disconnect().await;
                return Err(e);
            }
        };
        self.mark_authorized().await?;
        info!(user = %user, "authorized with password");
        Ok(AuthStatus::Authorized { user })
    }

    async fn check_password(&self, password: &str) -> Result<String, DomainError> {
        self.auth.ensure_connected().await?;
        self.auth.check_password(password).await
    }

    async fn mark_authorized(&self) -> Result<(), DomainError> {
        *self.pending_hash.lock().await = None;
        self.update_session(|s| {
            s.auth_state = AuthState::Authorized;
            s.phone_code_hash = None;
            s.auth_phone = None;
        })
        .await
    }

    /// Whether the persisted session can be used as is. Never fails.
    pub async fn check_session_valid(&self) -> bool {
        if !self.auth.has_session_file() {
            return false;
        }
        if let Err(e) = self.auth.ensure_connected().await {
            warn!(error = %e, "could not connect with saved session");
            return false;
        }
        match self.auth.is_authorized().await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "session check failed");
                false
            }
        }
    }

    /// New app credentials invalidate any login in progress.
    pub async fn reset_credentials(&self, api_id: i32, api_hash: &str) -> Result<(), DomainError> {
        self.auth.disconnect().await;
        self.auth.set_credentials(api_id, api_hash).await;
        *self.has_credentials.lock().await = api_id != 0 && !api_hash.is_empty();
        *self.pending_hash.lock().await = None;
        self.update_session(|s| {
            s.auth_state = AuthState::None;
            s.phone_code_hash = None;
            s.auth_phone = None;
        })
        .await?;
        info!("credentials changed, auth state reset");
        Ok(())
    }

    /// Startup check. Returns true when the saved session is ready to use.
    pub async fn restore(&self) -> Result<bool, DomainError> {
        let session = self.store.load_auth_session().await?;
        if session.auth_state == AuthState::Authorized
            && self.auth.has_session_file()
            && self.check_session_valid().await
        {
            info!("saved session is valid");
            return Ok(true);
        }
        if session.auth_state == AuthState::CodeSent {
            // Code flow in progress; keep the hash for verify_code.
            return Ok(false);
        }
        if session.auth_state != AuthState::None {
            warn!("saved session is not usable, login required");
        }
        self.update_session(|s| {
            s.auth_state = AuthState::None;
            s.phone_code_hash = None;
        })
        .await?;
        Ok(false)
    }

    /// Record a running bot.
    pub async fn mark_running(&self, running: bool) -> Result<(), DomainError> {
        self.update_session(move |s| {
            s.is_running = running;
            s.started_at = running.then(Utc::now);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryRepo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted transport.
    #[derive(Default)]
    struct FakeAuth {
        session_file: bool,
        authorized: bool,
        fail_send: bool,
        sign_in: Mutex<Option<Result<SignInResult, String>>>,
        seen_hash: Mutex<Option<String>>,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AuthPort for FakeAuth {
        async fn connect_fresh(&self) -> Result<(), DomainError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn ensure_connected(&self) -> Result<(), DomainError> {
            Ok(())
        }

        async fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn has_session_file(&self) -> bool {
            self.session_file
        }

        async fn set_credentials(&self, _api_id: i32, _api_hash: &str) {}

        async fn is_authorized(&self) -> Result<bool, DomainError> {
            Ok(self.authorized)
        }

        async fn send_code(&self, _phone: &str) -> Result<String, DomainError> {
            if self.fail_send {
                return Err(DomainError::Auth("PHONE_NUMBER_INVALID".into()));
            }
            Ok("hash-1".into())
        }

        async fn sign_in(
            &self,
            _phone: &str,
            phone_code_hash: &str,
            _code: &str,
        ) -> Result<SignInResult, DomainError> {
            *self.seen_hash.lock().await = Some(phone_code_hash.to_string());
            match self.sign_in.lock().await.take() {
                Some(Ok(r)) => Ok(r),
                Some(Err(e)) => Err(DomainError::Auth(e)),
                None => Ok(SignInResult::Success { user: "Owner".into() }),
            }
        }

        async fn check_password(&self, password: &str) -> Result<String, DomainError> {
            if password == "secret" {
                Ok("Owner".into())
            } else {
                Err(DomainError::Auth("PASSWORD_HASH_INVALID".into()))
            }
        }
    }

    fn service(fake: FakeAuth) -> (AuthService, Arc<FakeAuth>, Arc<MemoryRepo>) {
        let fake = Arc::new(fake);
        let repo = Arc::new(MemoryRepo::new());
        (
            AuthService::new(fake.clone(), repo.clone(), true),
            fake,
            repo,
        )
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let fake = Arc::new(FakeAuth::default());
        let repo = Arc::new(MemoryRepo::new());
        let auth = AuthService::new(fake.clone(), repo, false);
        assert_eq!(
            auth.send_code("+100").await.unwrap(),
            AuthStatus::MissingCredentials
        );
        assert_eq!(fake.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_code_persists_hash() {
        let (auth, fake, repo) = service(FakeAuth::default());
        assert_eq!(auth.send_code("+100").await.unwrap(), AuthStatus::CodeSent);
        let session = repo.load_auth_session().await.unwrap();
        assert_eq!(session.auth_state, AuthState::CodeSent);
        assert_eq!(session.phone_code_hash.as_deref(), Some("hash-1"));
        assert_eq!(session.auth_phone.as_deref(), Some("+100"));
        assert_eq!(fake.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_code_failure_disconnects() {
        let (auth, fake, _) = service(FakeAuth {
            fail_send: true,
            ..Default::default()
        });
        assert!(auth.send_code("+1").await.is_err());
        // Teardown before connecting plus cleanup after the failure.
        assert_eq!(fake.disconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_verify_recovers_hash_after_restart() {
        let (auth, fake, repo) = service(FakeAuth::default());
        auth.send_code("+100").await.unwrap();

        let restarted = AuthService::new(fake.clone(), repo.clone(), true);
        let status = restarted.verify_code(None, " 12345 ").await.unwrap();
        assert_eq!(status, AuthStatus::Authorized { user: "Owner".into() });
        assert_eq!(fake.seen_hash.lock().await.as_deref(), Some("hash-1"));

        let session = repo.load_auth_session().await.unwrap();
        assert_eq!(session.auth_state, AuthState::Authorized);
        assert!(session.phone_code_hash.is_none());
        assert!(session.auth_phone.is_none());
    }

    #[tokio::test]
    async fn test_verify_without_hash() {
        let (auth, _, _) = service(FakeAuth::default());
        assert_eq!(
            auth.verify_code(Some("+1"), "1").await.unwrap(),
            AuthStatus::CodeHashMissing
        );
    }

    #[tokio::test]
    async fn test_two_factor_flow() {
        let (auth, fake, repo) = service(FakeAuth::default());
        *fake.sign_in.lock().await = Some(Ok(SignInResult::PasswordRequired {
            hint: Some("pet".into()),
        }));
        auth.send_code("+100").await.unwrap();
        let status = auth.verify_code(Some("+100"), "1").await.unwrap();
        assert_eq!(
            status,
            AuthStatus::TwoFactorRequired {
                hint: Some("pet".into())
            }
        );
        assert_eq!(
            repo.load_auth_session().await.unwrap().auth_state,
            AuthState::CodeSent
        );

        assert!(auth.verify_2fa("wrong").await.is_err());
        assert_eq!(
            auth.verify_2fa("secret").await.unwrap(),
            AuthStatus::Authorized { user: "Owner".into() }
        );
    }

    #[tokio::test]
    async fn test_invalid_code_disconnects_and_errors() {
        let (auth, fake, _) = service(FakeAuth::default());
        auth.send_code("+100").await.unwrap();
        let before = fake.disconnects.load(Ordering::SeqCst);
        *fake.sign_in.lock().await = Some(Err("PHONE_CODE_INVALID".into()));
        assert!(auth.verify_code(None, "000").await.is_err());
        assert_eq!(fake.disconnects.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_session_validity() {
        let (auth, _, _) = service(FakeAuth::default());
        assert!(!auth.check_session_valid().await);

        let (auth, _, _) = service(FakeAuth {
            session_file: true,
            authorized: true,
            ..Default::default()
        });
        assert!(auth.check_session_valid().await);
    }

    #[tokio::test]
    async fn test_restore_resets_stale_state() {
        let (auth, _, repo) = service(FakeAuth {
            session_file: true,
            authorized: false,
            ..Default::default()
        });
        repo.save_auth_session(&AuthSession {
            auth_state: AuthState::Authorized,
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(!auth.restore().await.unwrap());
        assert_eq!(
            repo.load_auth_session().await.unwrap().auth_state,
            AuthState::None
        );
    }

    #[tokio::test]
    async fn test_reset_credentials() {
        let (auth, _, repo) = service(FakeAuth::default());
        auth.send_code("+100").await.unwrap();
        auth.reset_credentials(42, "new-hash").await.unwrap();
        let session = repo.load_auth_session().await.unwrap();
        assert_eq!(session.auth_state, AuthState::None);
        assert!(session.phone_code_hash.is_none());
        assert_eq!(
            auth.verify_code(Some("+100"), "1").await.unwrap(),
            AuthStatus::CodeHashMissing
        );
    }
}
