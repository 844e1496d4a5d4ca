//! Auth state container.
//!
//! Owns the single current-identity value and mediates the authentication
//! and profile flows against the backend. The identity and authenticated
//! flag are persisted across restarts; loading/error transients are not.

use std::sync::{Arc, Mutex, MutexGuard};

use lookym_api::{Backend, ProfileChanges};
use lookym_shared::error::{ClientError, Result};
use lookym_shared::models::{Role, User};
use lookym_store::{AuthSnapshot, Database};

use crate::convert::{auth_err, write_err};

/// Observable auth state. Read by whole-value clone, written by whole-value
/// substitution; a reader never sees a torn update.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub current_user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct AuthStore {
    backend: Arc<dyn Backend>,
    db: Option<Arc<Database>>,
    state: Mutex<AuthState>,
}

impl AuthStore {
    /// Build the container, rehydrating the persisted identity before any
    /// network call can complete.
    pub fn new(backend: Arc<dyn Backend>, db: Option<Arc<Database>>) -> Self {
        let mut state = AuthState::default();

        if let Some(db) = &db {
            match db.load_auth_snapshot() {
                Ok(Some(snapshot)) => {
                    state.current_user = snapshot.current_user;
                    state.is_authenticated = snapshot.is_authenticated;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "failed to hydrate auth state"),
            }
        }

        Self {
            backend,
            db,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().current_user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    /// Clear any previous error and raise the loading flag.
    fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    fn finish_signed_in(&self, user: User) {
        {
            let mut state = self.lock();
            state.current_user = Some(user);
            state.is_authenticated = true;
            state.is_loading = false;
        }
        self.persist();
    }

    fn finish_signed_out(&self) {
        {
            let mut state = self.lock();
            state.current_user = None;
            state.is_authenticated = false;
            state.is_loading = false;
        }
        self.persist();
    }

    fn finish_err(&self, error: &ClientError) {
        let mut state = self.lock();
        state.error = Some(error.to_string());
        state.is_loading = false;
    }

    /// Write the whitelisted snapshot. The operation already succeeded
    /// remotely, so a cache-write failure is logged rather than surfaced.
    fn persist(&self) {
        let Some(db) = &self.db else { return };

        let snapshot = {
            let state = self.lock();
            AuthSnapshot {
                current_user: state.current_user.clone(),
                is_authenticated: state.is_authenticated,
            }
        };

        if let Err(e) = db.save_auth_snapshot(&snapshot) {
            tracing::warn!(error = %e, "failed to persist auth snapshot");
        }
    }

    /// Sign in with email and password, replacing the current identity with
    /// the backend-confirmed profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.begin();
        let result = self.login_inner(email, password).await;
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "signed in");
                self.finish_signed_in(user);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "login failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<User> {
        let session = self
            .backend
            .sign_in(email, password)
            .await
            .map_err(auth_err)?;
        self.backend
            .get_profile(&session.user_id)
            .await
            .map_err(auth_err)
    }

    /// Same contract as [`login`], with a provider-issued identity token in
    /// place of password verification.
    ///
    /// [`login`]: AuthStore::login
    pub async fn login_with_google(&self, id_token: &str) -> Result<()> {
        self.begin();
        let result = self.google_inner(id_token).await;
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "signed in with google");
                self.finish_signed_in(user);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "google login failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    async fn google_inner(&self, id_token: &str) -> Result<User> {
        let session = self
            .backend
            .sign_in_with_google(id_token)
            .await
            .map_err(auth_err)?;
        self.backend
            .get_profile(&session.user_id)
            .await
            .map_err(auth_err)
    }

    /// Create an auth record and its profile row as one logical operation.
    ///
    /// Required-field validation happens before any network call; a profile
    /// insert failing after the auth record was created still surfaces the
    /// failure.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
        role: Role,
    ) -> Result<()> {
        if email.trim().is_empty() || password.is_empty() || username.trim().is_empty() {
            return Err(ClientError::Validation(
                "email, password and username are required".into(),
            ));
        }

        self.begin();
        let result = self.register_inner(email, password, username, role).await;
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %role, "registered");
                self.finish_signed_in(user);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "registration failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    async fn register_inner(
        &self,
        email: &str,
        password: &str,
        username: &str,
        role: Role,
    ) -> Result<User> {
        let session = self
            .backend
            .sign_up(email, password)
            .await
            .map_err(auth_err)?;

        let user = User {
            id: session.user_id,
            email: email.to_string(),
            username: username.to_string(),
            display_name: Some(username.to_string()),
            avatar_url: None,
            bio: None,
            role,
            verified: false,
        };
        self.backend
            .insert_profile(&user)
            .await
            .map_err(write_err)?;
        Ok(user)
    }

    /// Sign out. Local state is only cleared after the backend confirms, so
    /// a failed sign-out can simply be retried.
    pub async fn logout(&self) -> Result<()> {
        self.begin();
        match self.backend.sign_out().await.map_err(auth_err) {
            Ok(()) => {
                tracing::info!("signed out");
                self.finish_signed_out();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "logout failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Merge the given fields into the current profile once the backend
    /// confirms the write. Username and role are not reachable through this
    /// path.
    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<()> {
        let Some(user) = self.current_user() else {
            return Err(ClientError::NotAuthenticated);
        };

        self.begin();
        match self
            .backend
            .update_profile(&user.id, &changes)
            .await
            .map_err(write_err)
        {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    if let Some(current) = state.current_user.as_mut() {
                        if let Some(display_name) = changes.display_name {
                            current.display_name = Some(display_name);
                        }
                        if let Some(avatar_url) = changes.avatar_url {
                            current.avatar_url = Some(avatar_url);
                        }
                        if let Some(bio) = changes.bio {
                            current.bio = Some(bio);
                        }
                    }
                    state.is_loading = false;
                }
                self.persist();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "profile update failed");
                self.finish_err(&e);
                Err(e)
            }
        }
    }

    /// Re-fetch the signed-in identity. Best-effort: failures are logged and
    /// swallowed, never surfaced to the caller.
    pub async fn refresh_user(&self) {
        self.begin();
        match self.refresh_inner().await {
            Ok(Some(user)) => self.finish_signed_in(user),
            Ok(None) => self.finish_signed_out(),
            Err(e) => {
                tracing::warn!(error = %e, "refresh_user failed; keeping existing state");
                self.finish_err(&e);
            }
        }
    }

    async fn refresh_inner(&self) -> Result<Option<User>> {
        let Some(session) = self.backend.current_session().await.map_err(auth_err)? else {
            return Ok(None);
        };
        let user = self
            .backend
            .get_profile(&session.user_id)
            .await
            .map_err(auth_err)?;
        Ok(Some(user))
    }
}
