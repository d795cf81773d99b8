//! Authentication and profile endpoints

use super::{ApiRequest, ClientError, ConsoleClient};
use crate::types::{
    LoginRequest, LoginResponse, PasswordChangeRequest, ProfileResponse, ProfileUpdateRequest,
};
use console_core::{Session, SessionUser};
use reqwest::Method;
use serde::de::IgnoredAny;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/admin-api/auth/login";
pub const LOGOUT_PATH: &str = "/admin-api/auth/logout";
pub const AUTH_PROFILE_PATH: &str = "/admin-api/auth/profile";
pub const PROFILE_PATH: &str = "/admin-api/profile";
pub const PASSWORD_PATH: &str = "/admin-api/profile/password";

impl ConsoleClient {
    /// Sign in and store the returned session
    ///
    /// Login goes out without a token and a 401 here never triggers a
    /// refresh or ends the current session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Arc<Session>, ClientError> {
        let request = self
            .public
            .request(Method::POST, LOGIN_PATH)
            .json(credentials);
        let response: LoginResponse = self.public.execute(request).await?;

        let session = self.guard.session().establish(response.into())?;
        info!(user = %session.user.username, "Signed in");
        Ok(session)
    }

    /// Reload user info and permissions, keeping the current token
    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        let profile: ProfileResponse = self.send(ApiRequest::get(AUTH_PROFILE_PATH)).await?;
        self.guard
            .session()
            .update_profile(profile.user_info.clone(), profile.permissions.clone())?;
        Ok(profile)
    }

    /// Sign out on the server, then end the local session
    ///
    /// The local session is cleared and the login route shown even when the
    /// server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let outcome = self
            .send::<IgnoredAny>(ApiRequest::post(LOGOUT_PATH).without_auth_recovery())
            .await;
        if let Err(err) = &outcome {
            warn!(error = %err, "Logout call failed; clearing session locally");
        }

        self.guard.sign_out();
        self.guard.metrics().log_summary();
        Ok(())
    }

    /// Update the editable profile fields and the stored user
    pub async fn update_profile(
        &self,
        update: &ProfileUpdateRequest,
    ) -> Result<SessionUser, ClientError> {
        let user: SessionUser = self.put(PROFILE_PATH, update).await?;
        let session = self.guard.session();
        session.update_profile(user.clone(), session.permissions())?;
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChangeRequest) -> Result<(), ClientError> {
        self.put::<IgnoredAny, _>(PASSWORD_PATH, change).await?;
        info!("Password changed");
        Ok(())
    }
}
