use serde::{Deserialize, Serialize};

use crate::auth::store::User;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Request body for signin.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Request body for redeeming a verification code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptCodeRequest {
    pub email: String,
    pub provided_code: u64,
}

/// Request body for changing the password of the signed-in user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Request body for requesting a password-reset code.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for redeeming a password-reset code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub provided_code: u64,
    pub new_password: String,
}

/// Envelope for operations that return only an outcome.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Signup echoes the created account under `result`.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: &'static str,
    pub result: User,
}

/// Signin returns the token in the body besides the cookie.
#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
}
