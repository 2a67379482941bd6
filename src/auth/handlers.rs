use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, StatusCode},
    routing::{patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AcceptCodeRequest, ChangePasswordRequest, ForgotPasswordRequest, MessageResponse,
            ResetPasswordRequest, SigninRequest, SigninResponse, SignupRequest, SignupResponse,
        },
        service,
        session::{clear_session_cookie, session_cookie, AuthSession, SessionKeys},
        validation::normalize_email,
    },
    error::{ApiError, ValidationError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/logout", post(logout))
        .route("/send-verification-code", patch(send_verification_code))
        .route("/verify-verification-code", post(verify_verification_code))
        .route("/change-password", patch(change_password))
        .route("/send-forgot-password-code", patch(send_forgot_password_code))
        .route(
            "/verify-forgot-password-code",
            post(verify_forgot_password_code),
        )
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Option<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let Json(mut payload) = payload.ok_or(ValidationError::Body)?;
    payload.email = normalize_email(&payload.email);

    let user = service::signup(&state, &payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "Account created successfully",
            result: user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    payload: Option<Json<SigninRequest>>,
) -> Result<(HeaderMap, Json<SigninResponse>), ApiError> {
    let Json(mut payload) = payload.ok_or(ValidationError::Body)?;
    payload.email = normalize_email(&payload.email);

    let keys = SessionKeys::from_ref(&state);
    let token = service::signin(&state, &keys, &payload.email, &payload.password).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, keys.max_age_secs(), state.config.secure_cookies)?,
    );
    Ok((
        headers,
        Json(SigninResponse {
            success: true,
            message: "Login successfully",
            token,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    _session: AuthSession,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        clear_session_cookie(state.config.secure_cookies)?,
    );
    Ok((
        headers,
        Json(MessageResponse {
            success: true,
            message: "User logged out successfully",
        }),
    ))
}

/// The address the code goes to comes from the session, not the body.
#[instrument(skip_all)]
pub async fn send_verification_code(
    State(state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Result<Json<MessageResponse>, ApiError> {
    service::send_verification_code(&state, &claims.email).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Verification code sent successfully",
    }))
}

#[instrument(skip_all)]
pub async fn verify_verification_code(
    State(state): State<AppState>,
    _session: AuthSession,
    payload: Option<Json<AcceptCodeRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(mut payload) = payload.ok_or(ValidationError::Body)?;
    payload.email = normalize_email(&payload.email);

    service::verify_verification_code(&state, &payload.email, payload.provided_code).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "User verified successfully",
    }))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthSession(claims): AuthSession,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload.ok_or(ValidationError::Body)?;

    service::change_password(
        &state,
        &claims,
        &payload.old_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Password updated successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_forgot_password_code(
    State(state): State<AppState>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(mut payload) = payload.ok_or(ValidationError::Body)?;
    payload.email = normalize_email(&payload.email);

    service::send_forgot_password_code(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Forgot password code sent successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_forgot_password_code(
    State(state): State<AppState>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(mut payload) = payload.ok_or(ValidationError::Body)?;
    payload.email = normalize_email(&payload.email);

    service::verify_forgot_password_code(
        &state,
        &payload.email,
        payload.provided_code,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Password updated successfully",
    }))
}
