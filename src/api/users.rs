//! Staff account management (admin only).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::auth::hash_password_blocking;
use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::aggregates::{User, UserDraft};

pub async fn list_users(State(state): State<AppState>, current: CurrentUser) -> Result<Json<Vec<User>>, AppError> {
    current.require(Capability::Administer)?;
    Ok(Json(state.store.list_users().await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<UserDraft>,
) -> Result<(StatusCode, Json<User>), AppError> {
    current.require(Capability::Administer)?;
    draft.validate()?;
    let password = draft.password.clone().ok_or_else(|| AppError::BadRequest("A password is required".to_string()))?;
    let user = User::new(&draft, hash_password_blocking(password).await?);
    state.store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(draft): Json<UserDraft>,
) -> Result<Json<User>, AppError> {
    current.require(Capability::Administer)?;
    draft.validate()?;
    if id == current.user.id && (!draft.is_active || draft.role != current.user.role) {
        return Err(AppError::BadRequest("You cannot demote or deactivate your own account".to_string()));
    }
    let mut user = state.store.get_user(id).await?;
    user.apply(&draft);
    if let Some(password) = draft.password {
        user.hashed_password = hash_password_blocking(password).await?;
    }
    state.store.update_user(&user).await?;
    tracing::info!(user_id = %id, role = %user.role, active = user.is_active, "user updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    current.require(Capability::Administer)?;
    if id == current.user.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }
    state.store.delete_user(id).await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
