//! Business settings endpoints.

use axum::{extract::State, Json};
use validator::Validate;

use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::aggregates::BusinessSettings;

/// Any signed-in user may read the settings; the register needs the tax rate.
pub async fn get_settings(State(state): State<AppState>, _current: CurrentUser) -> Result<Json<BusinessSettings>, AppError> {
    Ok(Json(state.store.settings().await?))
}

pub async fn save_settings(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(settings): Json<BusinessSettings>,
) -> Result<Json<BusinessSettings>, AppError> {
    current.require(Capability::Administer)?;
    settings.validate()?;
    state.store.save_settings(&settings).await?;
    tracing::info!(tax_rate = %settings.tax_rate, threshold = settings.low_stock_threshold, "settings saved");
    Ok(Json(settings))
}
