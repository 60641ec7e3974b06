use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::dtos::SettingsResponse;
use crate::models::UpdateSettings;
use crate::pdf::merge_with_defaults;
use crate::AppState;

pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let settings = state.workshop.settings().await?;
    let company = merge_with_defaults(Some(&settings));
    Ok(Json(SettingsResponse { settings, company }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettings>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.workshop.update_settings(payload).await?;
    tracing::info!("Application settings updated");
    let company = merge_with_defaults(Some(&settings));
    Ok(Json(SettingsResponse { settings, company }))
}
