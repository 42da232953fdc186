use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::analytics::{UsageSummary, VolumeStat};
use crate::services::OwnerIdentity;
use crate::AppState;

#[derive(Deserialize)]
pub struct WindowParams {
    /// Aggregation window in hours. Default 24, capped at 30 days.
    pub hours: Option<i32>,
}

impl WindowParams {
    fn hours(&self) -> i32 {
        self.hours.unwrap_or(24).clamp(1, 720)
    }
}

/// GET /api/v1/analytics/usage — aggregate fill counts over a window
pub async fn get_usage_summary(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Query(params): Query<WindowParams>,
) -> Result<Json<UsageSummary>, AppError> {
    let summary = state
        .tokens
        .usage_summary(owner.id, params.hours())
        .await?;

    Ok(Json(summary))
}

/// GET /api/v1/analytics/volume — hourly fill volume over a window
pub async fn get_usage_volume(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerIdentity>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<VolumeStat>>, AppError> {
    let volume = state
        .tokens
        .usage_volume(owner.id, params.hours())
        .await?;

    Ok(Json(volume))
}
