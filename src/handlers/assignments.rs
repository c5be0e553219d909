// src/handlers/assignments.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    config::Config,
    error::AppResult,
    models::assignment::CreateAssignmentsRequest,
    services::assignments,
    store::DynStore,
    utils::jwt::Claims,
};

/// Screeners grouped red / yellow / green by their latest monthly success rate.
/// Admin only.
pub async fn classified_personnel(State(store): State<DynStore>) -> AppResult<impl IntoResponse> {
    Ok(Json(assignments::classify_personnel(store.as_ref()).await?))
}

/// Assigns a package (or freshly sampled ones) to a batch of screeners.
/// Returns the one-time login code minted for each of them.
/// Admin only.
pub async fn create_assignments(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateAssignmentsRequest>,
) -> AppResult<impl IntoResponse> {
    let assigned_by = claims.name.as_deref().unwrap_or("Admin");
    let codes = assignments::create_assignments(
        store.as_ref(),
        &config.exam,
        assigned_by,
        payload,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "codes": codes }))))
}

pub async fn tracking(State(store): State<DynStore>) -> AppResult<impl IntoResponse> {
    Ok(Json(assignments::tracking(store.as_ref(), Utc::now()).await?))
}

pub async fn assignment_detail(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        assignments::assignment_detail(store.as_ref(), id, Utc::now()).await?,
    ))
}

pub async fn delete_assignment(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    assignments::delete_assignment(store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every assignment of one screener.
/// Admin only.
pub async fn personnel_assignments(
    State(store): State<DynStore>,
    Path(sicil): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        assignments::assignments_for_subject(store.as_ref(), sicil, Utc::now()).await?,
    ))
}
