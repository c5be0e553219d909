// src/handlers/admin.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        package::{AutoPackageRequest, CreatePackageRequest},
        question::QuestionRequest,
        threat::THREAT_TYPES,
    },
    services::packages,
    store::DynStore,
};

/// Lists the whole question catalog, ground truth included, newest first.
/// Admin only.
pub async fn list_questions(State(store): State<DynStore>) -> AppResult<impl IntoResponse> {
    Ok(Json(store.list_questions().await?))
}

pub async fn get_question(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let question = store
        .find_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    Ok(Json(question))
}

/// Creates a question.
/// Admin only.
pub async fn create_question(
    State(store): State<DynStore>,
    Json(payload): Json<QuestionRequest>,
) -> AppResult<impl IntoResponse> {
    let question = payload.into_new_question()?;
    let id = store.insert_question(&question).await?;
    tracing::info!("Question {} created (threat: {})", id, question.has_threat);

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Replaces a question's image and ground truth.
/// Admin only.
pub async fn update_question(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionRequest>,
) -> AppResult<impl IntoResponse> {
    let question = payload.into_new_question()?;
    if !store.update_question(id, &question).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    tracing::info!("Question {} updated", id);

    Ok(StatusCode::OK)
}

/// Deletes a question and drops it from every package.
/// Admin only.
pub async fn delete_question(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    tracing::info!("Question {} deleted", id);

    Ok(StatusCode::NO_CONTENT)
}

/// The fixed threat taxonomy, for the question editor.
pub async fn list_threat_types() -> impl IntoResponse {
    Json(THREAT_TYPES)
}

pub async fn list_packages(State(store): State<DynStore>) -> AppResult<impl IntoResponse> {
    Ok(Json(packages::list_packages(store.as_ref()).await?))
}

pub async fn get_package(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(packages::get_package(store.as_ref(), id).await?))
}

pub async fn create_package(
    State(store): State<DynStore>,
    Json(payload): Json<CreatePackageRequest>,
) -> AppResult<impl IntoResponse> {
    let created = packages::create_package(store.as_ref(), payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": created.id,
            "question_count": created.question_ids.len()
        })),
    ))
}

/// Samples a package from the catalog. The body is optional.
pub async fn auto_generate_package(
    State(store): State<DynStore>,
    State(config): State<Config>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let req: AutoPackageRequest = if body.is_empty() {
        AutoPackageRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let size = req.size.unwrap_or(config.exam.auto_package_size);
    let created = packages::auto_generate_package(store.as_ref(), size, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": created.id,
            "question_ids": created.question_ids
        })),
    ))
}

pub async fn delete_package(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    packages::delete_package(store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
