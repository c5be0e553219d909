// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    config::Config,
    error::AppResult,
    models::attempt::SubmitExamRequest,
    services::{assignments, exams},
    store::DynStore,
    utils::jwt::Claims,
};

/// Assignments of the logged-in screener, newest first.
pub async fn my_assignments(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let sicil = claims.sicil()?;
    Ok(Json(
        assignments::assignments_for_subject(store.as_ref(), sicil, Utc::now()).await?,
    ))
}

pub async fn get_exam(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let sicil = claims.sicil()?;
    Ok(Json(
        exams::fetch_exam(store.as_ref(), &config.exam, id, sicil, Utc::now()).await?,
    ))
}

pub async fn get_question(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        exams::fetch_question(store.as_ref(), &config.exam, id).await?,
    ))
}

/// Grades and finalizes the exam. Accepted once per assignment.
pub async fn submit_exam(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitExamRequest>,
) -> AppResult<impl IntoResponse> {
    let sicil = claims.sicil()?;
    let result = exams::submit_exam(
        store.as_ref(),
        &config.exam,
        id,
        sicil,
        payload.answers,
        Utc::now(),
    )
    .await?;

    Ok(Json(result))
}
