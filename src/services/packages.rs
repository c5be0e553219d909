// src/services/packages.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::package::{
        CreatePackageRequest, NewPackage, PackageDetail, PackageDraft, PackageSummary,
    },
    store::ExamStore,
};

const AUTO_DESCRIPTION: &str = "Sistem tarafından otomatik oluşturuldu.";
const AUTO_DIFFICULTY: &str = "medium";

/// A package just written to the store, with its question order.
#[derive(Debug, Clone)]
pub struct CreatedPackage {
    pub id: i64,
    pub question_ids: Vec<i64>,
}

pub async fn create_package(
    store: &dyn ExamStore,
    req: CreatePackageRequest,
) -> AppResult<CreatedPackage> {
    req.validate()?;

    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let mut seen = HashSet::with_capacity(req.question_ids.len());
    if let Some(dup) = req.question_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::Validation(format!(
            "Question {} is listed more than once",
            dup
        )));
    }

    if !req.question_ids.is_empty() {
        let found: HashSet<i64> = store
            .find_questions(&req.question_ids)
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();
        let missing: Vec<String> = req
            .question_ids
            .iter()
            .filter(|id| !found.contains(*id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Unknown question ids: {}",
                missing.join(", ")
            )));
        }
    }

    let package = NewPackage {
        title: title.to_string(),
        description: req.description,
        difficulty_level: req.difficulty_level,
    };
    let id = store.insert_package(&package, &req.question_ids).await?;

    tracing::info!(
        "Package {} created with {} questions",
        id,
        req.question_ids.len()
    );
    Ok(CreatedPackage {
        id,
        question_ids: req.question_ids,
    })
}

/// Samples `size` distinct questions from the whole catalog into a new package.
/// A catalog smaller than `size` yields a package of every question.
pub async fn auto_generate_package(
    store: &dyn ExamStore,
    size: usize,
    now: DateTime<Utc>,
) -> AppResult<CreatedPackage> {
    let draft = sample_auto_package(store, size, now).await?;
    let id = store
        .insert_package(&draft.package, &draft.question_ids)
        .await?;

    tracing::info!(
        "Auto package {} generated with {} questions",
        id,
        draft.question_ids.len()
    );
    Ok(CreatedPackage {
        id,
        question_ids: draft.question_ids,
    })
}

/// Draws an auto package without writing it.
pub async fn sample_auto_package(
    store: &dyn ExamStore,
    size: usize,
    now: DateTime<Utc>,
) -> AppResult<PackageDraft> {
    if size == 0 {
        return Err(AppError::Validation(
            "Package size must be at least 1".to_string(),
        ));
    }

    let mut question_ids = store.list_question_ids().await?;
    if question_ids.is_empty() {
        return Err(AppError::InsufficientData(
            "Question catalog is empty".to_string(),
        ));
    }
    if question_ids.len() < size {
        tracing::warn!(
            "Auto package requested {} questions, catalog has {}",
            size,
            question_ids.len()
        );
    }

    {
        let mut rng = rand::thread_rng();
        question_ids.shuffle(&mut rng);
    }
    question_ids.truncate(size);

    Ok(PackageDraft {
        package: NewPackage {
            title: format!("Otomatik Sınav - {}", now.format("%d.%m.%Y")),
            description: Some(AUTO_DESCRIPTION.to_string()),
            difficulty_level: Some(AUTO_DIFFICULTY.to_string()),
        },
        question_ids,
    })
}

pub async fn list_packages(store: &dyn ExamStore) -> AppResult<Vec<PackageSummary>> {
    store.list_packages().await
}

pub async fn get_package(store: &dyn ExamStore, id: i64) -> AppResult<PackageDetail> {
    let package = store
        .find_package(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Package not found".to_string()))?;
    let question_ids = store.package_question_ids(id).await?;
    Ok(PackageDetail {
        package,
        question_ids,
    })
}

pub async fn question_count(store: &dyn ExamStore, package_id: i64) -> AppResult<i64> {
    store.count_package_questions(package_id).await
}

/// Existing assignments keep their own snapshot of the question order.
pub async fn delete_package(store: &dyn ExamStore, id: i64) -> AppResult<()> {
    if !store.delete_package(id).await? {
        return Err(AppError::NotFound("Package not found".to_string()));
    }
    tracing::info!("Package {} deleted", id);
    Ok(())
}
