// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_router;

use crate::{config::Config, error::AppResult, store::ExamStore, utils::hash::hash_password};

/// Creates the configured administrator on first start. Existing accounts are left alone.
pub async fn seed_admin(store: &dyn ExamStore, config: &Config) -> AppResult<()> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    if store.find_admin_by_username(username).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", username);
    let hashed_password = hash_password(password)?;
    let display_name = config.admin_display_name.as_deref().unwrap_or(username.as_str());
    store
        .insert_admin(username, &hashed_password, display_name)
        .await?;
    tracing::info!("Admin user created successfully.");
    Ok(())
}
