// src/handlers/mod.rs

pub mod admin;
pub mod assignments;
pub mod auth;
pub mod exam;
