// src/models/mod.rs

pub mod assignment;
pub mod attempt;
pub mod login_token;
pub mod package;
pub mod question;
pub mod threat;
pub mod user;
