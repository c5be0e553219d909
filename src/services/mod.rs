// src/services/mod.rs

pub mod assignments;
pub mod codes;
pub mod exam_session;
pub mod exams;
pub mod geometry;
pub mod options;
pub mod packages;
pub mod scoring;
