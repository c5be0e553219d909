// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::threat::{ThreatOption, find_threat_type},
    services::geometry::Point,
};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Opaque image reference (URL, path or data URI) chosen by the uploader.
    pub image_url: String,

    pub has_threat: bool,

    /// Taxonomy id of the hidden item; only set when `has_threat`.
    pub threat_type: Option<String>,

    /// Legacy point mode: the threat's normalized center.
    pub coordinate_x: Option<f64>,
    pub coordinate_y: Option<f64>,

    /// Polygon mode: normalized outline of the threat.
    /// Stored as a JSON array of `{x, y}` objects.
    pub threat_polygon: Option<Json<Vec<Point>>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Where the threat is located in the image.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Point(Point),
    Polygon(Vec<Point>),
}

/// The curated correct answer for a question, derived from its stored columns.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundTruth {
    Clean,
    Threat {
        /// `None` only for malformed rows; such questions can never be answered correctly.
        threat_type: Option<String>,
        /// `None` when the admin did not mark a location.
        location: Option<Location>,
    },
}

impl Question {
    pub fn ground_truth(&self) -> GroundTruth {
        if !self.has_threat {
            return GroundTruth::Clean;
        }

        let polygon = self
            .threat_polygon
            .as_ref()
            .map(|p| p.0.clone())
            .filter(|p| p.len() >= 3);

        let location = match (polygon, self.coordinate_x, self.coordinate_y) {
            (Some(polygon), _, _) => Some(Location::Polygon(polygon)),
            (None, Some(x), Some(y)) => Some(Location::Point(Point { x, y })),
            _ => None,
        };

        GroundTruth::Threat {
            threat_type: self.threat_type.clone(),
            location,
        }
    }
}

/// DTO for sending a question to the exam runner.
/// Carries no ground truth: neither the threat type nor its location.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub image_url: String,
    pub options: Vec<ThreatOption>,
    pub time_limit_seconds: u32,
}

/// DTO for creating or replacing a question.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 4096, message = "Image reference is required"))]
    pub image_url: String,
    #[serde(default)]
    pub has_threat: bool,
    pub threat_type: Option<String>,
    pub coordinate_x: Option<f64>,
    pub coordinate_y: Option<f64>,
    pub threat_polygon: Option<Vec<Point>>,
}

/// A validated question ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub image_url: String,
    pub has_threat: bool,
    pub threat_type: Option<String>,
    pub coordinate_x: Option<f64>,
    pub coordinate_y: Option<f64>,
    pub threat_polygon: Option<Vec<Point>>,
}

fn is_normalized(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl QuestionRequest {
    /// Validates the request and normalizes it so the stored row honors the
    /// ground-truth invariants. Clean questions drop any threat fields.
    pub fn into_new_question(self) -> AppResult<NewQuestion> {
        self.validate()?;

        if self.image_url.trim().is_empty() {
            return Err(AppError::Validation("Image reference is required".to_string()));
        }

        if !self.has_threat {
            return Ok(NewQuestion {
                image_url: self.image_url,
                has_threat: false,
                threat_type: None,
                coordinate_x: None,
                coordinate_y: None,
                threat_polygon: None,
            });
        }

        let threat_type = self
            .threat_type
            .ok_or_else(|| AppError::Validation("Threat type is required".to_string()))?;
        if find_threat_type(&threat_type).is_none() {
            return Err(AppError::Validation(format!(
                "Unknown threat type '{}'",
                threat_type
            )));
        }

        let point = match (self.coordinate_x, self.coordinate_y) {
            (Some(x), Some(y)) => Some(Point { x, y }),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "Point mode requires both coordinate_x and coordinate_y".to_string(),
                ));
            }
        };

        if point.is_some() && self.threat_polygon.is_some() {
            return Err(AppError::Validation(
                "Use either a point or a polygon, not both".to_string(),
            ));
        }

        if let Some(p) = &point {
            if !is_normalized(p.x) || !is_normalized(p.y) {
                return Err(AppError::Validation(
                    "Coordinates must be within [0, 1]".to_string(),
                ));
            }
        }

        if let Some(polygon) = &self.threat_polygon {
            if polygon.len() < 3 {
                return Err(AppError::Validation(
                    "Polygon mode requires at least 3 points".to_string(),
                ));
            }
            if polygon.iter().any(|p| !is_normalized(p.x) || !is_normalized(p.y)) {
                return Err(AppError::Validation(
                    "Polygon points must be within [0, 1]".to_string(),
                ));
            }
        }

        Ok(NewQuestion {
            image_url: self.image_url,
            has_threat: true,
            threat_type: Some(threat_type),
            coordinate_x: point.map(|p| p.x),
            coordinate_y: point.map(|p| p.y),
            threat_polygon: self.threat_polygon,
        })
    }
}
