// src/services/scoring.rs

use crate::{
    models::{
        attempt::Choice,
        question::{GroundTruth, Location},
    },
    services::geometry::{Point, point_in_polygon},
};

/// Maximum point-mode distance (normalized) still counted as a hit.
pub const POINT_HIT_RADIUS: f64 = 0.05;

/// Absorbs float noise in the distance so that exactly `POINT_HIT_RADIUS` is a hit.
const DISTANCE_SLACK: f64 = 1e-9;

/// Distance recorded for a polygon-mode click that lands outside the outline.
pub const POLYGON_MISS_DISTANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub is_correct: bool,
    /// `None` when no location was compared (clean question, wrong type, no click).
    pub distance: Option<f64>,
}

impl Grade {
    fn wrong() -> Self {
        Grade {
            is_correct: false,
            distance: None,
        }
    }
}

/// Grades one answer against ground truth.
///
/// A threat needs the right type and a click. When the question has a stored
/// location the click must hit it; otherwise any click will do.
pub fn grade_answer(truth: &GroundTruth, choice: &Choice, click: Option<Point>) -> Grade {
    match truth {
        GroundTruth::Clean => Grade {
            is_correct: *choice == Choice::Clean,
            distance: None,
        },
        GroundTruth::Threat {
            threat_type,
            location,
        } => {
            let type_matches = match (threat_type, choice) {
                (Some(expected), Choice::Threat(given)) => expected == given,
                _ => false,
            };
            if !type_matches {
                return Grade::wrong();
            }

            let Some(click) = click else {
                return Grade::wrong();
            };
            let Some(location) = location else {
                return Grade {
                    is_correct: true,
                    distance: None,
                };
            };

            match location {
                Location::Polygon(polygon) => {
                    if point_in_polygon(click, polygon) {
                        Grade {
                            is_correct: true,
                            distance: Some(0.0),
                        }
                    } else {
                        Grade {
                            is_correct: false,
                            distance: Some(POLYGON_MISS_DISTANCE),
                        }
                    }
                }
                Location::Point(center) => {
                    let distance = click.distance_to(*center);
                    Grade {
                        is_correct: distance <= POINT_HIT_RADIUS + DISTANCE_SLACK,
                        distance: Some(distance),
                    }
                }
            }
        }
    }
}

/// Percentage of correct answers. An exam without questions scores 0.
pub fn compute_score(correct_count: usize, total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (correct_count as f64 * 100.0) / total_questions as f64
}
