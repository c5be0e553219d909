// src/services/options.rs

use rand::{Rng, seq::SliceRandom};

use crate::models::{
    question::GroundTruth,
    threat::ThreatOption,
};

/// Number of multiple-choice entries shown per question.
pub const OPTION_COUNT: usize = 4;

/// Builds the shuffled multiple-choice set for one question.
///
/// For a threat whose type is in `taxonomy`, the correct entry plus three distinct
/// distractors. Otherwise (clean question, or a type missing from the taxonomy)
/// four distinct entries picked at random. The result says nothing about which
/// entry, if any, is correct.
pub fn build_options<R: Rng + ?Sized>(
    truth: &GroundTruth,
    taxonomy: &[ThreatOption],
    rng: &mut R,
) -> Vec<ThreatOption> {
    let correct = match truth {
        GroundTruth::Threat {
            threat_type: Some(id),
            ..
        } => taxonomy.iter().find(|t| t.id == id.as_str()).copied(),
        _ => None,
    };

    let mut options = match correct {
        Some(correct) => {
            let mut distractors: Vec<ThreatOption> = taxonomy
                .iter()
                .filter(|t| t.id != correct.id)
                .copied()
                .collect();
            distractors.shuffle(rng);
            distractors.truncate(OPTION_COUNT - 1);

            let mut options = Vec::with_capacity(OPTION_COUNT);
            options.push(correct);
            options.extend(distractors);
            options
        }
        None => {
            let mut pool = taxonomy.to_vec();
            pool.shuffle(rng);
            pool.truncate(OPTION_COUNT);
            pool
        }
    };

    // Final shuffle so the correct entry has no fixed slot.
    options.shuffle(rng);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::threat::THREAT_TYPES;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::{HashMap, HashSet};

    fn threat(id: &str) -> GroundTruth {
        GroundTruth::Threat {
            threat_type: Some(id.to_string()),
            location: None,
        }
    }

    fn assert_distinct(options: &[ThreatOption]) {
        let ids: HashSet<_> = options.iter().map(|o| o.id).collect();
        assert_eq!(ids.len(), options.len(), "duplicate option in {:?}", options);
    }

    #[test]
    fn threat_question_contains_the_correct_option_once() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let options = build_options(&threat("bicak"), &THREAT_TYPES, &mut rng);
            assert_eq!(options.len(), OPTION_COUNT);
            assert_eq!(options.iter().filter(|o| o.id == "bicak").count(), 1);
            assert_distinct(&options);
        }
    }

    #[test]
    fn clean_question_gets_four_distinct_options() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let options = build_options(&GroundTruth::Clean, &THREAT_TYPES, &mut rng);
            assert_eq!(options.len(), OPTION_COUNT);
            assert_distinct(&options);
        }
    }

    #[test]
    fn unknown_or_missing_type_is_treated_as_clean() {
        let mut rng = StdRng::seed_from_u64(3);
        let missing = GroundTruth::Threat {
            threat_type: None,
            location: None,
        };
        for truth in [missing, threat("laser")] {
            let options = build_options(&truth, &THREAT_TYPES, &mut rng);
            assert_eq!(options.len(), OPTION_COUNT);
            assert_distinct(&options);
        }
    }

    #[test]
    fn correct_option_position_varies() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut positions = HashMap::new();
        for _ in 0..400 {
            let options = build_options(&threat("makas"), &THREAT_TYPES, &mut rng);
            let pos = options.iter().position(|o| o.id == "makas").unwrap();
            *positions.entry(pos).or_insert(0) += 1;
        }
        assert_eq!(positions.len(), OPTION_COUNT);
        assert!(positions.values().all(|&n| n > 50), "skewed: {:?}", positions);
    }

    #[test]
    fn distractors_cover_the_taxonomy() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = HashSet::new();
        for _ in 0..300 {
            for option in build_options(&threat("mermi"), &THREAT_TYPES, &mut rng) {
                seen.insert(option.id);
            }
        }
        assert_eq!(seen.len(), THREAT_TYPES.len());
    }
}
