// src/services/codes.rs

use rand::Rng;

/// Exam login codes are six digit numbers, never starting with 0.
const CODE_RANGE: std::ops::Range<u32> = 100_000..1_000_000;

/// Attempts at drawing a code not already active before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 16;

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CODE_RANGE).to_string()
}
