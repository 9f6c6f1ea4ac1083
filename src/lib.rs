#![deny(clippy::all, clippy::cargo, clippy::expect_used, clippy::unwrap_used)]
#![deny(clippy::pedantic, clippy::nursery, unsafe_code)]
#![warn(clippy::unimplemented, clippy::redundant_type_annotations)]

use std::io::BufRead;

pub mod algo;
pub mod core;
pub mod data;
mod error;
pub mod solver;

pub use error::{Error, ErrorKind, Result};

/// Reads a schedule document from the reader and returns its score breakdown,
/// evaluated with the weights carried by the document or the default ones.
///
/// # Errors
/// - If the document could not be read or decoded.
pub fn analyze_reader(reader: &mut impl BufRead) -> Result<core::ScoreAnalysis> {
    let document: data::ScheduleDocument = data::deserialize(reader)?;
    let weights = document.constraint_weights.unwrap_or_default();
    let schedule = document.into_schedule()?;
    Ok(core::analyze(&schedule, &weights))
}

#[cfg(not(target_pointer_width = "64"))]
compile_error!("Must be 64-bit system!");

/// Casts the given value to `u128`.
/// It should never fail on 64-bit systems.
#[must_use]
pub fn cast_u128(value: usize) -> u128 {
    u128::try_from(value).unwrap_or_else(|_| unreachable!("Must be 64-bit system!"))
}

/// Casts a penalty to `i64`, saturating at `i64::MAX`.
#[must_use]
pub fn cast_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn analyze_reader_uses_document_weights() -> anyhow::Result<()> {
        let document = r#"{
            "resources": [{"name": "Bob", "capacity": 50, "skills": ["java"]}],
            "tasks": [
                {"id": "1", "name": "a", "duration": 30, "resource": "Bob"},
                {"id": "2", "name": "b", "duration": 40, "resource": "Bob"}
            ],
            "constraintWeights": {"minimizeDuration": 0, "balanceLoad": 0}
        }"#;
        let analysis = analyze_reader(&mut std::io::Cursor::new(document))?;
        assert_eq!(analysis.score, core::HardSoftScore::of_hard(-20));
        Ok(())
    }

    #[test]
    fn cast_i64_saturates() {
        assert_eq!(cast_i64(45), 45);
        assert_eq!(cast_i64(u64::MAX), i64::MAX);
    }
}
