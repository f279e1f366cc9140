use crate::models::FaceDescriptor;

/// Result of comparing a probe against a user's enrolled descriptors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Smallest Euclidean distance to any comparable enrolled descriptor.
    pub distance: Option<f32>,
}

/// Compare `probe` with every enrolled descriptor and keep the closest.
///
/// A match requires the smallest distance to be strictly below `threshold`.
/// Descriptors of a different length (for example written by another encoder)
/// are skipped.
pub fn best_match(probe: &FaceDescriptor, enrolled: &[FaceDescriptor], threshold: f32) -> MatchOutcome {
    let distance = enrolled
        .iter()
        .filter_map(|candidate| probe.euclidean_distance(candidate))
        .filter(|d| d.is_finite())
        .min_by(|a, b| a.total_cmp(b));

    MatchOutcome {
        matched: distance.is_some_and(|d| d < threshold),
        distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(values: &[f32]) -> FaceDescriptor {
        FaceDescriptor::new(values.to_vec())
    }

    #[test]
    fn picks_closest_descriptor() {
        let probe = d(&[0.0, 0.0]);
        let outcome = best_match(&probe, &[d(&[3.0, 4.0]), d(&[0.3, 0.4])], 0.6);
        assert!((outcome.distance.unwrap() - 0.5).abs() < 1e-6);
        assert!(outcome.matched);
    }

    #[test]
    fn distance_equal_to_threshold_is_not_a_match() {
        let outcome = best_match(&d(&[0.0, 0.0]), &[d(&[3.0, 4.0])], 5.0);
        assert_eq!(outcome.distance, Some(5.0));
        assert!(!outcome.matched);
    }

    #[test]
    fn mismatched_lengths_are_skipped() {
        let outcome = best_match(&d(&[0.0, 0.0]), &[d(&[0.0, 0.0, 0.0])], 1.0);
        assert_eq!(outcome, MatchOutcome { matched: false, distance: None });
    }

    #[test]
    fn no_enrolled_descriptors_never_match() {
        let outcome = best_match(&d(&[1.0]), &[], 10.0);
        assert!(!outcome.matched);
    }
}
