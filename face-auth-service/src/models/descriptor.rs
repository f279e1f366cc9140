//! Face descriptor: the fixed-length embedding a recognition model produces for one face.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceDescriptor(Vec<f32>);

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to `other`.
    ///
    /// Returns `None` when the dimensions differ: descriptors from different
    /// models live in different spaces and cannot be compared.
    pub fn euclidean_distance(&self, other: &FaceDescriptor) -> Option<f32> {
        if self.0.len() != other.0.len() {
            return None;
        }

        Some(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f32>()
                .sqrt(),
        )
    }

    /// Unit-length copy. A zero vector is returned unchanged.
    pub fn l2_normalized(&self) -> FaceDescriptor {
        let norm = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            FaceDescriptor(self.0.iter().map(|x| x / norm).collect())
        } else {
            self.clone()
        }
    }
}

impl From<Vec<f32>> for FaceDescriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
