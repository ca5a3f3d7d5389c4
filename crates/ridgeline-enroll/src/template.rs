//! Accepted samples, template derivation, and the enrollment result.

use ridgeline_core::TemplateId;
use ridgeline_transport::RawCapture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One accepted capture, in capture order.
///
/// Samples are transient: they exist between acceptance and finalization
/// and are discarded afterwards (or immediately, on cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSample {
    /// Position in the accepted sequence, starting at 0.
    pub index: u32,

    /// Quality score the capture was accepted at.
    pub quality: u8,

    /// Opaque template fragment from the device.
    pub data: Vec<u8>,
}

impl CaptureSample {
    /// Build an accepted sample from a raw capture.
    #[must_use]
    pub fn from_raw(index: u32, raw: RawCapture) -> Self {
        Self {
            index,
            quality: raw.quality,
            data: raw.data,
        }
    }
}

/// Final output of a successful enrollment. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    /// Globally unique identifier assigned at finalization.
    pub template_id: TemplateId,

    /// Encoded template, derived deterministically from the accepted
    /// samples.
    pub template: Vec<u8>,

    /// Number of samples the template was derived from.
    pub sample_count: u32,
}

/// Derive the encoded template from the ordered accepted samples.
///
/// The encoding is a SHA-256 digest over a length-framed serialization of
/// every sample (index, quality, fragment length, fragment bytes), so the
/// output is deterministic in both sample content and capture order.
///
/// # Examples
///
/// ```
/// use ridgeline_enroll::{CaptureSample, derive_template};
///
/// let samples = vec![CaptureSample { index: 0, quality: 90, data: vec![1, 2, 3] }];
/// assert_eq!(derive_template(&samples), derive_template(&samples));
/// ```
#[must_use]
pub fn derive_template(samples: &[CaptureSample]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update((samples.len() as u32).to_be_bytes());

    for sample in samples {
        hasher.update(sample.index.to_be_bytes());
        hasher.update([sample.quality]);
        hasher.update((sample.data.len() as u32).to_be_bytes());
        hasher.update(&sample.data);
    }

    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: u32, quality: u8, data: Vec<u8>) -> CaptureSample {
        CaptureSample {
            index,
            quality,
            data,
        }
    }

    #[test]
    fn test_template_is_deterministic() {
        let samples = vec![
            sample(0, 90, vec![1, 2, 3]),
            sample(1, 85, vec![4, 5, 6]),
            sample(2, 95, vec![7, 8, 9]),
        ];

        assert_eq!(derive_template(&samples), derive_template(&samples));
    }

    #[test]
    fn test_template_depends_on_order() {
        let forward = vec![sample(0, 90, vec![1, 2, 3]), sample(1, 85, vec![4, 5, 6])];
        let reversed = vec![sample(0, 85, vec![4, 5, 6]), sample(1, 90, vec![1, 2, 3])];

        assert_ne!(derive_template(&forward), derive_template(&reversed));
    }

    #[test]
    fn test_template_depends_on_content() {
        let a = vec![sample(0, 90, vec![1, 2, 3])];
        let b = vec![sample(0, 90, vec![1, 2, 4])];
        let c = vec![sample(0, 91, vec![1, 2, 3])];

        assert_ne!(derive_template(&a), derive_template(&b));
        assert_ne!(derive_template(&a), derive_template(&c));
    }

    #[test]
    fn test_length_framing_separates_fragments() {
        // Same concatenated bytes, split differently across samples.
        let joined = vec![sample(0, 80, vec![1, 2, 3, 4])];
        let split = vec![sample(0, 80, vec![1, 2]), sample(1, 80, vec![3, 4])];

        assert_ne!(derive_template(&joined), derive_template(&split));
    }

    #[test]
    fn test_template_length_is_digest_size() {
        let samples = vec![sample(0, 90, vec![0u8; 512])];
        assert_eq!(derive_template(&samples).len(), 32);
    }

    #[test]
    fn test_sample_from_raw_preserves_payload() {
        let raw = RawCapture::new(vec![7, 7, 7], 66).unwrap();
        let sample = CaptureSample::from_raw(3, raw);

        assert_eq!(sample.index, 3);
        assert_eq!(sample.quality, 66);
        assert_eq!(sample.data, vec![7, 7, 7]);
    }
}
