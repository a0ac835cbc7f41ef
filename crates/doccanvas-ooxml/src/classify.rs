//! Asset classification
//!
//! Import assigns every embedded media part an [`ObjectType`] and a
//! confidence score. The heuristic is behind [`AssetClassifier`] so callers
//! can plug in a model-backed classifier without touching the mapper.

use doccanvas_model::ObjectType;

/// What a classifier gets to look at
#[derive(Debug, Clone)]
pub struct AssetCandidate<'a> {
    pub filename: &'a str,
    pub mime_type: &'a str,
    pub byte_size: u64,
    /// Drawing names and descriptions that reference this media part
    pub hints: Vec<&'a str>,
}

/// Classifier verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub object_type: ObjectType,
    pub confidence: f32,
}

impl Classification {
    /// Build a verdict, clamping confidence into `[0, 1]`
    pub fn new(object_type: ObjectType, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            object_type,
            confidence,
        }
    }
}

/// Assigns an object type to an embedded asset
pub trait AssetClassifier: Send + Sync {
    fn classify(&self, candidate: &AssetCandidate<'_>) -> Classification;
}

/// Keyword heuristic over filename and drawing metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

const KEYWORDS: &[(&str, ObjectType)] = &[
    ("logo", ObjectType::Logo),
    ("signature", ObjectType::Signature),
    ("sign", ObjectType::Signature),
    ("stamp", ObjectType::Stamp),
    ("seal", ObjectType::Stamp),
];

const VECTOR_MIMES: &[&str] = &["image/svg+xml", "image/x-emf", "image/x-wmf", "image/emf", "image/wmf"];

impl AssetClassifier for KeywordClassifier {
    fn classify(&self, candidate: &AssetCandidate<'_>) -> Classification {
        let haystack = std::iter::once(candidate.filename)
            .chain(candidate.hints.iter().copied())
            .map(str::to_lowercase)
            .collect::<Vec<_>>();

        for (keyword, object_type) in KEYWORDS {
            if haystack.iter().any(|h| h.contains(keyword)) {
                return Classification::new(*object_type, 0.8);
            }
        }

        let mime = candidate.mime_type.to_ascii_lowercase();
        if VECTOR_MIMES.contains(&mime.as_str()) {
            return Classification::new(ObjectType::Shape, 0.4);
        }

        Classification::new(ObjectType::Image, 0.5)
    }
}
