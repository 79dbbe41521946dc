use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::{EvalError, Result};
use crate::feature::{ClientFeatures, FeatureDefinition, Segment};

/// Read access to feature and segment definitions.
pub trait Repository: Send + Sync {
    fn get_toggle(&self, name: &str) -> Option<&FeatureDefinition>;

    /// All features, in the order they were loaded.
    fn get_toggles(&self) -> Vec<&FeatureDefinition>;

    fn get_segment(&self, id: u64) -> Option<&Segment>;
}

/// Repository backed by one client-features document held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    features: Vec<FeatureDefinition>,
    by_name: HashMap<String, usize>,
    segments: HashMap<u64, Segment>,
}

impl InMemoryRepository {
    /// Index a client-features document. Feature names must be unique.
    pub fn new(doc: ClientFeatures) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(doc.features.len());
        for (i, feature) in doc.features.iter().enumerate() {
            if by_name.insert(feature.name.clone(), i).is_some() {
                return Err(EvalError::NameExists(format!(
                    "feature '{}' is defined more than once",
                    feature.name
                )));
            }
        }
        let segments = doc.segments.into_iter().map(|s| (s.id, s)).collect();
        debug!(features = doc.features.len(), "loaded feature definitions");
        Ok(Self {
            features: doc.features,
            by_name,
            segments,
        })
    }

    pub fn from_features(features: Vec<FeatureDefinition>, segments: Vec<Segment>) -> Result<Self> {
        Self::new(ClientFeatures {
            features,
            segments,
            ..ClientFeatures::default()
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ClientFeatures = serde_json::from_str(json)?;
        Self::new(doc)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Repository for InMemoryRepository {
    fn get_toggle(&self, name: &str) -> Option<&FeatureDefinition> {
        self.by_name.get(name).map(|&i| &self.features[i])
    }

    fn get_toggles(&self) -> Vec<&FeatureDefinition> {
        self.features.iter().collect()
    }

    fn get_segment(&self, id: u64) -> Option<&Segment> {
        self.segments.get(&id)
    }
}
