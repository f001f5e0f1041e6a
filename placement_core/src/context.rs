//! Per-run generation context handed to every stage and tag predicate.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::adapter::EngineAdapter;
use crate::grid::GridDims;
use crate::rng::LabelRng;
use crate::tags::TagError;

/// Published artifacts keyed by tag id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactStore {
    entries: BTreeMap<String, JsonValue>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish<T: Serialize>(&mut self, tag_id: &str, value: &T) -> Result<(), TagError> {
        let json = serde_json::to_value(value).map_err(|err| TagError::InvalidArtifact {
            id: tag_id.to_string(),
            message: err.to_string(),
        })?;
        self.entries.insert(tag_id.to_string(), json);
        Ok(())
    }

    pub fn insert_raw(&mut self, tag_id: &str, value: JsonValue) {
        self.entries.insert(tag_id.to_string(), value);
    }

    pub fn get(&self, tag_id: &str) -> Option<&JsonValue> {
        self.entries.get(tag_id)
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.entries.contains_key(tag_id)
    }

    /// Decode an artifact into its typed form.
    pub fn read<T: DeserializeOwned>(&self, tag_id: &str) -> Result<T, TagError> {
        let value = self
            .entries
            .get(tag_id)
            .ok_or_else(|| TagError::MissingArtifact(tag_id.to_string()))?;
        T::deserialize(value).map_err(|err| TagError::InvalidArtifact {
            id: tag_id.to_string(),
            message: err.to_string(),
        })
    }
}

/// Raw per-tile buffers produced by earlier generation phases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFields {
    pub terrain: Option<Vec<i32>>,
    pub elevation: Option<Vec<i32>>,
    pub rainfall: Option<Vec<f32>>,
    pub temperature: Option<Vec<f32>>,
}

pub struct MapContext<A> {
    pub dims: GridDims,
    pub rng: LabelRng,
    pub artifacts: ArtifactStore,
    pub fields: MapFields,
    pub adapter: A,
}

impl<A: EngineAdapter> MapContext<A> {
    /// Dimensions are taken from the adapter.
    pub fn new(adapter: A, seed: u64) -> Self {
        Self {
            dims: adapter.dims(),
            rng: LabelRng::new(seed),
            artifacts: ArtifactStore::new(),
            fields: MapFields::default(),
            adapter,
        }
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;
    use crate::grid_adapter::GridAdapter;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        count: u32,
    }

    #[test]
    fn publish_then_read_typed() {
        let mut store = ArtifactStore::new();
        store.publish("artifact:sample@v1", &Sample { count: 4 }).unwrap();
        let sample: Sample = store.read("artifact:sample@v1").unwrap();
        assert_eq!(sample, Sample { count: 4 });
    }

    #[test]
    fn read_reports_missing_and_malformed() {
        let mut store = ArtifactStore::new();
        assert_eq!(
            store.read::<Sample>("artifact:sample@v1").unwrap_err(),
            TagError::MissingArtifact("artifact:sample@v1".into())
        );
        store.insert_raw("artifact:sample@v1", json!({ "count": -2 }));
        assert!(matches!(
            store.read::<Sample>("artifact:sample@v1").unwrap_err(),
            TagError::InvalidArtifact { .. }
        ));
    }

    #[test]
    fn context_takes_dims_from_adapter() {
        let adapter = GridAdapter::new(GridDims::new(6, 4).unwrap());
        let ctx = MapContext::new(adapter, 99);
        assert_eq!(ctx.dims, GridDims::new(6, 4).unwrap());
        assert_eq!(ctx.seed(), 99);
    }
}
