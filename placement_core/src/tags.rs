//! Dependency tags gating generation stages.
//!
//! A tag names an artifact, a field buffer or an engine effect that a stage
//! provides. Its predicate decides whether that contract currently holds.
//! Evaluation is total: predicate errors and panics both read as
//! "not satisfied".

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::adapter::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Artifact,
    Field,
    Effect,
}

impl TagKind {
    pub fn prefix(self) -> &'static str {
        match self {
            TagKind::Artifact => "artifact:",
            TagKind::Field => "field:",
            TagKind::Effect => "effect:",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::Artifact => "artifact",
            TagKind::Field => "field",
            TagKind::Effect => "effect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag {0} is already registered")]
    DuplicateTag(String),
    #[error("tag {id} does not carry the {kind} prefix")]
    KindPrefixMismatch { id: String, kind: TagKind },
    #[error("artifact {0} has not been published")]
    MissingArtifact(String),
    #[error("artifact {id} is invalid: {message}")]
    InvalidArtifact { id: String, message: String },
    #[error("field {0} is missing or has the wrong length")]
    InvalidField(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Tags recorded as satisfied so far in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SatisfactionState {
    satisfied: BTreeSet<String>,
}

impl SatisfactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag_id: &str) {
        self.satisfied.insert(tag_id.to_string());
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.satisfied.contains(tag_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.satisfied.iter().map(String::as_str)
    }
}

pub type SatisfiesFn<C> = Box<dyn Fn(&C, &SatisfactionState) -> Result<bool, TagError>>;
pub type DemoValidator = Box<dyn Fn(&JsonValue) -> bool>;

/// A synthetic value and the check it must pass, for predicate self-tests.
pub struct TagDemo {
    pub value: JsonValue,
    pub validate: DemoValidator,
}

pub struct DependencyTag<C> {
    id: String,
    kind: TagKind,
    owner: Option<String>,
    satisfies: Option<SatisfiesFn<C>>,
    demo: Option<TagDemo>,
}

impl<C> DependencyTag<C> {
    pub fn new(id: impl Into<String>, kind: TagKind) -> Self {
        Self {
            id: id.into(),
            kind,
            owner: None,
            satisfies: None,
            demo: None,
        }
    }

    pub fn artifact(id: impl Into<String>) -> Self {
        Self::new(id, TagKind::Artifact)
    }

    pub fn field(id: impl Into<String>) -> Self {
        Self::new(id, TagKind::Field)
    }

    pub fn effect(id: impl Into<String>) -> Self {
        Self::new(id, TagKind::Effect)
    }

    /// Stage responsible for providing the tag.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn satisfied_by(
        mut self,
        predicate: impl Fn(&C, &SatisfactionState) -> Result<bool, TagError> + 'static,
    ) -> Self {
        self.satisfies = Some(Box::new(predicate));
        self
    }

    pub fn with_demo(
        mut self,
        value: JsonValue,
        validate: impl Fn(&JsonValue) -> bool + 'static,
    ) -> Self {
        self.demo = Some(TagDemo {
            value,
            validate: Box::new(validate),
        });
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn has_predicate(&self) -> bool {
        self.satisfies.is_some()
    }

    pub fn demo(&self) -> Option<&TagDemo> {
        self.demo.as_ref()
    }
}

impl<C> fmt::Debug for DependencyTag<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyTag")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("has_predicate", &self.satisfies.is_some())
            .field("has_demo", &self.demo.is_some())
            .finish()
    }
}

pub struct TagRegistry<C> {
    tags: Vec<DependencyTag<C>>,
    index: HashMap<String, usize>,
}

impl<C> Default for TagRegistry<C> {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<C> TagRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append definitions. The whole batch is rejected if any id is
    /// duplicated or carries the wrong kind prefix.
    pub fn register_tags(
        &mut self,
        defs: impl IntoIterator<Item = DependencyTag<C>>,
    ) -> Result<(), TagError> {
        let defs: Vec<DependencyTag<C>> = defs.into_iter().collect();
        let mut seen = BTreeSet::new();
        for def in &defs {
            if !def.id.starts_with(def.kind.prefix()) {
                return Err(TagError::KindPrefixMismatch {
                    id: def.id.clone(),
                    kind: def.kind,
                });
            }
            if self.index.contains_key(&def.id) || !seen.insert(def.id.as_str()) {
                return Err(TagError::DuplicateTag(def.id.clone()));
            }
        }
        for def in defs {
            self.index.insert(def.id.clone(), self.tags.len());
            self.tags.push(def);
        }
        Ok(())
    }

    pub fn get(&self, tag_id: &str) -> Option<&DependencyTag<C>> {
        self.index.get(tag_id).map(|&idx| &self.tags[idx])
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.index.contains_key(tag_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyTag<C>> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Evaluate one tag. Unknown tags, predicate errors and predicate panics
    /// are all `false`. A tag without a predicate holds only once it has been
    /// recorded in `satisfied`.
    pub fn is_satisfied(&self, tag_id: &str, ctx: &C, satisfied: &SatisfactionState) -> bool {
        let Some(tag) = self.get(tag_id) else {
            tracing::debug!(target: "placement::tags", tag = tag_id, "tags.unknown");
            return false;
        };
        let Some(predicate) = tag.satisfies.as_ref() else {
            return satisfied.contains(tag_id);
        };
        match panic::catch_unwind(AssertUnwindSafe(|| predicate(ctx, satisfied))) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::debug!(
                    target: "placement::tags",
                    tag = tag_id,
                    error = %err,
                    "tags.unsatisfied"
                );
                false
            }
            Err(_) => {
                tracing::warn!(target: "placement::tags", tag = tag_id, "tags.predicate_panicked");
                false
            }
        }
    }

    /// Ids from `required` that do not currently hold.
    pub fn missing(
        &self,
        required: &[&str],
        ctx: &C,
        satisfied: &SatisfactionState,
    ) -> Vec<String> {
        required
            .iter()
            .filter(|id| !self.is_satisfied(id, ctx, satisfied))
            .map(|id| id.to_string())
            .collect()
    }

    /// Run every demo through its validator; returns the ids that fail.
    pub fn validate_demos(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter_map(|tag| {
                let demo = tag.demo.as_ref()?;
                let passed =
                    panic::catch_unwind(AssertUnwindSafe(|| (demo.validate)(&demo.value)))
                        .unwrap_or(false);
                (!passed).then(|| tag.id.clone())
            })
            .collect()
    }
}
