//! synthesized output
//!
//! An [Artifact] is the static template produced by [crate::synth::synthesize]. It contains no tokens;
//! writing it out is up to the caller (see the `constructs` binary).
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Artifact {
    /// Resources by logical id, in tree traversal order
    #[serde(rename = "Resources")]
    resources: IndexMap<String, Resource>,
}

impl Artifact {
    pub(crate) fn insert(&mut self, logical_id: String, resource: Resource) {
        self.resources.insert(logical_id, resource);
    }

    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Find a resource by the path of the construct that emitted it
    pub fn find_by_path(&self, path: &str) -> Option<(&str, &Resource)> {
        self.resources
            .iter()
            .find(|(_, resource)| resource.path() == path)
            .map(|(logical_id, resource)| (logical_id.as_str(), resource))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "Metadata")]
    metadata: Metadata,
}

impl Resource {
    pub(crate) fn new(resource_type: &str, properties: Value, path: String) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            metadata: Metadata { path },
        }
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Metadata {
    #[serde(rename = "constructs:path")]
    path: String,
}
