//! Core types and data structures for SlipStream

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Label used for the aggregate usage row.
pub const ALL_CLOUDS: &str = "All Clouds";

/// Kind of a node in the module tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Single deployable image
    Component,
    /// Multi-node deployment descriptor
    Application,
    /// Container of other modules
    Project,
    /// Any other category reported by the server, lowercased
    Other(String),
}

impl ModuleKind {
    /// Map a server-side category onto a module kind.
    ///
    /// `Image` becomes a component and `Deployment` an application; every other
    /// category is passed through lowercased.
    pub fn from_category(category: &str) -> Self {
        match category.to_lowercase().as_str() {
            "image" | "component" => ModuleKind::Component,
            "deployment" | "application" => ModuleKind::Application,
            "project" => ModuleKind::Project,
            other => ModuleKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModuleKind::Component => "component",
            ModuleKind::Application => "application",
            ModuleKind::Project => "project",
            ModuleKind::Other(other) => other,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModuleKind::from_category(s))
    }
}

impl Serialize for ModuleKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModuleKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ModuleKind::from_category(&s))
    }
}

/// A node of the module catalog: project, component or application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModuleKind,
    pub version: u64,
    /// Hierarchical path without the version segment
    pub path: String,
}

impl Module {
    pub fn is_project(&self) -> bool {
        self.kind == ModuleKind::Project
    }

    /// Path including the trailing version segment, as the server addresses it.
    pub fn versioned_path(&self) -> String {
        format!("{}/{}", self.path, self.version)
    }
}

/// Snapshot of a run as reported by the run listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub module: String,
    pub status: String,
    pub started_at: String,
    pub cloud: String,
}

/// Snapshot of a virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub cloud: String,
    pub status: String,
    /// Owning run, absent for VMs the server cannot associate
    pub run_id: Option<Uuid>,
}

/// Usage and quota of a single cloud (or of all clouds for the aggregate row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub cloud: String,
    pub quota: u64,
    pub run_usage: u64,
    pub vm_usage: Option<u64>,
    pub inactive_vm_usage: Option<u64>,
    pub others_vm_usage: Option<u64>,
    pub pending_vm_usage: Option<u64>,
    pub unknown_vm_usage: Option<u64>,
}

impl Usage {
    pub fn is_aggregate(&self) -> bool {
        self.cloud == ALL_CLOUDS
    }
}

/// A deployment parameter targeting one node: `NODE:KEY=VALUE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeParameter {
    pub node: String,
    pub key: String,
    pub value: String,
}

impl NodeParameter {
    pub fn new(node: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Name of the form field carrying this parameter in a run request.
    pub fn form_field(&self) -> String {
        format!("parameter--node--{}--{}", self.node, self.key)
    }
}

impl FromStr for NodeParameter {
    type Err = String;

    /// Split on the first `:` and then on the first `=`, so keys may contain
    /// colons and values may contain equal signs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("{} is not a valid NODE:KEY=VALUE value", s);

        let (node, param) = s.split_once(':').ok_or_else(invalid)?;
        let (key, value) = param.split_once('=').ok_or_else(invalid)?;

        if node.is_empty() || key.is_empty() {
            return Err(invalid());
        }

        Ok(NodeParameter::new(node, key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(ModuleKind::from_category("Image"), ModuleKind::Component);
        assert_eq!(
            ModuleKind::from_category("Deployment"),
            ModuleKind::Application
        );
        assert_eq!(ModuleKind::from_category("Project"), ModuleKind::Project);
        assert_eq!(
            ModuleKind::from_category("Blueprint"),
            ModuleKind::Other("blueprint".to_string())
        );
    }

    #[test]
    fn test_module_kind_serializes_as_string() {
        let module = Module {
            name: "wordpress".to_string(),
            kind: ModuleKind::Application,
            version: 478,
            path: "examples/tutorials/wordpress/wordpress".to_string(),
        };
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["type"], "application");
        assert_eq!(json["version"], 478);

        let parsed: Module = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, module);
    }

    #[test]
    fn test_versioned_path() {
        let module = Module {
            name: "centos-6".to_string(),
            kind: ModuleKind::Component,
            version: 479,
            path: "examples/images/centos-6".to_string(),
        };
        assert_eq!(module.versioned_path(), "examples/images/centos-6/479");
        assert!(!module.is_project());
    }

    #[test]
    fn test_node_parameter_ok() {
        let param: NodeParameter = "db:scale=2".parse().unwrap();
        assert_eq!(param, NodeParameter::new("db", "scale", "2"));
        assert_eq!(param.form_field(), "parameter--node--db--scale");
    }

    #[test]
    fn test_node_parameter_complex_key_and_value() {
        let param: NodeParameter = "db:scale:min=2".parse().unwrap();
        assert_eq!(param.key, "scale:min");
        assert_eq!(param.value, "2");

        let param: NodeParameter = "db:scale=a=2".parse().unwrap();
        assert_eq!(param.key, "scale");
        assert_eq!(param.value, "a=2");
    }

    #[test]
    fn test_node_parameter_rejects_missing_separators() {
        assert!("db_scale=2".parse::<NodeParameter>().is_err());
        assert!("db:scale".parse::<NodeParameter>().is_err());
        assert!(":scale=2".parse::<NodeParameter>().is_err());
    }
}
