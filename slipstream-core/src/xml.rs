//! XML response mapping
//!
//! The server answers listings with XML documents whose records are carried as
//! attributes of repeated elements (`item`, `vm`, `usageElement`). Documents are
//! parsed once into owned [`Element`]s; each listing is then exposed as a
//! [`Listing`] that converts one element per `next()` call.

use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SlipStreamError};
use crate::module_path::strip_version;
use crate::types::{Module, ModuleKind, Run, Usage, VirtualMachine, ALL_CLOUDS};

/// An XML element reduced to its tag name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: HashMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        Self {
            tag: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value, `None` when absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value, failing when absent.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.attribute(name)
            .ok_or_else(|| SlipStreamError::MissingAttribute {
                element: self.tag.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn integer(&self, name: &str) -> Result<u64> {
        let raw = self.required(name)?;
        self.parse_integer(name, raw)
    }

    pub fn optional_integer(&self, name: &str) -> Result<Option<u64>> {
        self.attribute(name)
            .map(|raw| self.parse_integer(name, raw))
            .transpose()
    }

    pub fn uuid(&self, name: &str) -> Result<Uuid> {
        let raw = self.required(name)?;
        self.parse_uuid(name, raw)
    }

    pub fn optional_uuid(&self, name: &str) -> Result<Option<Uuid>> {
        self.attribute(name)
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.parse_uuid(name, raw))
            .transpose()
    }

    fn parse_integer(&self, name: &str, raw: &str) -> Result<u64> {
        raw.trim().parse().map_err(|_| {
            SlipStreamError::Parse(format!(
                "attribute '{}' on <{}> is not an integer: {:?}",
                name, self.tag, raw
            ))
        })
    }

    fn parse_uuid(&self, name: &str, raw: &str) -> Result<Uuid> {
        Uuid::parse_str(raw.trim()).map_err(|e| {
            SlipStreamError::Parse(format!(
                "attribute '{}' on <{}> is not a UUID ({}): {:?}",
                name, self.tag, e, raw
            ))
        })
    }
}

/// A parsed response document.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
    descendants: Vec<Element>,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        Ok(Self {
            root: Element::from_node(root),
            descendants: root
                .descendants()
                .filter(|n| n.is_element() && *n != root)
                .map(Element::from_node)
                .collect(),
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Every descendant element with the given tag, in document order.
    pub fn elements(&self, tag: &str) -> Vec<Element> {
        self.descendants
            .iter()
            .filter(|e| e.tag == tag)
            .cloned()
            .collect()
    }
}

type Mapper<T> = Box<dyn Fn(&Element) -> Result<T> + Send>;

/// A finite, non-restartable sequence of records mapped from response elements.
///
/// Each call to `next()` converts one element; the first conversion error is
/// yielded as an `Err` so callers collecting into `Result<Vec<_>>` fail fast.
pub struct Listing<T> {
    items: std::vec::IntoIter<Element>,
    map: Mapper<T>,
}

impl<T> Listing<T> {
    pub fn new<F>(items: Vec<Element>, map: F) -> Self
    where
        F: Fn(&Element) -> Result<T> + Send + 'static,
    {
        Self {
            items: items.into_iter(),
            map: Box::new(map),
        }
    }
}

impl<T> Iterator for Listing<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|e| (self.map)(&e))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> fmt::Debug for Listing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("remaining", &self.items.len())
            .finish()
    }
}

fn catalog_module(item: &Element) -> Result<Module> {
    Ok(Module {
        name: item.required("name")?.to_string(),
        kind: ModuleKind::from_category(item.required("category")?),
        version: item.integer("version")?,
        path: strip_version(item.required("resourceUri")?, false),
    })
}

/// Map the application catalog (`GET /`).
///
/// Only published modules are listed: items without a non-empty
/// `published` attribute are skipped.
pub fn applications(text: &str) -> Result<Listing<Module>> {
    let doc = Document::parse(text)?;
    let published = doc
        .elements("item")
        .into_iter()
        .filter(|item| item.attribute("published").is_some_and(|p| !p.is_empty()))
        .collect();
    Ok(Listing::new(published, catalog_module))
}

/// Raw (prefixed, versioned) resource path of a child item of a module listing.
pub fn child_resource_path(root: &Element, item: &Element) -> Result<String> {
    if let Some(uri) = item.attribute("resourceUri") {
        return Ok(uri.to_string());
    }

    Ok(format!(
        "{}/{}/{}/{}",
        root.required("parentUri")?.trim_matches('/'),
        root.required("shortName")?,
        item.required("name")?,
        item.required("version")?
    ))
}

/// Map the children of a module listing (`GET /module/...`).
pub fn module_children(text: &str) -> Result<Listing<Module>> {
    let doc = Document::parse(text)?;
    let root = doc.root().clone();

    Ok(Listing::new(doc.elements("item"), move |item| {
        let raw_path = child_resource_path(&root, item)?;
        Ok(Module {
            name: item.required("name")?.to_string(),
            kind: ModuleKind::from_category(item.required("category")?),
            version: item.integer("version")?,
            path: strip_version(&raw_path, false),
        })
    }))
}

/// Map a single module document from its own root attributes.
pub fn module(text: &str) -> Result<Module> {
    let doc = Document::parse(text)?;
    let root = doc.root();

    let short_name = root.required("shortName")?;
    let version = root.integer("version")?;
    let raw_path = format!(
        "{}/{}/{}",
        root.required("parentUri")?.trim_matches('/'),
        short_name,
        version
    );

    Ok(Module {
        name: short_name.to_string(),
        kind: ModuleKind::from_category(root.required("category")?),
        version,
        path: strip_version(&raw_path, false),
    })
}

fn run(item: &Element) -> Result<Run> {
    let cloud = item
        .attribute("cloudServiceNames")
        .or_else(|| item.attribute("cloudServiceName"))
        .unwrap_or_default();

    Ok(Run {
        id: item.uuid("uuid")?,
        module: strip_version(item.required("moduleResourceUri")?, true),
        status: item.required("status")?.to_lowercase(),
        started_at: item.required("startTime")?.to_string(),
        cloud: cloud.to_string(),
    })
}

/// Map the run listing (`GET /run`).
pub fn runs(text: &str) -> Result<Listing<Run>> {
    let doc = Document::parse(text)?;
    Ok(Listing::new(doc.elements("item"), run))
}

fn virtual_machine(vm: &Element) -> Result<VirtualMachine> {
    Ok(VirtualMachine {
        id: vm.required("instanceId")?.to_string(),
        cloud: vm.required("cloud")?.to_string(),
        status: vm.required("state")?.to_lowercase(),
        run_id: vm.optional_uuid("runUuid")?,
    })
}

/// Map the virtual machine listing (`GET /vms`).
pub fn virtual_machines(text: &str) -> Result<Listing<VirtualMachine>> {
    let doc = Document::parse(text)?;
    Ok(Listing::new(doc.elements("vm"), virtual_machine))
}

fn usage_element(elem: &Element) -> Result<Usage> {
    Ok(Usage {
        cloud: elem.attribute("cloud").unwrap_or(ALL_CLOUDS).to_string(),
        quota: elem.integer("quota")?,
        run_usage: elem.integer("currentUsage")?,
        vm_usage: elem.optional_integer("userVmUsage")?,
        inactive_vm_usage: elem.optional_integer("userInactiveVmUsage")?,
        others_vm_usage: elem.optional_integer("othersVmUsage")?,
        pending_vm_usage: elem.optional_integer("pendingVmUsage")?,
        unknown_vm_usage: elem.optional_integer("unknownVmUsage")?,
    })
}

/// Map the dashboard usage section (`GET /dashboard`).
pub fn usage(text: &str) -> Result<Listing<Usage>> {
    let doc = Document::parse(text)?;
    Ok(Listing::new(doc.elements("usageElement"), usage_element))
}
