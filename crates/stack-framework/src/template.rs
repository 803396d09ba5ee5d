//! # Template Builder
//!
//! [`Template`] assembles resource definitions into one document. Building is
//! additive and order-preserving: definitions render in insertion order, which
//! some orchestrators use as a tiebreak when nothing else orders two resources.
//!
//! ## Ordering
//!
//! The orchestrator infers most ordering from references (`Ref`, `Fn::GetAtt`).
//! Where a resource must wait for something it never references, add an
//! explicit predecessor edge with [`Template::depends_on`]:
//!
//! ```rust
//! use stack_framework::{Properties, Resource, Template, Value};
//!
//! #[derive(Debug)]
//! struct Gateway;
//! impl Resource for Gateway {
//!     const RESOURCE_TYPE: &'static str = "AWS::EC2::InternetGateway";
//!     fn properties(&self) -> Properties { Properties::new() }
//! }
//!
//! #[derive(Debug)]
//! struct Route { gateway: Value }
//! impl Resource for Route {
//!     const RESOURCE_TYPE: &'static str = "AWS::EC2::Route";
//!     fn properties(&self) -> Properties {
//!         Properties::new().with("GatewayId", self.gateway.clone())
//!     }
//! }
//!
//! let mut template = Template::new();
//! let gateway = template.add_resource("Gateway", Gateway).unwrap();
//! let attachment = template.add_resource("Attachment", Gateway).unwrap();
//! let route = template
//!     .add_resource("Route", Route { gateway: gateway.reference() })
//!     .unwrap();
//! template.depends_on(&route, &attachment).unwrap();
//!
//! let document = template.render().unwrap();
//! assert_eq!(document.resource_count(), 3);
//! ```

use crate::error::TemplateError;
use crate::resource::{Handle, Resource};
use crate::value::{Properties, Value};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const FORMAT_VERSION: &str = "2010-09-09";

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(1);

/// How two definitions relate when adding an explicit edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The first resource is provisioned after the second.
    DependsOn,
    /// The first resource is provisioned before the second.
    Precedes,
}

/// A named template output, optionally exported for other stacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    value: Value,
    description: Option<String>,
    export_name: Option<Value>,
}

impl Output {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            description: None,
            export_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_export(mut self, name: impl Into<Value>) -> Self {
        self.export_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
struct Definition {
    logical_name: String,
    resource_type: &'static str,
    properties: Properties,
    depends_on: Vec<String>,
}

/// The rendered document body handed to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    body: String,
    resource_count: usize,
}

impl Document {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn resource_count(&self) -> usize {
        self.resource_count
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

/// An ordered collection of resource definitions and outputs.
#[derive(Debug)]
pub struct Template {
    id: u64,
    description: Option<String>,
    definitions: Vec<Definition>,
    index: HashMap<String, usize>,
    outputs: Vec<(String, Output)>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            id: NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed),
            description: None,
            definitions: Vec::new(),
            index: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a definition and returns its handle.
    ///
    /// Fails without touching the template when the logical name is invalid or
    /// already taken.
    pub fn add_resource<K: Resource>(
        &mut self,
        logical_name: impl Into<String>,
        resource: K,
    ) -> Result<Handle<K>, TemplateError> {
        let logical_name = logical_name.into();
        self.check_available(&logical_name)?;

        debug!(%logical_name, resource_type = K::RESOURCE_TYPE, "Add resource");
        self.index.insert(logical_name.clone(), self.definitions.len());
        self.definitions.push(Definition {
            logical_name: logical_name.clone(),
            resource_type: K::RESOURCE_TYPE,
            properties: resource.properties(),
            depends_on: Vec::new(),
        });
        Ok(Handle::new(logical_name, self.id))
    }

    /// Whether `logical_name` is valid and not yet taken.
    pub fn check_available(&self, logical_name: &str) -> Result<(), TemplateError> {
        validate_logical_name(logical_name)?;
        if self.index.contains_key(logical_name) {
            return Err(TemplateError::DuplicateResourceName(
                logical_name.to_string(),
            ));
        }
        Ok(())
    }

    /// Adds an explicit predecessor edge: `dependent` is provisioned after
    /// `predecessor`.
    ///
    /// Repeated edges are ignored. An edge that would close a cycle is rejected
    /// and the graph is left unchanged.
    pub fn depends_on<A, B>(
        &mut self,
        dependent: &Handle<A>,
        predecessor: &Handle<B>,
    ) -> Result<(), TemplateError> {
        let dependent_idx = self.resolve(
            dependent.template_id(),
            dependent.logical_name(),
            dependent.logical_name(),
        )?;
        let predecessor_idx = self.resolve(
            predecessor.template_id(),
            predecessor.logical_name(),
            dependent.logical_name(),
        )?;

        if self.definitions[dependent_idx]
            .depends_on
            .iter()
            .any(|name| name == predecessor.logical_name())
        {
            return Ok(());
        }
        if self.reaches(predecessor_idx, dependent_idx) {
            return Err(TemplateError::DependencyCycle(
                dependent.logical_name().to_string(),
            ));
        }

        self.definitions[dependent_idx]
            .depends_on
            .push(predecessor.logical_name().to_string());
        Ok(())
    }

    /// Adds an explicit edge between two definitions in either direction.
    pub fn add_association<A, B>(
        &mut self,
        first: &Handle<A>,
        second: &Handle<B>,
        relation: Relation,
    ) -> Result<(), TemplateError> {
        match relation {
            Relation::DependsOn => self.depends_on(first, second),
            Relation::Precedes => self.depends_on(second, first),
        }
    }

    /// Sets or replaces one property of an existing definition.
    pub fn set_property<K>(
        &mut self,
        handle: &Handle<K>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), TemplateError> {
        let idx = self.resolve(
            handle.template_id(),
            handle.logical_name(),
            handle.logical_name(),
        )?;
        self.definitions[idx].properties.insert(key, value);
        Ok(())
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        output: Output,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        validate_logical_name(&name)?;
        if self.outputs.iter().any(|(existing, _)| *existing == name) {
            return Err(TemplateError::DuplicateOutputName(name));
        }
        self.outputs.push((name, output));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Logical names in insertion order.
    pub fn logical_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.logical_name.as_str())
    }

    /// Explicit predecessors of a definition, if it exists.
    pub fn explicit_dependencies(&self, logical_name: &str) -> Option<&[String]> {
        self.index
            .get(logical_name)
            .map(|&idx| self.definitions[idx].depends_on.as_slice())
    }

    /// Validates every reference and the ordering graph, then serializes.
    pub fn render(&self) -> Result<Document, TemplateError> {
        self.validate()?;
        let body = serde_yaml::to_string(&TemplateBody(self))
            .map_err(|e| TemplateError::Serialization(e.to_string()))?;
        debug!(resources = self.len(), outputs = self.outputs.len(), "Rendered template");
        Ok(Document {
            body,
            resource_count: self.definitions.len(),
        })
    }

    fn resolve(
        &self,
        template_id: u64,
        target: &str,
        referrer: &str,
    ) -> Result<usize, TemplateError> {
        match self.index.get(target) {
            Some(&idx) if template_id == self.id => Ok(idx),
            _ => Err(TemplateError::UnknownReference {
                resource: referrer.to_string(),
                target: target.to_string(),
            }),
        }
    }

    /// Every reference in `value` must name a local definition, and a reference
    /// built from a handle must come from this template.
    fn check_references(&self, referrer: &str, value: &Value) -> Result<(), TemplateError> {
        for (target, template_id) in value.scoped_references() {
            let foreign = matches!(template_id, Some(id) if id != self.id);
            if foreign || !self.index.contains_key(target) {
                return Err(TemplateError::UnknownReference {
                    resource: referrer.to_string(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Predecessors of a definition: explicit edges plus property references.
    fn predecessors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let definition = &self.definitions[idx];
        let explicit = definition.depends_on.iter().map(String::as_str);
        let referenced = definition
            .properties
            .iter()
            .flat_map(|(_, value)| value.references());
        explicit
            .chain(referenced)
            .filter_map(|name| self.index.get(name).copied())
    }

    /// Whether `target` is reachable from `start` along predecessor edges.
    fn reaches(&self, start: usize, target: usize) -> bool {
        let mut visited = vec![false; self.definitions.len()];
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if idx == target {
                return true;
            }
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            stack.extend(self.predecessors(idx));
        }
        false
    }

    fn validate(&self) -> Result<(), TemplateError> {
        for definition in &self.definitions {
            for (_, value) in definition.properties.iter() {
                self.check_references(&definition.logical_name, value)?;
            }
        }
        for (name, output) in &self.outputs {
            self.check_references(name, &output.value)?;
            if let Some(export_name) = &output.export_name {
                self.check_references(name, export_name)?;
            }
        }

        // Kahn's algorithm over predecessor edges; anything left over sits on a cycle.
        let count = self.definitions.len();
        let mut pending: Vec<usize> = (0..count)
            .map(|idx| self.predecessors(idx).count())
            .collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for idx in 0..count {
            for predecessor in self.predecessors(idx) {
                dependents[predecessor].push(idx);
            }
        }
        let mut ready: Vec<usize> = (0..count).filter(|&idx| pending[idx] == 0).collect();
        let mut settled = 0;
        while let Some(idx) = ready.pop() {
            settled += 1;
            for &dependent in &dependents[idx] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }
        if settled < count {
            let stuck = (0..count)
                .find(|&idx| pending[idx] > 0)
                .map(|idx| self.definitions[idx].logical_name.clone())
                .unwrap_or_default();
            return Err(TemplateError::DependencyCycle(stuck));
        }
        Ok(())
    }
}

fn validate_logical_name(name: &str) -> Result<(), TemplateError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TemplateError::InvalidLogicalName(name.to_string()));
    }
    Ok(())
}

struct TemplateBody<'a>(&'a Template);

struct ResourceBlock<'a>(&'a Definition);

struct OutputBlock<'a>(&'a Output);

struct Section<'a, T>(&'a [T]);

impl Serialize for TemplateBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let template = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", FORMAT_VERSION)?;
        if let Some(description) = &template.description {
            map.serialize_entry("Description", description)?;
        }
        map.serialize_entry("Resources", &Section(&template.definitions))?;
        if !template.outputs.is_empty() {
            map.serialize_entry("Outputs", &Section(&template.outputs))?;
        }
        map.end()
    }
}

impl Serialize for Section<'_, Definition> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for definition in self.0 {
            map.serialize_entry(&definition.logical_name, &ResourceBlock(definition))?;
        }
        map.end()
    }
}

impl Serialize for Section<'_, (String, Output)> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, output) in self.0 {
            map.serialize_entry(name, &OutputBlock(output))?;
        }
        map.end()
    }
}

impl Serialize for ResourceBlock<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let definition = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", definition.resource_type)?;
        if !definition.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &definition.depends_on)?;
        }
        if !definition.properties.is_empty() {
            map.serialize_entry("Properties", &definition.properties)?;
        }
        map.end()
    }
}

impl Serialize for OutputBlock<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let output = self.0;
        let mut map = serializer.serialize_map(None)?;
        if let Some(description) = &output.description {
            map.serialize_entry("Description", description)?;
        }
        map.serialize_entry("Value", &output.value)?;
        if let Some(export_name) = &output.export_name {
            map.serialize_entry("Export", &Value::map([("Name", export_name.clone())]))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tags;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Network {
        cidr: String,
    }

    impl Resource for Network {
        const RESOURCE_TYPE: &'static str = "Test::Network";
        fn properties(&self) -> Properties {
            Properties::new()
                .with("CidrBlock", self.cidr.as_str())
                .with_tags("Tags", Tags::named("net"))
        }
    }

    #[derive(Debug)]
    struct Member {
        network: Value,
    }

    impl Resource for Member {
        const RESOURCE_TYPE: &'static str = "Test::Member";
        fn properties(&self) -> Properties {
            Properties::new().with("NetworkId", self.network.clone())
        }
    }

    fn network() -> Network {
        Network {
            cidr: "10.0.0.0/16".to_string(),
        }
    }

    fn parse(document: &Document) -> serde_yaml::Value {
        serde_yaml::from_str(document.body()).unwrap()
    }

    #[test]
    fn test_render_preserves_insertion_order() {
        let mut template = Template::new();
        let names = ["Zeta", "Alpha", "Mid", "Beta"];
        for name in names {
            template.add_resource(name, network()).unwrap();
        }

        let document = template.render().unwrap();
        assert_eq!(document.resource_count(), 4);

        let parsed = parse(&document);
        let rendered: Vec<_> = parsed["Resources"]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(rendered, names);
    }

    #[test]
    fn test_duplicate_name_leaves_template_unchanged() {
        let mut template = Template::new();
        template.add_resource("VPC", network()).unwrap();
        let before = template.render().unwrap();

        let err = template.add_resource("VPC", network()).unwrap_err();
        assert_eq!(err, TemplateError::DuplicateResourceName("VPC".to_string()));
        assert_eq!(template.len(), 1);
        assert_eq!(template.render().unwrap(), before);
    }

    #[test]
    fn test_invalid_logical_name_is_rejected() {
        let mut template = Template::new();
        let err = template.add_resource("public-subnet", network()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidLogicalName(_)));
        assert!(template.is_empty());
    }

    #[test]
    fn test_cycle_is_rejected_and_graph_unchanged() {
        let mut template = Template::new();
        let a = template.add_resource("A", network()).unwrap();
        let b = template
            .add_resource("B", Member { network: a.reference() })
            .unwrap();

        // B already references A, so A depending on B would close a cycle.
        let err = template.depends_on(&a, &b).unwrap_err();
        assert_eq!(err, TemplateError::DependencyCycle("A".to_string()));
        assert_eq!(template.explicit_dependencies("A"), Some(&[][..]));

        let err = template.depends_on(&a, &a).unwrap_err();
        assert!(matches!(err, TemplateError::DependencyCycle(_)));
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut template = Template::new();
        let a = template.add_resource("A", network()).unwrap();
        let b = template.add_resource("B", network()).unwrap();
        template.depends_on(&b, &a).unwrap();
        template.add_association(&a, &b, Relation::Precedes).unwrap();
        assert_eq!(template.explicit_dependencies("B").unwrap(), ["A".to_string()]);
    }

    #[test]
    fn test_foreign_handle_is_unknown_reference() {
        let mut other = Template::new();
        let foreign = other.add_resource("Shared", network()).unwrap();

        let mut template = Template::new();
        let local = template.add_resource("Local", network()).unwrap();
        let err = template.depends_on(&local, &foreign).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownReference {
                resource: "Local".to_string(),
                target: "Shared".to_string(),
            }
        );

        template
            .add_resource("Member", Member { network: foreign.reference() })
            .unwrap();
        assert!(matches!(
            template.render(),
            Err(TemplateError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_foreign_handle_with_colliding_name_is_unknown_reference() {
        let mut other = Template::new();
        let foreign = other.add_resource("VPC", network()).unwrap();

        let mut template = Template::new();
        template.add_resource("VPC", network()).unwrap();
        template
            .add_resource("Member", Member { network: foreign.reference() })
            .unwrap();
        assert_eq!(
            template.render(),
            Err(TemplateError::UnknownReference {
                resource: "Member".to_string(),
                target: "VPC".to_string(),
            })
        );

        // The same name through the local handle renders.
        let mut fixed = Template::new();
        let vpc = fixed.add_resource("VPC", network()).unwrap();
        fixed
            .add_resource("Member", Member { network: vpc.reference() })
            .unwrap();
        assert_eq!(fixed.render().unwrap().resource_count(), 2);

        // Outputs are checked the same way.
        fixed
            .add_output("VpcCidr", Output::new(foreign.get_att("CidrBlock")))
            .unwrap();
        assert!(matches!(
            fixed.render(),
            Err(TemplateError::UnknownReference { ref resource, .. }) if resource == "VpcCidr"
        ));
    }

    #[test]
    fn test_hand_written_reference_resolves_by_name() {
        let mut template = Template::new();
        template.add_resource("VPC", network()).unwrap();
        template
            .add_resource("Member", Member { network: Value::reference("VPC") })
            .unwrap();
        assert_eq!(template.render().unwrap().resource_count(), 2);
    }

    #[test]
    fn test_set_property_can_close_a_reference_cycle() {
        let mut template = Template::new();
        let a = template.add_resource("A", network()).unwrap();
        let b = template
            .add_resource("B", Member { network: a.reference() })
            .unwrap();
        template.set_property(&a, "Peer", b.reference()).unwrap();
        assert!(matches!(
            template.render(),
            Err(TemplateError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_outputs_and_dependencies_render() {
        let mut template = Template::new().with_description("test stack");
        let net = template.add_resource("Net", network()).unwrap();
        let member = template
            .add_resource("Member", Member { network: net.reference() })
            .unwrap();
        template.depends_on(&member, &net).unwrap();
        template
            .add_output(
                "NetId",
                Output::new(&net)
                    .with_description("network id")
                    .with_export("test-NetId"),
            )
            .unwrap();

        let parsed = parse(&template.render().unwrap());
        assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(parsed["Description"], "test stack");
        assert_eq!(parsed["Resources"]["Member"]["Type"], "Test::Member");
        assert_eq!(parsed["Resources"]["Member"]["DependsOn"][0], "Net");
        assert_eq!(parsed["Resources"]["Member"]["Properties"]["NetworkId"]["Ref"], "Net");
        assert_eq!(parsed["Outputs"]["NetId"]["Value"]["Ref"], "Net");
        assert_eq!(parsed["Outputs"]["NetId"]["Export"]["Name"], "test-NetId");

        let err = template.add_output("NetId", Output::new("x")).unwrap_err();
        assert_eq!(err, TemplateError::DuplicateOutputName("NetId".to_string()));
    }
}
