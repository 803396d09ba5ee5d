//! # Resource Trait & Typed Handles
//!
//! A [`Resource`] is one declarative resource kind (a VPC, a subnet, a route).
//! Adding it to a [`Template`](crate::template::Template) yields a [`Handle<K>`],
//! a typed pointer other definitions use to reference it. Because a subnet's
//! `vpc` field is a `ResourceRef<Vpc>` and not a string, wiring a subnet to a
//! route table by mistake is a compile error instead of a failed deployment.

use crate::value::{Properties, Value};
use std::fmt::{self, Debug};
use std::marker::PhantomData;

/// A declarative resource kind understood by the orchestrator.
pub trait Resource: Debug + Send + Sync + 'static {
    /// Orchestrator type name, e.g. `AWS::EC2::VPC`.
    const RESOURCE_TYPE: &'static str;

    /// The property bag rendered under `Properties`.
    fn properties(&self) -> Properties;
}

/// Typed pointer to a resource definition inside one template.
pub struct Handle<K> {
    logical_name: String,
    template_id: u64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub(crate) fn new(logical_name: String, template_id: u64) -> Self {
        Self {
            logical_name,
            template_id,
            _kind: PhantomData,
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub(crate) fn template_id(&self) -> u64 {
        self.template_id
    }

    /// `Ref` to this resource.
    pub fn reference(&self) -> Value {
        Value::Ref {
            resource: self.logical_name.clone(),
            template: Some(self.template_id),
        }
    }

    /// `Fn::GetAtt` on a runtime attribute of this resource.
    pub fn get_att(&self, attribute: impl Into<String>) -> Value {
        Value::GetAtt {
            resource: self.logical_name.clone(),
            attribute: attribute.into(),
            template: Some(self.template_id),
        }
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        Self::new(self.logical_name.clone(), self.template_id)
    }
}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.template_id == other.template_id && self.logical_name == other.logical_name
    }
}

impl<K> Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.logical_name).finish()
    }
}

impl<K> From<&Handle<K>> for Value {
    fn from(handle: &Handle<K>) -> Self {
        handle.reference()
    }
}

impl<K> From<Handle<K>> for Value {
    fn from(handle: Handle<K>) -> Self {
        Value::Ref {
            resource: handle.logical_name,
            template: Some(handle.template_id),
        }
    }
}

/// Either a resource in the same template or one that already exists remotely.
pub enum ResourceRef<K> {
    Handle(Handle<K>),
    /// Physical id, typically resolved by the [`ResourceLocator`](crate::locator::ResourceLocator).
    Existing(String),
}

impl<K> ResourceRef<K> {
    pub fn existing(id: impl Into<String>) -> Self {
        Self::Existing(id.into())
    }
}

impl<K> Clone for ResourceRef<K> {
    fn clone(&self) -> Self {
        match self {
            Self::Handle(handle) => Self::Handle(handle.clone()),
            Self::Existing(id) => Self::Existing(id.clone()),
        }
    }
}

impl<K> Debug for ResourceRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(handle) => handle.fmt(f),
            Self::Existing(id) => f.debug_tuple("Existing").field(id).finish(),
        }
    }
}

impl<K> From<Handle<K>> for ResourceRef<K> {
    fn from(handle: Handle<K>) -> Self {
        Self::Handle(handle)
    }
}

impl<K> From<&Handle<K>> for ResourceRef<K> {
    fn from(handle: &Handle<K>) -> Self {
        Self::Handle(handle.clone())
    }
}

impl<K> From<&ResourceRef<K>> for Value {
    fn from(reference: &ResourceRef<K>) -> Self {
        match reference {
            ResourceRef::Handle(handle) => handle.reference(),
            ResourceRef::Existing(id) => Value::String(id.clone()),
        }
    }
}
