//! Resource descriptors attached to every span and metric.
//!
//! A descriptor is a plain attribute map. Merging is a last-write-wins union
//! over keys, so `defaults.merge(&user)` keeps every default the user did not
//! override.

use std::collections::BTreeMap;

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use thiserror::Error;

/// Invalid service identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("resource attribute key must not be empty")]
    EmptyAttributeKey,
}

/// Attribute set describing the emitting process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceDescriptor {
    attributes: BTreeMap<String, Value>,
}

impl ResourceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// SDK defaults: `telemetry.sdk.*`, `service.name` from
    /// `OTEL_SERVICE_NAME` (or `unknown_service`) and `OTEL_RESOURCE_ATTRIBUTES`.
    pub fn process_default() -> Self {
        Self::from_resource(&Resource::builder().build())
    }

    /// Host and process attributes of the running binary.
    pub fn detect() -> Self {
        let mut detected = Self::new()
            .with("os.type", std::env::consts::OS)
            .with("host.arch", host_arch())
            .with("process.pid", i64::from(std::process::id()))
            .with("process.runtime.name", "rust");

        if let Some(name) = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        {
            detected.insert("process.executable.name", name);
        }
        if let Ok(host) = std::env::var("HOSTNAME") {
            if !host.is_empty() {
                detected.insert("host.name", host);
            }
        }
        detected
    }

    pub fn from_resource(resource: &Resource) -> Self {
        let attributes = resource
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect();
        Self { attributes }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Union of both descriptors; `other` wins on conflicting keys.
    pub fn merge(&self, other: &ResourceDescriptor) -> ResourceDescriptor {
        let mut attributes = self.attributes.clone();
        for (key, value) in &other.attributes {
            attributes.insert(key.clone(), value.clone());
        }
        ResourceDescriptor { attributes }
    }

    pub fn to_resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(
                self.attributes
                    .iter()
                    .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
            )
            .build()
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "x86",
        "arm" => "arm32",
        other => other,
    }
}

/// Who is emitting telemetry: service name, version and extra attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.name.trim().is_empty() {
            return Err(IdentityError::EmptyServiceName);
        }
        if self.attributes.keys().any(|k| k.trim().is_empty()) {
            return Err(IdentityError::EmptyAttributeKey);
        }
        Ok(())
    }

    /// Caller-supplied part of the resource. `service.name` and
    /// `service.version` override same-named entries in `attributes`.
    pub fn descriptor(&self) -> ResourceDescriptor {
        let mut descriptor = ResourceDescriptor::new();
        for (key, value) in &self.attributes {
            descriptor.insert(key.clone(), value.clone());
        }
        descriptor.insert(SERVICE_NAME, self.name.clone());
        if let Some(version) = &self.version {
            descriptor.insert(SERVICE_VERSION, version.clone());
        }
        descriptor
    }
}
