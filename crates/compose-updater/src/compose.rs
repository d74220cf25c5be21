// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Typed compose document model
//!
//! Only the keys the updater works with are typed (`services`, `image`,
//! `container_name`, `ports`). Every other key is kept in an ordered YAML
//! mapping so a document survives a parse/serialize cycle without losing
//! content.

use crate::error::{Result, UpdaterError};
use crate::report::ServiceUpdate;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

/// One container entry of an app, as seen by the update fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Repository part of the image reference (e.g. "nginx", "ghcr.io/org/app")
    pub image: String,
    /// Tag part of the image reference, empty when the reference has none
    pub tag: String,
}

/// Image reference split into repository and tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef<'a> {
    pub repository: &'a str,
    pub tag: Option<&'a str>,
}

impl<'a> ImageRef<'a> {
    /// Split `repository[:tag]`. A colon before the last `/` belongs to a
    /// registry host (`registry:5000/app`) and is not a tag separator.
    pub fn parse(image: &'a str) -> Self {
        let name_start = image.rfind('/').map_or(0, |idx| idx + 1);
        let (_, name) = image.split_at(name_start);
        match name.rfind(':') {
            Some(idx) => {
                let (repository, tag) = image.split_at(name_start + idx);
                Self {
                    repository,
                    tag: Some(tag.trim_start_matches(':')),
                }
            }
            None => Self {
                repository: image,
                tag: None,
            },
        }
    }

    pub fn with_tag(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Port entries in short (`"8080:80"`) or long (mapping) syntax
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Value>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl ComposeService {
    /// Whether any port entry already publishes `port` on the host
    pub fn publishes_host_port(&self, port: &str) -> bool {
        self.ports.iter().any(|entry| match entry {
            Value::String(spec) => host_port_of(spec) == Some(port),
            Value::Mapping(long) => match long.get("published") {
                Some(Value::String(published)) => published == port,
                Some(Value::Number(published)) => published.to_string() == port,
                _ => false,
            },
            _ => false,
        })
    }
}

/// Host port of a short-syntax entry: "8080:80", "127.0.0.1:8080:80/tcp"
fn host_port_of(spec: &str) -> Option<&str> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    parts.get(parts.len() - 2).copied()
}

/// Ordered service name → service map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMap(Vec<(String, ComposeService)>);

impl ServiceMap {
    pub fn get(&self, name: &str) -> Option<&ComposeService> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ComposeService> {
        self.0.iter_mut().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComposeService)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn insert(&mut self, name: impl Into<String>, service: ComposeService) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => *existing = service,
            None => self.0.push((name, service)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ServiceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut mapping = Mapping::with_capacity(self.0.len());
        for (name, service) in &self.0 {
            let value = serde_yaml::to_value(service).map_err(S::Error::custom)?;
            mapping.insert(Value::String(name.clone()), value);
        }
        mapping.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServiceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mapping = Mapping::deserialize(deserializer)?;
        let mut services = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let Value::String(name) = key else {
                return Err(D::Error::custom("service names must be strings"));
            };
            let service = if value.is_null() {
                ComposeService::default()
            } else {
                serde_yaml::from_value(value)
                    .map_err(|e| D::Error::custom(format!("service {name}: {e}")))?
            };
            services.push((name, service));
        }
        Ok(Self(services))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceMap>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl ComposeDocument {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(self)?.into_bytes())
    }

    fn require_services(&self) -> Result<&ServiceMap> {
        self.services
            .as_ref()
            .ok_or_else(|| UpdaterError::Compose("services key missing".to_owned()))
    }

    fn require_services_mut(&mut self) -> Result<&mut ServiceMap> {
        self.services
            .as_mut()
            .ok_or_else(|| UpdaterError::Compose("services key missing".to_owned()))
    }

    /// Services that run a registry image; services built locally are skipped
    pub fn services(&self) -> Result<Vec<Service>> {
        let services = self.require_services()?;
        Ok(services
            .iter()
            .filter_map(|(name, service)| {
                let image = ImageRef::parse(service.image.as_deref()?);
                Some(Service {
                    name: name.to_owned(),
                    image: image.repository.to_owned(),
                    tag: image.tag.unwrap_or_default().to_owned(),
                })
            })
            .collect())
    }

    /// Return a copy of the document with every update applied.
    ///
    /// Either all updates apply or an error is returned; `self` is never
    /// modified.
    pub fn apply_tag_updates(&self, updates: &[ServiceUpdate]) -> Result<Self> {
        let mut patched = self.clone();
        let services = patched.require_services_mut()?;
        for update in updates {
            let service = services.get_mut(&update.service_name).ok_or_else(|| {
                UpdaterError::Compose(format!("service {} missing", update.service_name))
            })?;
            let image = service.image.as_deref().ok_or_else(|| {
                UpdaterError::Compose(format!("image missing in service {}", update.service_name))
            })?;
            let new_image = ImageRef::parse(image).with_tag(&update.new_tag);
            service.image = Some(new_image);
        }
        Ok(patched)
    }

    /// Publish `port:port` on `service_name`, or on the first service when no
    /// service has that name. Returns false when the host port is already
    /// published and the document was left unchanged.
    pub fn inject_port_mapping(&mut self, service_name: &str, port: &str) -> Result<bool> {
        let services = self.require_services_mut()?;
        let target = if services.get(service_name).is_some() {
            services.get_mut(service_name)
        } else {
            services.0.first_mut().map(|(_, s)| s)
        };
        let service =
            target.ok_or_else(|| UpdaterError::Compose("compose has no services".to_owned()))?;

        if service.publishes_host_port(port) {
            return Ok(false);
        }
        service.ports.push(Value::String(format!("{port}:{port}")));
        Ok(true)
    }
}

/// Apply tag updates to raw compose bytes and re-serialize the result
pub fn update_compose_tags(data: &[u8], updates: &[ServiceUpdate]) -> Result<Vec<u8>> {
    let document = ComposeDocument::from_slice(data)?;
    document.apply_tag_updates(updates)?.to_vec()
}
