//! [`DocumentStore`] backed by a namespaced Kubernetes object
//!
//! The object is addressed dynamically (group, version, plural, name) so any
//! custom resource or a plain ConfigMap can act as the tracked document.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use kube::api::{Api, ApiResource, DynamicObject, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{apply_updates, resource_version, Document, DocumentEvent, DocumentStore, EventType, FieldUpdate};
use crate::config::CustomResourceConfig;
use crate::error::{Error, Result};

/// Kubernetes-backed tracked document
#[derive(Clone)]
pub struct KubeDocumentStore {
    api: Api<DynamicObject>,
    name: String,
}

impl KubeDocumentStore {
    pub fn new(client: Client, resource: &CustomResourceConfig) -> Self {
        let api_resource = api_resource(resource);
        Self {
            api: Api::namespaced_with(client, &resource.namespace, &api_resource),
            name: resource.name.clone(),
        }
    }

    async fn fetch(&self) -> Result<DynamicObject> {
        match self.api.get(&self.name).await {
            Ok(obj) => Ok(obj),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(Error::NotFound(self.name.clone())),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    /// Read-modify-replace; the fetched resourceVersion makes the write
    /// conditional on nobody else having written in between.
    async fn replace(&self, updates: Vec<FieldUpdate>, status: bool) -> Result<()> {
        let current = self.fetch().await?;
        let mut content = serde_json::to_value(&current)?;
        apply_updates(&mut content, &updates)?;

        let pp = PostParams::default();
        if status {
            self.api
                .replace_status(&self.name, &pp, serde_json::to_vec(&content)?)
                .await?;
        } else {
            let object: DynamicObject = serde_json::from_value(content)?;
            self.api.replace(&self.name, &pp, &object).await?;
        }
        Ok(())
    }
}

fn api_resource(resource: &CustomResourceConfig) -> ApiResource {
    let api_version = if resource.group.is_empty() {
        resource.version.clone()
    } else {
        format!("{}/{}", resource.group, resource.version)
    };
    ApiResource {
        group: resource.group.clone(),
        version: resource.version.clone(),
        api_version,
        kind: String::new(),
        plural: resource.resource.clone(),
    }
}

fn to_event(last: &mut Option<Value>, object: DynamicObject) -> Result<DocumentEvent> {
    let current = serde_json::to_value(&object)?;
    let old = last.replace(current.clone());
    let event_type = if old.is_some() {
        EventType::Modified
    } else {
        EventType::Added
    };
    Ok(DocumentEvent {
        event_type,
        old,
        new: Some(current),
    })
}

#[async_trait]
impl DocumentStore for KubeDocumentStore {
    #[instrument(skip(self), fields(name = %self.name))]
    async fn get(&self) -> Result<Document> {
        let content = serde_json::to_value(self.fetch().await?)?;
        let version = resource_version(&content);
        Ok(Document { content, version })
    }

    #[instrument(skip(self, updates), fields(name = %self.name, count = updates.len()))]
    async fn update_fields(&self, updates: Vec<FieldUpdate>) -> Result<()> {
        self.replace(updates, false).await
    }

    #[instrument(skip(self, updates), fields(name = %self.name, count = updates.len()))]
    async fn update_status(&self, updates: Vec<FieldUpdate>) -> Result<()> {
        self.replace(updates, true).await
    }

    fn watch(&self) -> BoxStream<'static, Result<DocumentEvent>> {
        let config = watcher::Config::default().fields(&format!("metadata.name={}", self.name));
        debug!(name = %self.name, "Starting document watch");

        watcher(self.api.clone(), config)
            .default_backoff()
            .scan(None::<Value>, |last, event| {
                let item = match event {
                    Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                        Some(to_event(last, obj))
                    }
                    Ok(watcher::Event::Delete(obj)) => {
                        let old = last.take();
                        Some(serde_json::to_value(&obj).map_err(Error::from).map(|current| {
                            DocumentEvent {
                                event_type: EventType::Deleted,
                                old,
                                new: Some(current),
                            }
                        }))
                    }
                    Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(Error::WatchError(e))),
                };
                future::ready(Some(item))
            })
            .filter_map(future::ready)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(group: &str) -> CustomResourceConfig {
        CustomResourceConfig {
            group: group.to_string(),
            version: "v1".to_string(),
            resource: "configmaps".to_string(),
            name: "dr-config".to_string(),
            namespace: "dr".to_string(),
        }
    }

    #[test]
    fn test_core_group_api_version() {
        let ar = api_resource(&resource(""));
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.plural, "configmaps");
    }

    #[test]
    fn test_named_group_api_version() {
        let ar = api_resource(&resource("disaster-recovery.io"));
        assert_eq!(ar.api_version, "disaster-recovery.io/v1");
        assert_eq!(ar.group, "disaster-recovery.io");
    }
}
