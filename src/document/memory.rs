//! In-process [`DocumentStore`] used by tests and embedders without a cluster

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};

use super::{apply_updates, path::set_nested, Document, DocumentEvent, DocumentStore, EventType, FieldPath, FieldUpdate};
use crate::error::{Error, Result};

struct Inner {
    content: Option<Value>,
    version: u64,
    field_writes: usize,
    status_writes: usize,
    watchers: Vec<UnboundedSender<DocumentEvent>>,
}

/// Document held in memory; versions start at 1 and grow by one per write
pub struct InMemoryStore {
    name: String,
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>, content: Value) -> Self {
        Self::with_content(name.into(), Some(content))
    }

    /// Store whose document does not exist; reads fail with `NotFound`
    pub fn empty(name: impl Into<String>) -> Self {
        Self::with_content(name.into(), None)
    }

    fn with_content(name: String, content: Option<Value>) -> Self {
        let mut store = Self {
            name,
            inner: Mutex::new(Inner {
                content,
                version: 1,
                field_writes: 0,
                status_writes: 0,
                watchers: Vec::new(),
            }),
        };
        let inner = store.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        stamp_version(inner);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current content, if the document exists
    pub fn snapshot(&self) -> Option<Value> {
        self.lock().content.clone()
    }

    pub fn version_number(&self) -> u64 {
        self.lock().version
    }

    /// Total number of successful writes (fields and status)
    pub fn write_count(&self) -> usize {
        let inner = self.lock();
        inner.field_writes + inner.status_writes
    }

    pub fn status_write_count(&self) -> usize {
        self.lock().status_writes
    }

    /// Replace the whole document as an external editor would
    pub fn replace_content(&self, content: Value) {
        let mut inner = self.lock();
        let old = inner.content.replace(content);
        inner.version += 1;
        stamp_version(&mut inner);
        notify(&mut inner, old);
    }

    fn write(&self, updates: Vec<FieldUpdate>, status: bool) -> Result<()> {
        let mut inner = self.lock();
        let Some(current) = inner.content.as_ref() else {
            return Err(Error::NotFound(self.name.clone()));
        };
        let mut next = current.clone();
        apply_updates(&mut next, &updates)?;

        let old = inner.content.replace(next);
        inner.version += 1;
        stamp_version(&mut inner);
        if status {
            inner.status_writes += 1;
        } else {
            inner.field_writes += 1;
        }
        notify(&mut inner, old);
        Ok(())
    }
}

fn stamp_version(inner: &mut Inner) {
    let version = inner.version.to_string();
    if let Some(content @ Value::Object(_)) = inner.content.as_mut() {
        // Best effort; object roots always accept the write
        let _ = set_nested(
            content,
            &FieldPath::parse("metadata.resourceVersion"),
            json!(version),
        );
    }
}

fn notify(inner: &mut Inner, old: Option<Value>) {
    let event = DocumentEvent {
        event_type: EventType::Modified,
        old,
        new: inner.content.clone(),
    };
    inner
        .watchers
        .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self) -> Result<Document> {
        let inner = self.lock();
        match inner.content.as_ref() {
            Some(content) => Ok(Document {
                content: content.clone(),
                version: inner.version.to_string(),
            }),
            None => Err(Error::NotFound(self.name.clone())),
        }
    }

    async fn update_fields(&self, updates: Vec<FieldUpdate>) -> Result<()> {
        self.write(updates, false)
    }

    async fn update_status(&self, updates: Vec<FieldUpdate>) -> Result<()> {
        self.write(updates, true)
    }

    fn watch(&self) -> BoxStream<'static, Result<DocumentEvent>> {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.lock();
        if let Some(content) = inner.content.clone() {
            let _ = tx.unbounded_send(DocumentEvent {
                event_type: EventType::Added,
                old: None,
                new: Some(content),
            });
        }
        inner.watchers.push(tx);
        rx.map(Ok).boxed()
    }
}
