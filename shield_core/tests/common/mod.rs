#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use shield_core::entity::display_value;
use shield_core::{
    acl_fn, AclBackend, AclQuestion, Entity, Principal, Record, Repository, Result, ShieldError,
    StorageError,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory repository that records every raw primitive call.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    records: Arc<Mutex<BTreeMap<String, Record>>>,
    calls: Arc<Mutex<Vec<(&'static str, Record)>>>,
    next_id: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicUsize::new(100)),
            ..Self::default()
        }
    }

    pub fn with_record(self, record: Record) -> Self {
        let key = display_value(record.primary_key().as_ref());
        self.records.lock().unwrap().insert(key, record);
        self
    }

    pub fn stored(&self, id: impl Into<Value>) -> Option<Record> {
        let key = display_value(Some(&id.into()));
        self.records.lock().unwrap().get(&key).cloned()
    }

    pub fn calls(&self, primitive: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == primitive)
            .count()
    }

    /// Records passed to a primitive, in call order.
    pub fn calls_with(&self, primitive: &str) -> Vec<Record> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == primitive)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn record_call(&self, primitive: &'static str, record: &Record) {
        self.calls.lock().unwrap().push((primitive, record.clone()));
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    type Entity = Record;
    type Options = ();

    async fn fetch(&self, entity: &Record, _options: &()) -> Result<Record> {
        self.record_call("fetch", entity);
        let key = display_value(entity.primary_key().as_ref());
        self.records
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{} {}", entity.model_name(), key)).into())
    }

    async fn fetch_all(&self, filter: &Record, _options: &()) -> Result<Vec<Record>> {
        self.record_call("fetch_all", filter);
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.matches(filter))
            .cloned()
            .collect())
    }

    async fn save(&self, entity: &Record, _options: &()) -> Result<Record> {
        self.record_call("save", entity);
        let mut record = entity.clone();
        if record.is_new() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            record.insert(record.id_attribute().to_string(), id);
        }
        let key = display_value(record.primary_key().as_ref());
        self.records.lock().unwrap().insert(key, record.clone());
        Ok(record)
    }

    async fn destroy(&self, entity: &Record, _options: &()) -> Result<()> {
        self.record_call("destroy", entity);
        let key = display_value(entity.primary_key().as_ref());
        self.records
            .lock()
            .unwrap()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key).into())
    }
}

/// Counts how many questions an ACL context was asked.
#[derive(Debug, Clone, Default)]
pub struct AclSpy {
    asked: Arc<Mutex<Vec<String>>>,
}

impl AclSpy {
    pub fn count(&self) -> usize {
        self.asked.lock().unwrap().len()
    }

    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

/// The `alwaysTrue`/`alwaysFalse`/`alwaysError` contexts, all reporting to
/// one spy.
pub fn stub_acl(spy: &AclSpy) -> AclBackend {
    let context = |answer: Option<bool>| {
        let asked = Arc::clone(&spy.asked);
        acl_fn(move |question: String| {
            asked.lock().unwrap().push(question);
            async move {
                answer.ok_or_else(|| ShieldError::Acl("This is a test error".into()))
            }
        })
    };

    AclBackend::new()
        .with_context("alwaysTrue", context(Some(true)))
        .with_context("alwaysFalse", context(Some(false)))
        .with_context("alwaysError", context(None))
}

/// A context granting exactly the listed (principal, permission, object)
/// triples.
pub fn grants_context(
    spy: &AclSpy,
    grants: &[(&str, &str, &str)],
) -> Arc<dyn shield_core::AclContext> {
    let grants: HashSet<(String, String, String)> = grants
        .iter()
        .map(|(p, perm, o)| (p.to_string(), perm.to_string(), o.to_string()))
        .collect();
    let grants = Arc::new(grants);
    let asked = Arc::clone(&spy.asked);

    acl_fn(move |question: String| {
        asked.lock().unwrap().push(question.clone());
        let grants = Arc::clone(&grants);
        async move {
            let q = AclQuestion::parse(&question)?;
            Ok::<_, ShieldError>(grants.contains(&(q.principal, q.permission, q.object)))
        }
    })
}

pub fn user(name: &str) -> Principal {
    Principal::new(name)
}

pub fn study(id: i64) -> Record {
    Record::new("Study").set("id", id)
}
