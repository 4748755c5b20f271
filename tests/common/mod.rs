//! Common test utilities for the integration tests
//!
//! In-memory stand-ins for S3, Vault and the Kubernetes API, plus builders
//! for Bucket and Provider records.

#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use base64::Engine;
use bucket_controller::config::{ControllerConfig, VaultSettings};
use bucket_controller::credentials::vault::{
    SessionManager, VaultApi, VaultConnector, VaultEndpoint, VaultLogin,
};
use bucket_controller::credentials::{CredentialError, StaticCredentials};
use bucket_controller::crd::{
    Bucket, BucketSpec, BucketStatus, CannedAcl, Provider, ProviderSpec, ProviderType,
};
use bucket_controller::controller::reconciler::{BucketStore, Reconciler};
use bucket_controller::provider::storage::{
    CreateBucketRequest, ListCursor, ObjectId, ObjectPage, StorageApi, StorageError,
};
use bucket_controller::provider::{ProviderClientCache, ProviderError, StorageConnector};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zeroize::Zeroizing;

/// One recorded S3 call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Location(String),
    Create(CreateBucketRequest),
    List(String),
    DeleteObjects(String, usize),
    DeleteBucket(String),
    Versioning(String, bool),
    Acceleration(String, bool),
    Policy(String),
    Acl(String, CannedAcl),
    Tagging(String, BTreeMap<String, String>),
}

/// Remote state of one fake bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteBucket {
    pub objects: Vec<ObjectId>,
    pub versioning: Option<bool>,
    pub acceleration: Option<bool>,
    pub policy: Option<String>,
    pub acl: Option<CannedAcl>,
    pub tags: BTreeMap<String, String>,
}

/// In-memory S3
#[derive(Debug)]
pub struct FakeStorage {
    pub buckets: Mutex<HashMap<String, RemoteBucket>>,
    pub calls: Mutex<Vec<Call>>,
    /// Operation name that fails with an API error
    pub fail_on: Mutex<Option<&'static str>>,
    pub page_size: usize,
}

impl Default for FakeStorage {
    fn default() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            page_size: 1000,
        }
    }
}

impl FakeStorage {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Seed a bucket holding `objects` object versions
    pub fn seed_bucket(&self, name: &str, objects: usize) {
        let objects = (0..objects)
            .map(|i| ObjectId {
                key: format!("object-{i:04}"),
                version_id: Some(format!("v{i}")),
            })
            .collect();
        self.buckets.lock().unwrap().insert(
            name.to_string(),
            RemoteBucket {
                objects,
                ..RemoteBucket::default()
            },
        );
    }

    pub fn fail(&self, operation: &'static str) {
        *self.fail_on.lock().unwrap() = Some(operation);
    }

    pub fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub fn bucket(&self, name: &str) -> Option<RemoteBucket> {
        self.buckets.lock().unwrap().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, operation: &'static str, bucket: &str, call: Call) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(StorageError::Api {
                operation,
                bucket: bucket.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn update(
        &self,
        bucket: &str,
        apply: impl FnOnce(&mut RemoteBucket),
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.lock().unwrap();
        let remote = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            })?;
        apply(remote);
        Ok(())
    }
}

#[async_trait]
impl StorageApi for FakeStorage {
    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, StorageError> {
        self.record("get_bucket_location", bucket, Call::Location(bucket.to_string()))?;
        if self.buckets.lock().unwrap().contains_key(bucket) {
            Ok(None)
        } else {
            Err(StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            })
        }
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), StorageError> {
        self.record("create_bucket", &request.bucket, Call::Create(request.clone()))?;
        self.buckets
            .lock()
            .unwrap()
            .entry(request.bucket.clone())
            .or_default();
        Ok(())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: Option<&ListCursor>,
    ) -> Result<ObjectPage, StorageError> {
        self.record("list_object_versions", bucket, Call::List(bucket.to_string()))?;
        let buckets = self.buckets.lock().unwrap();
        let remote = buckets.get(bucket).ok_or_else(|| StorageError::NoSuchBucket {
            bucket: bucket.to_string(),
        })?;

        let start = cursor
            .and_then(|c| c.key_marker.as_deref())
            .map_or(0, |marker| {
                remote
                    .objects
                    .iter()
                    .position(|o| o.key.as_str() > marker)
                    .unwrap_or(remote.objects.len())
            });
        let objects: Vec<ObjectId> = remote
            .objects
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = (start + objects.len() < remote.objects.len()).then(|| ListCursor {
            key_marker: objects.last().map(|o| o.key.clone()),
            version_id_marker: objects.last().and_then(|o| o.version_id.clone()),
        });
        Ok(ObjectPage { objects, next })
    }

    async fn delete_objects(&self, bucket: &str, objects: &[ObjectId]) -> Result<(), StorageError> {
        self.record(
            "delete_objects",
            bucket,
            Call::DeleteObjects(bucket.to_string(), objects.len()),
        )?;
        self.update(bucket, |remote| {
            remote.objects.retain(|o| !objects.contains(o));
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.record("delete_bucket", bucket, Call::DeleteBucket(bucket.to_string()))?;
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get(bucket) {
            Some(remote) if !remote.objects.is_empty() => Err(StorageError::Api {
                operation: "delete_bucket",
                bucket: bucket.to_string(),
                message: "BucketNotEmpty".to_string(),
            }),
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
            None => Err(StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            }),
        }
    }

    async fn put_versioning(&self, bucket: &str, enabled: bool) -> Result<(), StorageError> {
        self.record(
            "put_bucket_versioning",
            bucket,
            Call::Versioning(bucket.to_string(), enabled),
        )?;
        self.update(bucket, |remote| remote.versioning = Some(enabled))
    }

    async fn put_acceleration(&self, bucket: &str, enabled: bool) -> Result<(), StorageError> {
        self.record(
            "put_bucket_accelerate_configuration",
            bucket,
            Call::Acceleration(bucket.to_string(), enabled),
        )?;
        self.update(bucket, |remote| remote.acceleration = Some(enabled))
    }

    async fn put_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.record("put_bucket_policy", bucket, Call::Policy(bucket.to_string()))?;
        self.update(bucket, |remote| remote.policy = Some(policy.to_string()))
    }

    async fn put_acl(&self, bucket: &str, acl: CannedAcl) -> Result<(), StorageError> {
        self.record("put_bucket_acl", bucket, Call::Acl(bucket.to_string(), acl))?;
        self.update(bucket, |remote| remote.acl = Some(acl))
    }

    async fn put_tagging(
        &self,
        bucket: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        self.record(
            "put_bucket_tagging",
            bucket,
            Call::Tagging(bucket.to_string(), tags.clone()),
        )?;
        self.update(bucket, |remote| remote.tags = tags.clone())
    }
}

/// Hands out the shared [`FakeStorage`] and remembers which credentials it was given
#[derive(Debug, Default)]
pub struct FakeStorageConnector {
    pub storage: Arc<FakeStorage>,
    pub connects: AtomicUsize,
    pub access_key_ids: Mutex<Vec<Option<String>>>,
}

impl FakeStorageConnector {
    pub fn new(storage: Arc<FakeStorage>) -> Self {
        Self {
            storage,
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageConnector for FakeStorageConnector {
    async fn connect(
        &self,
        _region: &str,
        credentials: Option<&StaticCredentials>,
    ) -> Result<Arc<dyn StorageApi>, ProviderError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.access_key_ids
            .lock()
            .unwrap()
            .push(credentials.map(|c| c.access_key_id.clone()));
        Ok(Arc::clone(&self.storage) as Arc<dyn StorageApi>)
    }
}

/// Vault double serving one KV v2 secret
#[derive(Debug)]
pub struct FakeVault {
    pub lease_secs: u64,
    pub logins: AtomicUsize,
    pub secret: Value,
}

impl FakeVault {
    pub fn new(lease_secs: u64) -> Self {
        Self {
            lease_secs,
            logins: AtomicUsize::new(0),
            secret: json!({
                "data": {
                    "data": {
                        "access_key": "AKIAVAULTRESOLVED",
                        "secret_key": "resolved-secret"
                    }
                }
            }),
        }
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultApi for FakeVault {
    async fn login(
        &self,
        _auth_path: &str,
        _role: &str,
        _jwt: &str,
    ) -> Result<VaultLogin, CredentialError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(VaultLogin {
            client_token: Zeroizing::new("s.fake".to_string()),
            lease_duration: Duration::from_secs(self.lease_secs),
        })
    }

    async fn read(&self, _token: &str, _path: &str) -> Result<Option<Value>, CredentialError> {
        Ok(Some(self.secret.clone()))
    }
}

#[derive(Debug)]
pub struct FakeVaultConnector(pub Arc<FakeVault>);

impl VaultConnector for FakeVaultConnector {
    fn connect(&self, _endpoint: &VaultEndpoint) -> Result<Arc<dyn VaultApi>, CredentialError> {
        Ok(Arc::clone(&self.0) as Arc<dyn VaultApi>)
    }
}

/// Projected service account token stand-in
pub fn identity_token_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "header.payload.signature").unwrap();
    file
}

/// Everything a reconcile test needs, wired together
pub struct Harness {
    pub storage: Arc<FakeStorage>,
    pub connector: Arc<FakeStorageConnector>,
    pub vault: Arc<FakeVault>,
    pub clients: Arc<ProviderClientCache>,
    pub store: Arc<FakeStore>,
    _token: tempfile::NamedTempFile,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_vault_lease(3600)
    }

    pub fn with_vault_lease(lease_secs: u64) -> Self {
        Self::build(Arc::new(FakeStorage::default()), lease_secs)
    }

    pub fn build(storage: Arc<FakeStorage>, lease_secs: u64) -> Self {
        let token = identity_token_file();
        let vault = Arc::new(FakeVault::new(lease_secs));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(FakeVaultConnector(Arc::clone(&vault))),
            VaultSettings {
                identity_token_path: token.path().to_path_buf(),
                ..VaultSettings::default()
            },
        ));
        let connector = Arc::new(FakeStorageConnector::new(Arc::clone(&storage)));
        let clients = Arc::new(ProviderClientCache::new(
            sessions,
            Arc::clone(&connector) as Arc<dyn StorageConnector>,
        ));
        Self {
            storage,
            connector,
            vault,
            clients,
            store: Arc::new(FakeStore::default()),
            _token: token,
        }
    }

    /// Controller context sharing this harness's store and client cache
    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::new(Reconciler::with_parts(
            Arc::clone(&self.store) as Arc<dyn BucketStore>,
            Arc::clone(&self.clients),
            ControllerConfig::default(),
        ))
    }
}

/// In-memory Kubernetes API for Buckets and Providers
#[derive(Debug, Default)]
pub struct FakeStore {
    pub buckets: Mutex<HashMap<(String, String), Bucket>>,
    pub providers: Mutex<HashMap<String, Provider>>,
    pub finalizer_writes: AtomicUsize,
    pub status_writes: AtomicUsize,
}

impl FakeStore {
    pub fn put_bucket(&self, bucket: Bucket) {
        let key = (
            bucket.metadata.namespace.clone().unwrap_or_default(),
            bucket.metadata.name.clone().unwrap_or_default(),
        );
        self.buckets.lock().unwrap().insert(key, bucket);
    }

    pub fn put_provider(&self, provider: Provider) {
        let name = provider.metadata.name.clone().unwrap_or_default();
        self.providers.lock().unwrap().insert(name, provider);
    }

    pub fn bucket(&self, namespace: &str, name: &str) -> Option<Bucket> {
        self.buckets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Simulate `kubectl delete`: set the deletion timestamp, or remove
    /// outright when no finalizers are left
    pub fn request_delete(&self, namespace: &str, name: &str) {
        let mut buckets = self.buckets.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let Some(bucket) = buckets.get_mut(&key) else {
            return;
        };
        if bucket.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            buckets.remove(&key);
        } else {
            bucket.metadata.deletion_timestamp = Some(
                serde_json::from_value(json!("2024-01-01T00:00:00Z")).unwrap(),
            );
        }
    }

    pub fn finalizer_writes(&self) -> usize {
        self.finalizer_writes.load(Ordering::SeqCst)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BucketStore for FakeStore {
    async fn get_bucket(&self, namespace: &str, name: &str) -> Result<Option<Bucket>, kube::Error> {
        Ok(self.bucket(namespace, name))
    }

    async fn get_provider(&self, name: &str) -> Result<Option<Provider>, kube::Error> {
        Ok(self.providers.lock().unwrap().get(name).cloned())
    }

    async fn replace_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        _resource_version: Option<String>,
    ) -> Result<(), kube::Error> {
        self.finalizer_writes.fetch_add(1, Ordering::SeqCst);
        let mut buckets = self.buckets.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        if let Some(bucket) = buckets.get_mut(&key) {
            // The API server drops a deleting record once its last finalizer goes
            if finalizers.is_empty() && bucket.metadata.deletion_timestamp.is_some() {
                buckets.remove(&key);
            } else {
                bucket.metadata.finalizers = Some(finalizers);
            }
        }
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BucketStatus,
    ) -> Result<(), kube::Error> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(bucket) = self
            .buckets
            .lock()
            .unwrap()
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            bucket.status = Some(status.clone());
        }
        Ok(())
    }
}

pub fn spec(region: &str, bucket_name: &str) -> BucketSpec {
    BucketSpec {
        region: region.to_string(),
        bucket_name: bucket_name.to_string(),
        enable_versioning: false,
        enable_object_lock: false,
        enable_transfer_acceleration: false,
        bucket_policy: None,
        canned_bucket_acl: CannedAcl::Private,
        tags: BTreeMap::new(),
        provider_ref: "aws-main".to_string(),
    }
}

pub fn bucket(namespace: &str, name: &str, spec: BucketSpec) -> Bucket {
    let mut bucket = Bucket::new(name, spec);
    bucket.metadata.namespace = Some(namespace.to_string());
    bucket.metadata.generation = Some(1);
    bucket.metadata.resource_version = Some("1".to_string());
    bucket
}

fn encode(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

pub fn provider(name: &str, provider_type: ProviderType, credentials: &[(&str, &str)]) -> Provider {
    Provider::new(
        name,
        ProviderSpec {
            provider_type,
            credentials: credentials
                .iter()
                .map(|(k, v)| ((*k).to_string(), encode(v)))
                .collect(),
        },
    )
}

pub fn static_provider(name: &str) -> Provider {
    provider(
        name,
        ProviderType::Aws,
        &[
            ("AWS_ACCESS_KEY_ID", "AKIALITERAL"),
            ("AWS_SECRET_ACCESS_KEY", "literal-secret"),
        ],
    )
}

pub fn vault_provider(name: &str) -> Provider {
    provider(
        name,
        ProviderType::Aws,
        &[
            ("AWS_ACCESS_KEY_ID", "vault:secret/data/aws#access_key"),
            ("AWS_SECRET_ACCESS_KEY", "vault:secret/data/aws#secret_key"),
            ("VAULT_K8S_AUTH_BACKEND_PATH", "auth/kubernetes"),
            ("VAULT_K8S_AUTH_BACKEND_ROLE", "bucket-controller"),
        ],
    )
}
