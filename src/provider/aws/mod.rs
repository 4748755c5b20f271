//! # AWS S3 Client
//!
//! [`StorageApi`] implementation backed by the official AWS SDK.
//!
//! This module provides functionality to:
//! - Build S3 clients from static or ambient credentials
//! - Point clients at an S3-compatible endpoint with path-style addressing
//! - Bound SDK retries per call
//! - Record per-operation metrics and spans

use crate::config::S3Settings;
use crate::credentials::StaticCredentials;
use crate::crd::CannedAcl;
use crate::observability::metrics;
use crate::provider::storage::{
    CreateBucketRequest, ListCursor, ObjectId, ObjectPage, StorageApi, StorageError,
};
use crate::provider::{ProviderError, StorageConnector};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{
    AccelerateConfiguration, BucketAccelerateStatus, BucketCannedAcl, BucketLocationConstraint,
    BucketVersioningStatus, CreateBucketConfiguration, Delete, ObjectIdentifier, Tag, Tagging,
    VersioningConfiguration,
};
use aws_sdk_s3::Client as S3Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const PROVIDER: &str = "aws";
const NO_SUCH_BUCKET: &str = "NoSuchBucket";

/// S3 storage backend
pub struct S3Storage {
    client: S3Client,
    region: String,
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Storage {
    pub fn new(client: S3Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Run one API call, recording its duration or failure
    async fn observe<T, F>(&self, operation: &'static str, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let start = Instant::now();
        let result = call.await;
        match &result {
            Ok(_) | Err(StorageError::NoSuchBucket { .. }) => {
                metrics::record_provider_operation(
                    PROVIDER,
                    operation,
                    start.elapsed().as_secs_f64(),
                );
            }
            Err(_) => metrics::increment_provider_operation_errors(PROVIDER, operation),
        }
        result
    }
}

fn api_error<E>(operation: &'static str, bucket: &str, err: &SdkError<E>) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::Api {
        operation,
        bucket: bucket.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

fn build_error(
    operation: &'static str,
    bucket: &str,
    err: &aws_sdk_s3::error::BuildError,
) -> StorageError {
    StorageError::Api {
        operation,
        bucket: bucket.to_string(),
        message: err.to_string(),
    }
}

fn enabled_versioning(enabled: bool) -> BucketVersioningStatus {
    if enabled {
        BucketVersioningStatus::Enabled
    } else {
        BucketVersioningStatus::Suspended
    }
}

fn enabled_acceleration(enabled: bool) -> BucketAccelerateStatus {
    if enabled {
        BucketAccelerateStatus::Enabled
    } else {
        BucketAccelerateStatus::Suspended
    }
}

#[async_trait]
impl StorageApi for S3Storage {
    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, StorageError> {
        self.observe("get_bucket_location", async {
            match self.client.get_bucket_location().bucket(bucket).send().await {
                Ok(output) => Ok(output
                    .location_constraint()
                    .map(|constraint| constraint.as_str().to_string())),
                Err(err) => {
                    if err
                        .as_service_error()
                        .and_then(ProvideErrorMetadata::code)
                        == Some(NO_SUCH_BUCKET)
                    {
                        return Err(StorageError::NoSuchBucket {
                            bucket: bucket.to_string(),
                        });
                    }
                    Err(api_error("get_bucket_location", bucket, &err))
                }
            }
        })
        .await
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), StorageError> {
        self.observe("create_bucket", async {
            let mut call = self
                .client
                .create_bucket()
                .bucket(&request.bucket)
                .object_lock_enabled_for_bucket(request.object_lock);
            if let Some(region) = &request.location_constraint {
                call = call.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region.as_str()))
                        .build(),
                );
            }
            call.send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("create_bucket", &request.bucket, &err))
        })
        .await
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: Option<&ListCursor>,
    ) -> Result<ObjectPage, StorageError> {
        self.observe("list_object_versions", async {
            let output = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(cursor.and_then(|c| c.key_marker.clone()))
                .set_version_id_marker(cursor.and_then(|c| c.version_id_marker.clone()))
                .send()
                .await
                .map_err(|err| api_error("list_object_versions", bucket, &err))?;

            let versions = output
                .versions()
                .iter()
                .map(|v| (v.key(), v.version_id()));
            let markers = output
                .delete_markers()
                .iter()
                .map(|m| (m.key(), m.version_id()));
            let objects = versions
                .chain(markers)
                .filter_map(|(key, version_id)| {
                    key.map(|key| ObjectId {
                        key: key.to_string(),
                        version_id: version_id.map(str::to_string),
                    })
                })
                .collect();

            let next = output.is_truncated().unwrap_or(false).then(|| ListCursor {
                key_marker: output.next_key_marker().map(str::to_string),
                version_id_marker: output.next_version_id_marker().map(str::to_string),
            });

            Ok(ObjectPage { objects, next })
        })
        .await
    }

    async fn delete_objects(&self, bucket: &str, objects: &[ObjectId]) -> Result<(), StorageError> {
        if objects.is_empty() {
            return Ok(());
        }
        self.observe("delete_objects", async {
            let identifiers = objects
                .iter()
                .map(|object| {
                    ObjectIdentifier::builder()
                        .key(&object.key)
                        .set_version_id(object.version_id.clone())
                        .build()
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| build_error("delete_objects", bucket, &err))?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|err| build_error("delete_objects", bucket, &err))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| api_error("delete_objects", bucket, &err))?;

            let errors = output.errors();
            if let Some(first) = errors.first() {
                return Err(StorageError::PartialDelete {
                    bucket: bucket.to_string(),
                    failed: errors.len(),
                    first_error: format!(
                        "{}: {} ({})",
                        first.key().unwrap_or("<unknown key>"),
                        first.message().unwrap_or("no message"),
                        first.code().unwrap_or("no code")
                    ),
                });
            }
            debug!("Deleted {} objects from {}", objects.len(), bucket);
            Ok(())
        })
        .await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.observe("delete_bucket", async {
            self.client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("delete_bucket", bucket, &err))
        })
        .await
    }

    async fn put_versioning(&self, bucket: &str, enabled: bool) -> Result<(), StorageError> {
        self.observe("put_bucket_versioning", async {
            self.client
                .put_bucket_versioning()
                .bucket(bucket)
                .versioning_configuration(
                    VersioningConfiguration::builder()
                        .status(enabled_versioning(enabled))
                        .build(),
                )
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("put_bucket_versioning", bucket, &err))
        })
        .await
    }

    async fn put_acceleration(&self, bucket: &str, enabled: bool) -> Result<(), StorageError> {
        self.observe("put_bucket_accelerate_configuration", async {
            self.client
                .put_bucket_accelerate_configuration()
                .bucket(bucket)
                .accelerate_configuration(
                    AccelerateConfiguration::builder()
                        .status(enabled_acceleration(enabled))
                        .build(),
                )
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("put_bucket_accelerate_configuration", bucket, &err))
        })
        .await
    }

    async fn put_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.observe("put_bucket_policy", async {
            self.client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(policy)
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("put_bucket_policy", bucket, &err))
        })
        .await
    }

    async fn put_acl(&self, bucket: &str, acl: CannedAcl) -> Result<(), StorageError> {
        self.observe("put_bucket_acl", async {
            self.client
                .put_bucket_acl()
                .bucket(bucket)
                .acl(BucketCannedAcl::from(acl.as_str()))
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("put_bucket_acl", bucket, &err))
        })
        .await
    }

    async fn put_tagging(
        &self,
        bucket: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        // PutBucketTagging rejects an empty tag set
        if tags.is_empty() {
            return self
                .observe("delete_bucket_tagging", async {
                    self.client
                        .delete_bucket_tagging()
                        .bucket(bucket)
                        .send()
                        .await
                        .map(|_| ())
                        .map_err(|err| api_error("delete_bucket_tagging", bucket, &err))
                })
                .await;
        }

        self.observe("put_bucket_tagging", async {
            let tag_set = tags
                .iter()
                .map(|(key, value)| Tag::builder().key(key).value(value).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| build_error("put_bucket_tagging", bucket, &err))?;
            let tagging = Tagging::builder()
                .set_tag_set(Some(tag_set))
                .build()
                .map_err(|err| build_error("put_bucket_tagging", bucket, &err))?;

            self.client
                .put_bucket_tagging()
                .bucket(bucket)
                .tagging(tagging)
                .send()
                .await
                .map(|_| ())
                .map_err(|err| api_error("put_bucket_tagging", bucket, &err))
        })
        .await
    }
}

/// Builds [`S3Storage`] clients with the controller's S3 settings applied
#[derive(Debug, Clone)]
pub struct S3Connector {
    settings: S3Settings,
}

impl S3Connector {
    #[must_use]
    pub fn new(settings: S3Settings) -> Self {
        Self { settings }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.settings.max_attempts)
            .with_initial_backoff(self.settings.initial_backoff())
    }
}

#[async_trait]
impl StorageConnector for S3Connector {
    async fn connect(
        &self,
        region: &str,
        credentials: Option<&StaticCredentials>,
    ) -> Result<Arc<dyn StorageApi>, ProviderError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .retry_config(self.retry_config());

        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                "bucket-controller-provider",
            ));
        } else {
            debug!("No static credentials for {}, using the default AWS credential chain", region);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.settings.force_path_style);
        if let Some(endpoint) = &self.settings.endpoint_override {
            info!("Using S3 endpoint override {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        let client = S3Client::from_conf(builder.build());
        Ok(Arc::new(S3Storage::new(client, region)))
    }
}
