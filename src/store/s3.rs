//! S3-backed [`ObjectStore`] using ListObjectsV2 and GetObject.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::DateTime;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ByteStream, ObjectStore};
use crate::error::{RemoteError, RemoteErrorKind};
use crate::types::{FileDescriptor, ListingPage};

/// Connection settings for [`S3Store`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct S3Options {
    /// AWS region (falls back to the environment/profile chain)
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL, e.g. for LocalStack or MinIO
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Named AWS profile
    #[serde(default)]
    pub profile: Option<String>,
}

/// Object store backed by a single S3 bucket
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Wrap an existing client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the default credential chain plus `options`
    pub async fn connect(bucket: impl Into<String>, options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;

        // Path-style addressing for custom endpoints (LocalStack, MinIO)
        let builder = aws_sdk_s3::config::Builder::from(&shared);
        let s3_config = if options.endpoint.is_some() {
            builder.force_path_style(true).build()
        } else {
            builder.build()
        };

        Self::new(Client::from_conf(s3_config), bucket)
    }

    /// Bucket this store reads from
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn list_children(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let mut page = ListingPage::default();

        if let Some(common_prefixes) = resp.common_prefixes {
            page.prefixes = common_prefixes.into_iter().filter_map(|cp| cp.prefix).collect();
        }

        if let Some(contents) = resp.contents {
            for obj in contents {
                let Some(key) = obj.key else { continue };
                let last_modified = obj
                    .last_modified
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
                page.files.push(FileDescriptor {
                    last_modified,
                    e_tag: obj.e_tag,
                    ..FileDescriptor::new(key, obj.size.unwrap_or(0).max(0) as u64)
                });
            }
        }

        if resp.is_truncated == Some(true) {
            page.continuation_token = resp.next_continuation_token;
        }

        Ok(page)
    }

    async fn fetch(&self, key: &str) -> Result<ByteStream, RemoteError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let body = futures::stream::unfold(resp.body, |mut body| async move {
            body.next().await.map(|chunk| {
                let chunk = chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                    RemoteError::new(RemoteErrorKind::Connection, e.to_string())
                });
                (chunk, body)
            })
        });
        Ok(body.boxed())
    }
}

/// Classify an SDK error for retry purposes
///
/// Timeouts and dispatch/response failures are transient. Service errors are
/// classified by HTTP status, with the S3 error code refining throttling.
fn classify_sdk_error<E>(err: SdkError<E, aws_sdk_s3::config::http::HttpResponse>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) => RemoteError::new(RemoteErrorKind::Timeout, message),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            RemoteError::new(RemoteErrorKind::Connection, message)
        }
        SdkError::ServiceError(ctx) => {
            if matches!(ctx.err().code(), Some("SlowDown" | "Throttling" | "RequestTimeout")) {
                return RemoteError::new(RemoteErrorKind::Throttled, message);
            }
            RemoteError::from_status(ctx.raw().status().as_u16(), message)
        }
        _ => RemoteError::new(RemoteErrorKind::Other, message),
    }
}
