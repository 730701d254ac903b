//! JSON state objects in S3.
//!
//! Every Sentinel record is one small JSON object; writes that race an
//! operator (revocation vs touch) go through the If-Match path so the last
//! writer cannot silently resurrect a terminal session.

use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::ByteStream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Get and deserialize a JSON object. Returns the value and its ETag, or
/// `Ok(None)` if the key does not exist.
pub async fn load_json<T: DeserializeOwned>(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<Option<(T, String)>, StoreError> {
    let resp = match client.get_object().bucket(bucket).key(key).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                return Ok(None);
            }
            return Err(StoreError::GetObject(err.to_string()));
        }
    };

    let etag = resp.e_tag().unwrap_or_default().to_string();
    let body = resp
        .body
        .collect()
        .await
        .map_err(|e| StoreError::GetObject(e.to_string()))?
        .into_bytes();

    let value = serde_json::from_slice(&body)?;
    Ok(Some((value, etag)))
}

/// Serialize and put a JSON object unconditionally. Returns the new ETag.
pub async fn save_json<T: Serialize>(
    client: &Client,
    bucket: &str,
    key: &str,
    value: &T,
) -> Result<String, StoreError> {
    let body = serde_json::to_vec(value)?;

    let resp = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("application/json")
        .body(ByteStream::from(body))
        .send()
        .await
        .map_err(|e| StoreError::PutObject(e.into_service_error().to_string()))?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}

/// Conditional put with ETag optimistic locking. Returns the new ETag, or
/// `StoreError::PreconditionFailed` when the object changed underneath us.
pub async fn save_json_if_match<T: Serialize>(
    client: &Client,
    bucket: &str,
    key: &str,
    value: &T,
    expected_etag: &str,
) -> Result<String, StoreError> {
    let body = serde_json::to_vec(value)?;

    let resp = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("application/json")
        .body(ByteStream::from(body))
        .if_match(expected_etag)
        .send()
        .await
        .map_err(|e| {
            let err = e.into_service_error();
            // S3 returns 412 Precondition Failed when If-Match doesn't match
            if err.to_string().contains("PreconditionFailed") {
                StoreError::PreconditionFailed {
                    key: key.to_string(),
                }
            } else {
                StoreError::PutObject(err.to_string())
            }
        })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}

/// Delete an object.
pub async fn delete_object(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<(), StoreError> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| StoreError::DeleteObject(e.into_service_error().to_string()))?;

    Ok(())
}

/// List keys under a prefix.
pub async fn list_keys(
    client: &Client,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let mut req = client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = &continuation_token {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::ListObjects(e.into_service_error().to_string()))?;

        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                keys.push(key.to_string());
            }
        }

        if resp.is_truncated() == Some(true) {
            continuation_token = resp.next_continuation_token().map(|s| s.to_string());
        } else {
            break;
        }
    }

    Ok(keys)
}

/// Load every JSON object under a prefix, skipping keys that vanish
/// between the list and the get.
pub async fn load_all<T: DeserializeOwned>(
    client: &Client,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<T>, StoreError> {
    let keys = list_keys(client, bucket, prefix).await?;
    let mut values = Vec::with_capacity(keys.len());

    for key in &keys {
        if let Some((value, _)) = load_json(client, bucket, key).await? {
            values.push(value);
        }
    }

    Ok(values)
}
