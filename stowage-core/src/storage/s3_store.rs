//! S3-compatible content backend over raw HTTP
//!
//! Requests are signed with [`RequestSigner`]; no AWS SDK is involved.

use crate::error::{Result, StowageError};
use crate::storage::ContentStore;
use crate::storage::sigv4::{
    self, HEADER_CONTENT_SHA256, HEADER_DATE, RequestSigner, UNSIGNED_PAYLOAD,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Method, StatusCode, header};

/// Settings for [`S3ContentStore`].
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    /// Endpoint authority, e.g. `s3.amazonaws.com` or `minio.local:9000`
    pub endpoint_host: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_path_style: bool,
    /// `https` unless talking to a local test endpoint
    pub scheme: String,
}

pub struct S3ContentStore {
    client: reqwest::Client,
    bucket: String,
    endpoint_host: String,
    use_path_style: bool,
    scheme: String,
    signer: RequestSigner,
}

/// Where an object lives: the `Host` header value and the encoded path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub host: String,
    pub path: String,
}

impl S3ContentStore {
    pub fn new(client: reqwest::Client, settings: S3Settings) -> Self {
        let S3Settings {
            bucket,
            endpoint_host,
            region,
            access_key,
            secret_key,
            use_path_style,
            scheme,
        } = settings;

        Self {
            client,
            bucket,
            endpoint_host,
            use_path_style,
            scheme,
            signer: RequestSigner::new(access_key, secret_key, region),
        }
    }

    /// Build the host and path for an object key.
    ///
    /// Each `/`-separated segment of the id is percent-encoded on its own so
    /// that slashes keep forming key prefixes. Dot segments are rejected: URL
    /// normalization would rewrite them and the signed path would no longer
    /// match the one on the wire.
    pub fn object_location(&self, id: &str) -> Result<ObjectLocation> {
        if id.split('/').all(str::is_empty) {
            return Err(StowageError::PathSafety(format!(
                "id {:?} does not name an object",
                id
            )));
        }

        let mut segments = Vec::new();
        for segment in id.split('/') {
            if segment == "." || segment == ".." {
                return Err(StowageError::PathSafety(format!(
                    "id {:?} contains a dot segment",
                    id
                )));
            }
            segments.push(urlencoding::encode(segment).into_owned());
        }
        let key = segments.join("/");

        if self.use_path_style {
            Ok(ObjectLocation {
                host: self.endpoint_host.clone(),
                path: format!("/{}/{}", self.bucket, key),
            })
        } else {
            Ok(ObjectLocation {
                host: format!("{}.{}", self.bucket, self.endpoint_host),
                path: format!("/{}", key),
            })
        }
    }

    async fn send_signed(
        &self,
        method: Method,
        id: &str,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response> {
        let location = self.object_location(id)?;
        let payload_hash = match &body {
            Some(data) => sigv4::sha256_hex(data),
            None => UNSIGNED_PAYLOAD.to_string(),
        };

        let signed = self.signer.sign(
            method.as_str(),
            &location.host,
            &location.path,
            "",
            &payload_hash,
            Utc::now(),
        )?;

        let url = format!("{}://{}{}", self.scheme, location.host, location.path);
        let url = reqwest::Url::parse(&url)
            .map_err(|error| StowageError::Internal(format!("invalid object url {}: {}", url, error)))?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(header::HOST, &location.host)
            .header(HEADER_CONTENT_SHA256, &signed.payload_hash)
            .header(HEADER_DATE, &signed.amz_date)
            .header(header::AUTHORIZATION, &signed.authorization);

        if let Some(data) = body {
            request = request.body(data);
        }

        let response = request.send().await?;
        tracing::debug!(
            "S3 {} {}{} -> {}",
            method,
            location.host,
            location.path,
            response.status()
        );
        Ok(response)
    }
}

async fn remote_error(operation: &str, id: &str, response: reqwest::Response) -> StowageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(256).collect();
    StowageError::RemoteProtocol(format!(
        "s3 {} failed: status={} id={} body={}",
        operation, status, id, snippet
    ))
}

#[async_trait]
impl ContentStore for S3ContentStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn save(&self, id: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        let response = self.send_signed(Method::PUT, id, Some(data)).await?;
        if !response.status().is_success() {
            return Err(remote_error("put", id, response).await);
        }

        tracing::debug!("Stored {} bytes for blob {} in bucket {}", size, id, self.bucket);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Bytes> {
        let response = self.send_signed(Method::GET, id, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StowageError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(remote_error("get", id, response).await);
        }

        Ok(response.bytes().await?)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let response = self.send_signed(Method::HEAD, id, None).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        Err(remote_error("head", id, response).await)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self.send_signed(Method::DELETE, id, None).await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::warn!("S3 delete of missing blob {} treated as success", id);
                Ok(())
            }
            _ => Err(remote_error("delete", id, response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes as BodyBytes;
    use axum::extract::{Request, State};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use chrono::NaiveDateTime;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const ACCESS_KEY: &str = "test-access";
    const SECRET_KEY: &str = "test-secret";
    const REGION: &str = "eu-west-1";

    #[derive(Default)]
    struct MockBucket {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_with: Mutex<Option<StatusCode>>,
    }

    /// Recompute the signature the way the remote service does.
    fn verify_signature(method: &str, path: &str, headers: &HeaderMap) -> bool {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let amz_date = header(HEADER_DATE);
        let Ok(at) = NaiveDateTime::parse_from_str(&amz_date, "%Y%m%dT%H%M%SZ") else {
            return false;
        };

        let signer = RequestSigner::new(ACCESS_KEY, SECRET_KEY, REGION);
        let Ok(expected) = signer.sign(
            method,
            &header("host"),
            path,
            "",
            &header(HEADER_CONTENT_SHA256),
            at.and_utc(),
        ) else {
            return false;
        };

        expected.authorization == header("authorization")
    }

    async fn handle(State(bucket): State<Arc<MockBucket>>, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let headers = request.headers().clone();
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|_| BodyBytes::new());

        if let Some(status) = *bucket.fail_with.lock().unwrap() {
            return status.into_response();
        }

        if !verify_signature(method.as_str(), &path, &headers) {
            return StatusCode::FORBIDDEN.into_response();
        }

        let key = path.trim_start_matches("/bucket/").to_string();
        let mut objects = bucket.objects.lock().unwrap();

        match method.as_str() {
            "PUT" => {
                if headers.get(HEADER_CONTENT_SHA256).and_then(|v| v.to_str().ok())
                    != Some(sigv4::sha256_hex(&body).as_str())
                {
                    return StatusCode::BAD_REQUEST.into_response();
                }
                objects.insert(key, body.to_vec());
                StatusCode::OK.into_response()
            }
            "GET" => match objects.get(&key) {
                Some(data) => (StatusCode::OK, data.clone()).into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            },
            "HEAD" => match objects.contains_key(&key) {
                true => StatusCode::OK.into_response(),
                false => StatusCode::NOT_FOUND.into_response(),
            },
            "DELETE" => {
                objects.remove(&key);
                StatusCode::NO_CONTENT.into_response()
            }
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    async fn start_mock() -> (Arc<MockBucket>, S3ContentStore) {
        let bucket = Arc::new(MockBucket::default());
        let app = Router::new().fallback(handle).with_state(bucket.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = S3ContentStore::new(
            reqwest::Client::new(),
            S3Settings {
                bucket: "bucket".to_string(),
                endpoint_host: addr.to_string(),
                region: REGION.to_string(),
                access_key: ACCESS_KEY.to_string(),
                secret_key: SECRET_KEY.to_string(),
                use_path_style: true,
                scheme: "http".to_string(),
            },
        );

        (bucket, store)
    }

    fn settings(use_path_style: bool) -> S3Settings {
        S3Settings {
            bucket: "media".to_string(),
            endpoint_host: "s3.amazonaws.com".to_string(),
            region: "us-east-1".to_string(),
            access_key: ACCESS_KEY.to_string(),
            secret_key: SECRET_KEY.to_string(),
            use_path_style,
            scheme: "https".to_string(),
        }
    }

    #[test]
    fn test_virtual_hosted_location() {
        let store = S3ContentStore::new(reqwest::Client::new(), settings(false));
        let location = store.object_location("photos/summer trip.jpg").unwrap();
        assert_eq!(location.host, "media.s3.amazonaws.com");
        assert_eq!(location.path, "/photos/summer%20trip.jpg");
    }

    #[test]
    fn test_path_style_location() {
        let store = S3ContentStore::new(reqwest::Client::new(), settings(true));
        let location = store.object_location("a/b?c").unwrap();
        assert_eq!(location.host, "s3.amazonaws.com");
        assert_eq!(location.path, "/media/a/b%3Fc");
    }

    #[test]
    fn test_dot_and_empty_ids_are_rejected() {
        let store = S3ContentStore::new(reqwest::Client::new(), settings(true));

        for id in ["", "/", "//", "../other/key", "a/./b", "a/.."] {
            assert!(
                matches!(store.object_location(id), Err(StowageError::PathSafety(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_wire_path_matches_signed_path() {
        let store = S3ContentStore::new(reqwest::Client::new(), settings(true));

        for id in ["a/b", "dots.../x", "%2e%2e/y", "a//b", "q?x=1#frag"] {
            let location = store.object_location(id).unwrap();
            let url =
                reqwest::Url::parse(&format!("https://{}{}", location.host, location.path))
                    .unwrap();
            assert_eq!(url.path(), location.path, "id {:?}", id);
        }
    }

    #[tokio::test]
    async fn test_rejected_id_sends_nothing() {
        let (bucket, store) = start_mock().await;

        assert!(matches!(
            store.get("../other/key").await,
            Err(StowageError::PathSafety(_))
        ));
        assert!(matches!(
            store.exists("").await,
            Err(StowageError::PathSafety(_))
        ));
        assert!(bucket.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signed_roundtrip_against_mock() {
        let (bucket, store) = start_mock().await;

        store.save("blob-1", Bytes::from("Hello")).await.unwrap();
        assert_eq!(
            bucket.objects.lock().unwrap().get("blob-1").cloned(),
            Some(b"Hello".to_vec())
        );

        assert_eq!(store.get("blob-1").await.unwrap(), Bytes::from("Hello"));
        assert!(store.exists("blob-1").await.unwrap());

        store.delete("blob-1").await.unwrap();
        assert!(!store.exists("blob-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let (_bucket, store) = start_mock().await;

        assert!(store.get("missing").await.unwrap_err().is_not_found());
        assert!(!store.exists("missing").await.unwrap());
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_credentials_are_rejected() {
        let (_bucket, store) = start_mock().await;
        let store = S3ContentStore {
            signer: RequestSigner::new(ACCESS_KEY, "wrong-secret", REGION),
            ..store
        };

        let error = store.save("blob", Bytes::from("x")).await.unwrap_err();
        assert!(matches!(error, StowageError::RemoteProtocol(_)));

        let error = store.exists("blob").await.unwrap_err();
        assert!(matches!(error, StowageError::RemoteProtocol(_)));
    }

    #[tokio::test]
    async fn test_server_errors_propagate() {
        let (bucket, store) = start_mock().await;
        *bucket.fail_with.lock().unwrap() = Some(StatusCode::SERVICE_UNAVAILABLE);

        assert!(matches!(
            store.get("blob").await,
            Err(StowageError::RemoteProtocol(_))
        ));
        assert!(matches!(
            store.delete("blob").await,
            Err(StowageError::RemoteProtocol(_))
        ));
    }
}
