//! AWS Signature Version 4 for the S3 backend
//!
//! The signature is computed from scratch:
//!
//! ```text
//! canonical request  = METHOD \n URI \n QUERY \n HEADERS \n SIGNED_HEADERS \n PAYLOAD_HASH
//! string to sign     = AWS4-HMAC-SHA256 \n AMZ_DATE \n SCOPE \n hex(sha256(canonical request))
//! signing key        = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), "s3"), "aws4_request")
//! signature          = hex(HMAC(signing key, string to sign))
//! ```
//!
//! Every step is a pure function over its inputs; the remote service rejects
//! the request if a single byte differs.

use crate::error::{Result, StowageError};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
pub const SERVICE: &str = "s3";
pub const TERMINATOR: &str = "aws4_request";

pub const HEADER_HOST: &str = "host";
pub const HEADER_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const HEADER_DATE: &str = "x-amz-date";

/// Format a timestamp as `YYYYMMDDThhmmssZ`.
pub fn amz_date(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Lower-case hex SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|error| StowageError::Internal(format!("hmac key rejected: {}", error)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sort already-encoded query parameters by their raw `key=value` text.
///
/// A bare `key` is canonicalized as `key=`.
pub fn canonical_query(query: &str) -> String {
    let mut params: Vec<String> = query
        .trim_start_matches('?')
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| {
            if param.contains('=') {
                param.to_string()
            } else {
                format!("{}=", param)
            }
        })
        .collect();
    params.sort();
    params.join("&")
}

/// Structured input to the canonical request.
///
/// `path` and `query` must already be URI-encoded exactly as sent on the wire.
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub payload_hash: String,
}

impl CanonicalRequest {
    fn sorted_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        headers.sort_by(|left, right| left.0.cmp(&right.0));
        headers
    }

    /// One `name:value` line per header, sorted by name, each newline-terminated.
    pub fn canonical_headers(&self) -> String {
        self.sorted_headers()
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect()
    }

    pub fn signed_headers(&self) -> String {
        self.sorted_headers()
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn render(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        [
            self.method.as_str(),
            path,
            canonical_query(&self.query).as_str(),
            self.canonical_headers().as_str(),
            self.signed_headers().as_str(),
            self.payload_hash.as_str(),
        ]
        .join("\n")
    }
}

/// `date/region/s3/aws4_request`
pub fn credential_scope(date: &str, region: &str) -> String {
    format!("{}/{}/{}/{}", date, region, SERVICE, TERMINATOR)
}

pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    [
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes()).as_str(),
    ]
    .join("\n")
}

pub fn derive_signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, TERMINATOR.as_bytes())
}

pub fn authorization_header(
    access_key: &str,
    scope: &str,
    signed_headers: &str,
    signature: &str,
) -> String {
    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, access_key, scope, signed_headers, signature
    )
}

/// Header values to attach to a signed request, plus the intermediate strings.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub amz_date: String,
    pub payload_hash: String,
    pub authorization: String,
    pub canonical_request: String,
    pub string_to_sign: String,
}

#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
    region: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl RequestSigner {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sign a request carrying the `host`, `x-amz-content-sha256` and
    /// `x-amz-date` headers.
    pub fn sign(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query: &str,
        payload_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let amz_date = amz_date(&at);
        let date = &amz_date[..8];

        let request = CanonicalRequest {
            method: method.to_string(),
            path: path.to_string(),
            query: query.to_string(),
            headers: vec![
                (HEADER_HOST.to_string(), host.to_string()),
                (HEADER_CONTENT_SHA256.to_string(), payload_hash.to_string()),
                (HEADER_DATE.to_string(), amz_date.clone()),
            ],
            payload_hash: payload_hash.to_string(),
        };

        let canonical_request = request.render();
        let scope = credential_scope(date, &self.region);
        let string_to_sign = string_to_sign(&amz_date, &scope, &canonical_request);
        let signing_key = derive_signing_key(&self.secret_key, date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(SignedRequest {
            authorization: authorization_header(
                &self.access_key,
                &scope,
                &request.signed_headers(),
                &signature,
            ),
            amz_date,
            payload_hash: payload_hash.to_string(),
            canonical_request,
            string_to_sign,
        })
    }
}
