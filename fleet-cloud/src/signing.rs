//! ACS3-HMAC-SHA256 request signing.
//!
//! ```text
//! CanonicalRequest = METHOD \n / \n CanonicalQuery \n CanonicalHeaders \n SignedHeaders \n hex(sha256(body))
//! StringToSign     = "ACS3-HMAC-SHA256" \n hex(sha256(CanonicalRequest))
//! Signature        = hex(hmac_sha256(secret, StringToSign))
//! ```
//!
//! Signed headers are `host`, `content-type` and every `x-acs-*` header.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Signature algorithm name.
pub const ALGORITHM: &str = "ACS3-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Signs requests with an access key pair.
#[derive(Clone)]
pub struct Acs3Signer {
    key_id: String,
    secret: String,
}

impl fmt::Debug for Acs3Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acs3Signer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Acs3Signer {
    /// Signer for an access key pair.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// Sign a request.
    ///
    /// Adds `host` and `x-acs-content-sha256` to `headers` and returns the
    /// `Authorization` header value. Header names must be lowercase.
    pub fn sign(
        &self,
        method: &str,
        host: &str,
        query: &[(String, String)],
        headers: &mut BTreeMap<String, String>,
        body: &[u8],
    ) -> String {
        let payload_hash = hex::encode(Sha256::digest(body));
        headers.insert("host".to_string(), host.to_string());
        headers.insert("x-acs-content-sha256".to_string(), payload_hash.clone());

        let signed: Vec<(&String, &String)> = headers
            .iter()
            .filter(|(k, _)| *k == "host" || *k == "content-type" || k.starts_with("x-acs-"))
            .collect();
        let canonical_headers: String = signed
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers = signed
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n/\n{}\n{}\n{}\n{}",
            method,
            canonical_query(query),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        let string_to_sign = format!(
            "{}\n{}",
            ALGORITHM,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        format!(
            "{} Credential={},SignedHeaders={},Signature={}",
            ALGORITHM,
            self.key_id,
            signed_headers,
            self.signature(&string_to_sign)
        )
    }

    fn signature(&self, string_to_sign: &str) -> String {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(string_to_sign.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Sorted `key=value` pairs, both percent-encoded.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 encoding: everything but `A-Z a-z 0-9 - _ . ~` becomes `%XX`.
pub fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
