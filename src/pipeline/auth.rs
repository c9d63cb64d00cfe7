//! OAuth 1.0a request signing (HMAC-SHA1) for the posting API.
//!
//! The platform's v1.1 media endpoint and v2 post endpoint both accept a
//! user-context `Authorization: OAuth …` header. Only the signature
//! computation lives here; the publisher attaches the header.
//!
//! Signature base string:
//!
//! ```text
//! METHOD & enc(base_url) & enc(sorted "k=v" pairs joined by "&")
//! ```
//!
//! where the pairs are the `oauth_*` protocol parameters, the URL's query
//! parameters and any form-encoded body parameters, each percent-encoded
//! per RFC 3986. JSON and multipart bodies are not part of the signature.

use crate::error::PotdError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal, everything else is encoded.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

/// The four user-context secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl OAuthCredentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// True when every field is non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token,
            &self.access_token_secret,
        ]
        .iter()
        .all(|s| !s.trim().is_empty())
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// A computed signature together with the full header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Base64 HMAC-SHA1 signature, not percent-encoded.
    pub signature: String,
    /// Value for the `Authorization` header.
    pub header: String,
}

/// Signs requests with one set of credentials.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: OAuthCredentials,
}

impl OAuthSigner {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    /// `Authorization` header for `method url`, with a fresh nonce and the
    /// current timestamp. `extra_params` are form-encoded body parameters.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(&str, &str)],
    ) -> Result<String, PotdError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PotdError::Internal(format!("system clock before 1970: {e}")))?
            .as_secs();
        let signed = self.sign_with(method, url, extra_params, &nonce(), timestamp)?;
        Ok(signed.header)
    }

    /// Deterministic signing with a caller-chosen nonce and timestamp.
    pub fn sign_with(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(&str, &str)],
        nonce: &str,
        timestamp: u64,
    ) -> Result<SignedRequest, PotdError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| PotdError::Internal(format!("cannot sign invalid URL {url}: {e}")))?;

        let timestamp = timestamp.to_string();
        let protocol: [(&str, &str); 6] = [
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut params: Vec<(String, String)> = protocol
            .iter()
            .chain(extra_params.iter())
            .map(|(k, v)| (encode(k), encode(v)))
            .chain(
                parsed
                    .query_pairs()
                    .map(|(k, v)| (encode(&k), encode(&v))),
            )
            .collect();
        params.sort();

        let param_string = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut base_url = parsed.clone();
        base_url.set_query(None);
        base_url.set_fragment(None);

        let base_string = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(base_url.as_str()),
            encode(&param_string)
        );
        let signing_key = format!(
            "{}&{}",
            encode(&self.credentials.consumer_secret),
            encode(&self.credentials.access_token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
            .map_err(|e| PotdError::Internal(format!("HMAC key rejected: {e}")))?;
        mac.update(base_string.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let header = protocol
            .iter()
            .map(|(k, v)| (*k, *v))
            .chain(std::iter::once(("oauth_signature", signature.as_str())))
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(SignedRequest {
            header: format!("OAuth {header}"),
            signature,
        })
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, RFC3986).to_string()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documented_signer() -> OAuthSigner {
        OAuthSigner::new(OAuthCredentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        ))
    }

    #[test]
    fn matches_documented_signature() {
        let signed = documented_signer()
            .sign_with(
                "post",
                "https://api.twitter.com/1.1/statuses/update.json?include_entities=true",
                &[("status", "Hello Ladies + Gentlemen, a signed OAuth request!")],
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                1318622958,
            )
            .unwrap();
        assert_eq!(signed.signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
        assert!(signed.header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(signed
            .header
            .contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(signed.header.contains("oauth_timestamp=\"1318622958\""));
        assert!(!signed.header.contains("status"));
    }

    #[test]
    fn fresh_headers_use_fresh_nonces() {
        let signer = documented_signer();
        let a = signer
            .authorization_header("POST", "https://api.twitter.com/2/tweets", &[])
            .unwrap();
        let b = signer
            .authorization_header("POST", "https://api.twitter.com/2/tweets", &[])
            .unwrap();
        assert!(a.starts_with("OAuth "));
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_is_alphanumeric() {
        let n = nonce();
        assert_eq!(n.len(), NONCE_LEN);
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn encoding_follows_rfc3986() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("☃"), "%E2%98%83");
    }

    #[test]
    fn invalid_url_is_an_error() {
        let err = documented_signer()
            .sign_with("GET", "not a url", &[], "n", 1)
            .unwrap_err();
        assert!(matches!(err, PotdError::Internal(_)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let dbg = format!("{:?}", documented_signer().credentials());
        assert!(dbg.contains("xvz1evFS4wEEPTGEFPHBog"));
        assert!(!dbg.contains("kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw"));
        assert!(!dbg.contains("LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE"));
    }

    #[test]
    fn completeness() {
        assert!(documented_signer().credentials().is_complete());
        assert!(!OAuthCredentials::new("k", "", "t", "s").is_complete());
    }
}
