//! Identity claims carried in request metadata.
//!
//! An upstream gateway verifies the JWT and forwards only its payload, base64
//! encoded, in the `x-jwt-payload` metadata entry. This module extracts and
//! decodes that payload without re-verifying the signature.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tonic::metadata::MetadataMap;

/// Metadata key holding the base64-encoded claims payload.
pub const PAYLOAD_KEY: &str = "x-jwt-payload";

/// JWT segments are usually unpadded; padded payloads are accepted too.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised while extracting claims.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    /// The metadata does not carry exactly one non-empty payload.
    #[error("metadata has no single {PAYLOAD_KEY} value")]
    MissingPayload,

    /// The payload header is not printable ASCII.
    #[error("payload header is not valid ASCII")]
    InvalidHeader(#[source] tonic::metadata::errors::ToStrError),

    /// The payload is not valid base64.
    #[error("payload is not valid base64")]
    Decode(#[from] base64::DecodeError),

    /// The decoded payload is not a valid claims document.
    #[error("payload is not a valid claims document")]
    Parse(#[source] serde_json::Error),
}

/// Audience claim: a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    Single(String),
    /// Several audiences.
    Many(Vec<String>),
}

/// Registered JWT claims (RFC 7519 §4.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiry, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not-before, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued-at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Application claims forwarded by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User identifier.
    #[serde(default)]
    pub user_id: String,
    /// User email.
    #[serde(default)]
    pub email: String,
    /// Whether the user has admin rights.
    #[serde(default)]
    pub is_admin: bool,
    /// Registered claims.
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

impl Claims {
    /// Extracts claims from incoming request metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::MissingPayload`] unless exactly one non-empty
    /// `x-jwt-payload` entry is present, or a decode error.
    pub fn from_metadata(metadata: &MetadataMap) -> Result<Self, ClaimsError> {
        let entries = metadata.get_all(PAYLOAD_KEY);
        let mut values = entries.iter();

        let (Some(value), None) = (values.next(), values.next()) else {
            return Err(ClaimsError::MissingPayload);
        };

        let payload = value.to_str().map_err(ClaimsError::InvalidHeader)?;
        Self::from_payload(payload)
    }

    /// Decodes a base64 claims payload.
    ///
    /// Some gateways drop the closing brace of the JSON document. If parsing
    /// fails at end of input, the payload is retried once with `}` appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is empty, not base64, or not a claims
    /// document even after the retry.
    pub fn from_payload(payload: &str) -> Result<Self, ClaimsError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ClaimsError::MissingPayload);
        }

        let mut decoded = PAYLOAD_ENGINE.decode(payload)?;

        match serde_json::from_slice(&decoded) {
            Ok(claims) => Ok(claims),
            Err(e) if e.classify() == Category::Eof => {
                tracing::debug!("Claims payload truncated, retrying with closing brace");
                decoded.push(b'}');
                serde_json::from_slice(&decoded).map_err(ClaimsError::Parse)
            }
            Err(e) => Err(ClaimsError::Parse(e)),
        }
    }
}
