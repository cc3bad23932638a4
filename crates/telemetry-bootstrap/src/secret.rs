//! Credential wrapper that never leaks its content.
//!
//! [`SecretValue`] holds a sensitive string such as an OTLP collector
//! password. Every generic output path (`Serialize`, `Debug`, `Display`)
//! emits a fixed mask followed by the byte length of the original value, so a
//! configuration struct can be dumped to logs without exposing credentials.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const MASK: &str = "********";

/// A sensitive string that is masked on serialisation and formatting.
///
/// The raw value is only reachable through [`SecretValue::expose_secret`].
///
/// # Example
///
/// ```
/// use telemetry_bootstrap::SecretValue;
///
/// let secret = SecretValue::new("hunter2");
/// assert_eq!(secret.expose_secret(), "hunter2");
/// assert_eq!(secret.to_string(), "********_7");
/// assert_eq!(serde_json::to_string(&secret).unwrap(), "\"********_7\"");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a raw secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw secret for authorised internal use.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Byte length of the raw secret.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no secret was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The masked representation: `********_<len>`.
    pub fn masked(&self) -> String {
        format!("{MASK}_{}", self.0.len())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretValue").field(&self.masked()).finish()
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.masked())
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SecretVisitor)
    }
}

/// Environment providers type-infer their values, so a credential may arrive
/// as a number or boolean. Scalars are kept in their textual form.
struct SecretVisitor;

impl Visitor<'_> for SecretVisitor {
    type Value = SecretValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number or boolean credential")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(SecretValue::new(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(SecretValue(value))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }

    fn visit_i128<E: de::Error>(self, value: i128) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(SecretValue(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serialize_masks_value() {
        let secret = SecretValue::new("dXNlcjpwYXNz");
        let json = serde_json::to_string(&secret).unwrap();

        assert_eq!(json, "\"********_12\"");
    }

    #[test]
    fn test_empty_secret_masks_to_zero_length() {
        let secret = SecretValue::default();

        assert!(secret.is_empty());
        assert_eq!(secret.masked(), "********_0");
    }

    #[test]
    fn test_debug_does_not_leak() {
        let secret = SecretValue::new("top-secret");
        let debug = format!("{secret:?}");

        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("********_10"));
    }

    #[test]
    fn test_deserialize_reads_raw_value() {
        let secret: SecretValue = serde_json::from_str("\"abc\"").unwrap();

        assert_eq!(secret.expose_secret(), "abc");
    }

    #[test]
    fn test_deserialize_accepts_scalars() {
        let numeric: SecretValue = serde_json::from_str("123456").unwrap();
        let boolean: SecretValue = serde_json::from_str("true").unwrap();

        assert_eq!(numeric.expose_secret(), "123456");
        assert_eq!(boolean.expose_secret(), "true");
    }

    #[test]
    fn test_deserialize_rejects_structures() {
        assert!(serde_json::from_str::<SecretValue>("[1, 2]").is_err());
    }

    #[test]
    fn test_length_counts_bytes() {
        let secret = SecretValue::new("пароль");

        assert_eq!(secret.masked(), "********_12");
    }

    proptest! {
        #[test]
        fn serialized_form_hides_content_and_keeps_length(raw in "[a-zA-Z]{1,64}") {
            let secret = SecretValue::new(raw.clone());
            let json = serde_json::to_string(&secret).unwrap();

            prop_assert!(!json.contains(&raw));
            let expected_suffix = format!("_{}\"", raw.len());
            prop_assert!(json.ends_with(&expected_suffix));
        }
    }
}
