//! Request signing and webhook verification.
//!
//! The gateway signs a payload as `hex(md5(base64(payload) + api_key))`, where `payload` is the compact JSON encoding
//! of the body with forward slashes escaped as `\/`. Outbound requests carry the signature in a `sign` header; inbound
//! webhooks carry it as a `sign` field inside the body itself.
use log::*;
use market_common::Secret;
use md5::{Digest, Md5};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use crate::{
    data_objects::{GatewayMessage, MessageKind, WebhookNotification},
    GatewayError,
};

/// Encodes a JSON value the way the gateway does before signing: compact, key order as given, numbers verbatim,
/// non-ASCII left unescaped and every `/` written as `\/`.
pub fn canonical_json(value: &Value) -> String {
    value.to_string().replace('/', "\\/")
}

#[derive(Debug, Clone)]
pub struct PayloadSigner {
    api_key: Secret<String>,
}

impl PayloadSigner {
    pub fn new(api_key: Secret<String>) -> Self {
        Self { api_key }
    }

    /// Signs an already-encoded payload string.
    pub fn sign_str(&self, payload: &str) -> String {
        let encoded = base64::encode(payload.as_bytes());
        let mut hasher = Md5::new();
        hasher.update(encoded.as_bytes());
        hasher.update(self.api_key.reveal().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn sign(&self, value: &Value) -> String {
        self.sign_str(&canonical_json(value))
    }

    /// Adds a `sign` field to the given object, producing a body the gateway would accept as a webhook. The inverse of
    /// [`Self::verify_webhook`].
    pub fn sign_webhook(&self, mut body: Map<String, Value>) -> Map<String, Value> {
        body.shift_remove("sign");
        let sign = self.sign(&Value::Object(body.clone()));
        body.insert("sign".to_string(), Value::String(sign));
        body
    }

    /// Verifies the `sign` field embedded in a raw webhook body.
    ///
    /// The body is parsed with key order and number representation preserved, `sign` is removed, and the remainder is
    /// re-encoded canonically and signed. Anything that is not a JSON object with a string `sign` field fails.
    pub fn verify_webhook(&self, raw: &[u8]) -> bool {
        match self.check_webhook(raw) {
            Ok(()) => true,
            Err(e) => {
                debug!("🔐️ Webhook signature check failed. {e}");
                false
            },
        }
    }

    /// Verifies the signature on a raw webhook body and, only if it is valid, parses it into a notification.
    ///
    /// A missing or wrong signature is reported as [`GatewayError::MissingSignature`] or
    /// [`GatewayError::InvalidSignature`]. Any other error means the body itself is malformed.
    pub fn authenticate_webhook(&self, raw: &[u8]) -> Result<WebhookNotification, GatewayError> {
        self.check_webhook(raw).map_err(|e| {
            warn!("🔐️ Rejected a webhook. {e}");
            e
        })?;
        match GatewayMessage::parse(MessageKind::WebhookReceived, raw)? {
            GatewayMessage::WebhookReceived(notification) => Ok(notification),
            other => Err(GatewayError::UnexpectedResponse(format!("Expected a webhook, got {:?}", other.kind()))),
        }
    }

    fn check_webhook(&self, raw: &[u8]) -> Result<(), GatewayError> {
        let value = serde_json::from_slice::<Value>(raw).map_err(|e| GatewayError::JsonError(e.to_string()))?;
        let Value::Object(mut body) = value else {
            return Err(GatewayError::UnexpectedResponse("webhook body is not a JSON object".into()));
        };
        let provided = match body.shift_remove("sign") {
            Some(Value::String(s)) => s,
            _ => return Err(GatewayError::MissingSignature),
        };
        let expected = self.sign(&Value::Object(body));
        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature)
        }
    }
}
