use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::{json, Value};

use crate::{
    config::GatewayConfig,
    data_objects::{GatewayMessage, Invoice, InvoiceRequest, MessageKind},
    signature::{canonical_json, PayloadSigner},
    GatewayError,
};

const CREATE_INVOICE_PATH: &str = "/v1/payment";
const INVOICE_INFO_PATH: &str = "/v1/payment/info";

#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    signer: PayloadSigner,
    client: Arc<Client>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let merchant =
            HeaderValue::from_str(&config.merchant_id).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        headers.insert("merchant", merchant);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        let signer = PayloadSigner::new(config.api_key.clone());
        Ok(Self { config, signer, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Sends `body` as a signed POST. The exact bytes that were signed are the bytes sent.
    pub async fn signed_post(&self, path: &str, body: &Value) -> Result<Vec<u8>, GatewayError> {
        let url = self.url(path);
        let payload = canonical_json(body);
        let sign = self.signer.sign_str(&payload);
        trace!("🔐️ Sending signed request to {url}: {payload}");
        let response = self
            .client
            .post(url)
            .header("sign", sign)
            .body(payload)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        if status.is_success() {
            trace!("Gateway request successful. {status}");
            Ok(bytes.to_vec())
        } else {
            let message = String::from_utf8_lossy(&bytes).to_string();
            Err(GatewayError::QueryError { status: status.as_u16(), message })
        }
    }

    /// Opens a new invoice. Any failure, including a response that does not validate, is an error.
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        request.validate()?;
        debug!("Creating invoice for order {} ({} {})", request.order_id, request.amount, request.currency);
        let body = self.signed_post(CREATE_INVOICE_PATH, &request.to_payload()).await?;
        match GatewayMessage::parse(MessageKind::InvoiceCreated, &body)? {
            GatewayMessage::InvoiceCreated(invoice) => {
                info!("Created invoice {} for order {}", invoice.invoice_id, invoice.order_id);
                Ok(invoice)
            },
            other => Err(GatewayError::UnexpectedResponse(format!("Expected a new invoice, got {:?}", other.kind()))),
        }
    }

    /// Fetches the gateway's current view of the invoice created with the given order id.
    pub async fn query_invoice(&self, order_id: &str) -> Result<Invoice, GatewayError> {
        debug!("Querying invoice status for order {order_id}");
        let body = self.signed_post(INVOICE_INFO_PATH, &json!({ "order_id": order_id })).await?;
        match GatewayMessage::parse(MessageKind::StatusQueried, &body)? {
            GatewayMessage::StatusQueried(invoice) => {
                debug!("Invoice {} for order {order_id} is {}", invoice.invoice_id, invoice.payment_status);
                Ok(invoice)
            },
            other => Err(GatewayError::UnexpectedResponse(format!("Expected invoice info, got {:?}", other.kind()))),
        }
    }

    pub fn signer(&self) -> &PayloadSigner {
        &self.signer
    }
}
