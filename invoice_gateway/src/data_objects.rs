use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use market_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::GatewayError;

pub const MIN_INVOICE_LIFETIME_MINUTES: u32 = 5;
pub const MAX_INVOICE_LIFETIME_MINUTES: u32 = 720;

//--------------------------------------     InvoiceRequest     -------------------------------------------------------

/// Everything the gateway needs to open an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub amount: Cents,
    pub currency: String,
    /// The caller's own id for the invoice. The gateway echoes it back in every response and webhook.
    pub order_id: String,
    pub url_return: String,
    pub url_success: String,
    pub url_callback: String,
    pub lifetime_minutes: u32,
}

impl InvoiceRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !self.amount.is_positive() {
            return Err(GatewayError::InvalidRequest(format!("Invoice amount must be positive, not {}", self.amount)));
        }
        if self.currency.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("Invoice currency is empty".into()));
        }
        if self.order_id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("Invoice order id is empty".into()));
        }
        if !(MIN_INVOICE_LIFETIME_MINUTES..=MAX_INVOICE_LIFETIME_MINUTES).contains(&self.lifetime_minutes) {
            return Err(GatewayError::InvalidRequest(format!(
                "Invoice lifetime must be between {MIN_INVOICE_LIFETIME_MINUTES} and {MAX_INVOICE_LIFETIME_MINUTES} \
                 minutes, not {}",
                self.lifetime_minutes
            )));
        }
        Ok(())
    }

    /// The JSON body sent to the create-invoice endpoint. The amount leaves as a fixed two-decimal string and the
    /// lifetime in seconds.
    pub fn to_payload(&self) -> Value {
        json!({
            "amount": self.amount.to_fixed_string(),
            "currency": self.currency,
            "order_id": self.order_id,
            "url_return": self.url_return,
            "url_success": self.url_success,
            "url_callback": self.url_callback,
            "lifetime": u64::from(self.lifetime_minutes) * 60,
        })
    }
}

//--------------------------------------     PaymentStatus     --------------------------------------------------------

/// The gateway's payment status vocabulary. Strings outside this list are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    PaidOver,
    WrongAmount,
    Process,
    ConfirmCheck,
    WrongAmountWaiting,
    Check,
    Fail,
    Cancel,
    SystemFail,
    RefundProcess,
    RefundFail,
    RefundPaid,
    Locked,
}

/// What a payment status means for the order it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The invoice is settled in full (or overpaid).
    Paid,
    /// The invoice is dead and can never be paid.
    Failed,
    /// Anything else. The invoice may still be paid.
    Unsettled,
}

impl PaymentStatus {
    pub fn settlement(&self) -> Settlement {
        use PaymentStatus::*;
        match self {
            Paid | PaidOver => Settlement::Paid,
            Fail | Cancel | SystemFail | WrongAmount => Settlement::Failed,
            Process | ConfirmCheck | WrongAmountWaiting | Check | RefundProcess | RefundFail | RefundPaid | Locked => {
                Settlement::Unsettled
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        use PaymentStatus::*;
        match self {
            Paid => "paid",
            PaidOver => "paid_over",
            WrongAmount => "wrong_amount",
            Process => "process",
            ConfirmCheck => "confirm_check",
            WrongAmountWaiting => "wrong_amount_waiting",
            Check => "check",
            Fail => "fail",
            Cancel => "cancel",
            SystemFail => "system_fail",
            RefundProcess => "refund_process",
            RefundFail => "refund_fail",
            RefundPaid => "refund_paid",
            Locked => "locked",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PaymentStatus::*;
        match s {
            "paid" => Ok(Paid),
            "paid_over" => Ok(PaidOver),
            "wrong_amount" => Ok(WrongAmount),
            "process" => Ok(Process),
            "confirm_check" => Ok(ConfirmCheck),
            "wrong_amount_waiting" => Ok(WrongAmountWaiting),
            "check" => Ok(Check),
            "fail" => Ok(Fail),
            "cancel" => Ok(Cancel),
            "system_fail" => Ok(SystemFail),
            "refund_process" => Ok(RefundProcess),
            "refund_fail" => Ok(RefundFail),
            "refund_paid" => Ok(RefundPaid),
            "locked" => Ok(Locked),
            s => Err(GatewayError::UnknownPaymentStatus(s.to_string())),
        }
    }
}

//--------------------------------------        Invoice        --------------------------------------------------------

/// A validated invoice, as returned by the create-invoice and query-invoice endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// The gateway's own id for the invoice.
    pub invoice_id: String,
    /// The order id the invoice was created with.
    pub order_id: String,
    pub amount: Cents,
    pub currency: String,
    pub payment_amount: Option<String>,
    pub network: Option<String>,
    pub address: Option<String>,
    pub payment_url: String,
    pub payment_status: PaymentStatus,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    uuid: Option<String>,
    order_id: Option<String>,
    amount: Option<Value>,
    currency: Option<String>,
    payment_amount: Option<Value>,
    network: Option<String>,
    address: Option<String>,
    url: Option<String>,
    payment_status: Option<String>,
    status: Option<String>,
    expired_at: Option<i64>,
}

impl TryFrom<RawInvoice> for Invoice {
    type Error = GatewayError;

    fn try_from(raw: RawInvoice) -> Result<Self, Self::Error> {
        let invoice_id = required("uuid", raw.uuid)?;
        let order_id = required("order_id", raw.order_id)?;
        let amount = parse_amount(&required("amount", raw.amount)?)?;
        let currency = required("currency", raw.currency)?;
        let payment_url = required("url", raw.url)?;
        let status = required("payment_status", raw.payment_status.or(raw.status))?;
        let payment_status = status.parse::<PaymentStatus>()?;
        let expired_at = required("expired_at", raw.expired_at)?;
        let expires_at = DateTime::<Utc>::from_timestamp(expired_at, 0)
            .ok_or_else(|| GatewayError::UnexpectedResponse(format!("expired_at is out of range: {expired_at}")))?;
        let payment_amount = raw.payment_amount.and_then(|v| value_as_string(&v));
        Ok(Self {
            invoice_id,
            order_id,
            amount,
            currency,
            payment_amount,
            network: raw.network,
            address: raw.address,
            payment_url,
            payment_status,
            expires_at,
        })
    }
}

//--------------------------------------  WebhookNotification  --------------------------------------------------------

/// A payment webhook, after its signature has been verified and its fields validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub invoice_id: String,
    pub order_id: String,
    pub amount: Cents,
    pub currency: String,
    pub payment_amount: Option<String>,
    pub network: Option<String>,
    pub status: PaymentStatus,
    pub is_final: bool,
    pub txid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    #[serde(rename = "type")]
    kind: Option<String>,
    uuid: Option<String>,
    order_id: Option<String>,
    amount: Option<Value>,
    currency: Option<String>,
    payment_amount: Option<Value>,
    network: Option<String>,
    status: Option<String>,
    is_final: Option<bool>,
    txid: Option<String>,
}

impl TryFrom<RawWebhook> for WebhookNotification {
    type Error = GatewayError;

    fn try_from(raw: RawWebhook) -> Result<Self, Self::Error> {
        let kind = required("type", raw.kind)?;
        if kind != "payment" {
            return Err(GatewayError::UnexpectedResponse(format!("Unsupported webhook type: {kind}")));
        }
        let invoice_id = required("uuid", raw.uuid)?;
        let order_id = required("order_id", raw.order_id)?;
        let amount = parse_amount(&required("amount", raw.amount)?)?;
        let currency = required("currency", raw.currency)?;
        let status = required("status", raw.status)?.parse::<PaymentStatus>()?;
        Ok(Self {
            invoice_id,
            order_id,
            amount,
            currency,
            payment_amount: raw.payment_amount.and_then(|v| value_as_string(&v)),
            network: raw.network,
            status,
            is_final: raw.is_final.unwrap_or(false),
            txid: raw.txid,
        })
    }
}

//--------------------------------------     GatewayMessage     -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    InvoiceCreated,
    StatusQueried,
    WebhookReceived,
}

/// Every message the gateway sends, one variant per kind. Nothing leaves this crate as loose JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMessage {
    InvoiceCreated(Invoice),
    StatusQueried(Invoice),
    WebhookReceived(WebhookNotification),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    state: Option<i64>,
    result: Option<RawInvoice>,
    message: Option<String>,
}

impl GatewayMessage {
    /// Parses a gateway body into the variant for `kind`. API responses must arrive in a `{"state": 0, "result": {..}}`
    /// envelope; webhooks are flat objects.
    pub fn parse(kind: MessageKind, body: &[u8]) -> Result<Self, GatewayError> {
        match kind {
            MessageKind::InvoiceCreated => Self::parse_envelope(body).map(Self::InvoiceCreated),
            MessageKind::StatusQueried => Self::parse_envelope(body).map(Self::StatusQueried),
            MessageKind::WebhookReceived => {
                let raw =
                    serde_json::from_slice::<RawWebhook>(body).map_err(|e| GatewayError::JsonError(e.to_string()))?;
                WebhookNotification::try_from(raw).map(Self::WebhookReceived)
            },
        }
    }

    fn parse_envelope(body: &[u8]) -> Result<Invoice, GatewayError> {
        let envelope = serde_json::from_slice::<Envelope>(body).map_err(|e| GatewayError::JsonError(e.to_string()))?;
        match envelope.state {
            Some(0) => {},
            Some(state) => {
                let message = envelope.message.unwrap_or_default();
                return Err(GatewayError::UnexpectedResponse(format!("Gateway state {state}. {message}")));
            },
            None => return Err(GatewayError::UnexpectedResponse("Response envelope has no state".into())),
        }
        let raw = envelope.result.ok_or_else(|| GatewayError::UnexpectedResponse("Response has no result".into()))?;
        Invoice::try_from(raw)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::InvoiceCreated(_) => MessageKind::InvoiceCreated,
            Self::StatusQueried(_) => MessageKind::StatusQueried,
            Self::WebhookReceived(_) => MessageKind::WebhookReceived,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::InvoiceCreated(i) | Self::StatusQueried(i) => &i.order_id,
            Self::WebhookReceived(w) => &w.order_id,
        }
    }

    pub fn invoice_id(&self) -> &str {
        match self {
            Self::InvoiceCreated(i) | Self::StatusQueried(i) => &i.invoice_id,
            Self::WebhookReceived(w) => &w.invoice_id,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::InvoiceCreated(i) | Self::StatusQueried(i) => i.payment_status,
            Self::WebhookReceived(w) => w.status,
        }
    }
}

//--------------------------------------        helpers        --------------------------------------------------------

fn required<T>(field: &str, value: Option<T>) -> Result<T, GatewayError> {
    value.ok_or_else(|| GatewayError::UnexpectedResponse(format!("Missing field: {field}")))
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Gateway amounts come as decimal strings, occasionally as bare numbers. Both are read verbatim and parsed strictly.
fn parse_amount(value: &Value) -> Result<Cents, GatewayError> {
    let s = value_as_string(value).ok_or_else(|| GatewayError::InvalidCurrencyAmount(value.to_string()))?;
    s.parse::<Cents>().map_err(|e| GatewayError::InvalidCurrencyAmount(e.to_string()))
}
