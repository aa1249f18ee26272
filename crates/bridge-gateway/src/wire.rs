//! Wire codec for the venue gateway.
//!
//! Request: `{"action": "...", "reqId": "...", "payload": {...}}`.
//! Response: `{"error": bool, "retcode": int, "msg": "...", "ticket": int, "data": ...}`
//! where `ticket` is present only on success.

use bridge_core::{Action, GatewayRequest, NormalizedOrder, Payload, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request frame sent to the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub action: Action,
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub payload: Value,
}

impl WireRequest {
    /// Encode a request as-is. Order payloads carry the raw intent size;
    /// use [`WireRequest::order`] for a risk-normalized order.
    pub fn from_request(request: &GatewayRequest) -> Self {
        let payload = match request.payload() {
            Payload::Empty => json!({}),
            Payload::Symbol { symbol } => json!({ "symbol": symbol }),
            Payload::Order(intent) => json!({
                "symbol": intent.symbol,
                "direction": intent.direction,
                "volume": intent.raw_size.to_f64(),
            }),
            Payload::Close { ticket, symbol } => json!({ "ticket": ticket, "symbol": symbol }),
        };
        Self {
            action: request.action(),
            req_id: request.request_id().to_string(),
            payload,
        }
    }

    /// `order_send` frame for an order accepted by the risk gate.
    pub fn order(request_id: &RequestId, order: &NormalizedOrder) -> Self {
        Self {
            action: Action::OrderSend,
            req_id: request_id.to_string(),
            payload: json!({
                "symbol": order.symbol,
                "direction": order.direction,
                "volume": order.lots.to_f64(),
            }),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Reply frame from the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub error: bool,
    #[serde(default)]
    pub retcode: i32,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<u64>,
    /// Echo of the request id, when the venue sends one.
    #[serde(rename = "reqId", default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WireResponse {
    /// Success reply with a ticket.
    pub fn ok(ticket: u64) -> Self {
        Self {
            error: false,
            retcode: 0,
            msg: "done".to_string(),
            ticket: Some(ticket),
            req_id: None,
            data: None,
        }
    }

    /// Error reply with a venue code.
    pub fn err(retcode: i32, msg: impl Into<String>) -> Self {
        Self {
            error: true,
            retcode,
            msg: msg.into(),
            ticket: None,
            req_id: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_req_id(mut self, req_id: impl Into<String>) -> Self {
        self.req_id = Some(req_id.into());
        self
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
