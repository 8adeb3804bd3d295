//! Envelope codec seam

use crate::{Result, RpcRequest, RpcResponse, WsRpcError};

/// Converts between wire text and envelopes
pub trait EnvelopeCodec: Send + Sync + 'static {
    /// Parse an inbound frame into a request, leaving its payload undecoded
    fn decode_request(&self, raw: &str) -> Result<RpcRequest>;

    /// Serialize an outbound response
    fn encode_response(&self, response: &RpcResponse) -> Result<String>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn decode_request(&self, raw: &str) -> Result<RpcRequest> {
        serde_json::from_str(raw).map_err(|e| WsRpcError::Decode(e.to_string()))
    }

    fn encode_response(&self, response: &RpcResponse) -> Result<String> {
        serde_json::to_string(response).map_err(|e| WsRpcError::Encode(e.to_string()))
    }
}
