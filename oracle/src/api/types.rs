//! Request/response shapes for the query API, matching the envelope the
//! original HTTP shim returns on every endpoint: an `action` name, a human
//! `desc`, a numeric `error` code (`0` on success), and an optional
//! `result` payload. Request/response payload fields use the same
//! capitalized names the original wire format used.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

pub const ERROR_OK: u32 = 0;
pub const ERROR_INVALID_PARAMS: u32 = 40001;
pub const ERROR_INTERNAL: u32 = 40002;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub action: String,
    pub desc: String,
    pub error: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(action: &str, result: T) -> Self {
        Self {
            action: action.to_owned(),
            desc: "success".to_owned(),
            error: ERROR_OK,
            result: Some(result),
        }
    }

    pub fn error(action: &str, code: u32, desc: impl Into<String>) -> Self {
        Self {
            action: action.to_owned(),
            desc: desc.into(),
            error: code,
            result: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRewardsRequest {
    pub id: String,
    pub addresses: Vec<Address>,
    pub end_height: u64,
}

/// `Amount` holds one decimal string per entry of the request's
/// `Addresses`, in the same order -- rewards are arbitrary-precision and
/// don't fit a JSON number without risking silent precision loss in common
/// client JSON parsers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRewardsResult {
    pub id: String,
    pub amount: Vec<String>,
}

/// `TotalGas` has no per-address dimension in the ledger (see §3's data
/// model), so `Addresses` is accepted for symmetry with `getrewards` but
/// every entry of `Amount` carries the same network-wide total.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetGasFeeRequest {
    pub id: String,
    pub addresses: Vec<Address>,
    pub end_height: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetGasFeeResult {
    pub id: String,
    pub amount: Vec<String>,
}
