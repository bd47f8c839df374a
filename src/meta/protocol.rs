//! Meta Protocol
//!
//! JSON shapes exchanged with the persistence service, and lenient
//! parsing of its responses. A malformed or missing meta body is never
//! fatal: it degrades to an empty profile.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::warn;

use crate::game::upgrade::MetaProgress;
use crate::meta::store::{MetaError, MetaStore, ProfileId};

// =============================================================================
// REQUESTS
// =============================================================================

/// `POST /meta/earn` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnRequest {
    /// Anything; only finite numbers are accepted
    #[serde(default)]
    pub earned: Value,
}

impl EarnRequest {
    /// Build a request for a known amount.
    pub fn new(earned: u32) -> Self {
        Self { earned: Value::from(earned) }
    }

    /// Amount to bank, floored to a whole number.
    pub fn amount(&self) -> Result<i64, MetaError> {
        match &self.earned {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
                .ok_or(MetaError::InvalidAmount),
            _ => Err(MetaError::InvalidAmount),
        }
    }
}

/// `POST /meta/purchase` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(rename = "upgradeKey", default)]
    pub upgrade_key: Option<String>,
}

impl PurchaseRequest {
    /// Key to buy. Missing keys are unknown upgrades.
    pub fn key(&self) -> Result<&str, MetaError> {
        self.upgrade_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(MetaError::UnknownUpgrade)
    }
}

/// `POST /scores` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub score: Value,
}

impl ScoreRequest {
    /// Build a request.
    pub fn new(game: &str, score: u32) -> Self {
        Self {
            game: Some(game.to_string()),
            score: Value::from(score),
        }
    }

    /// Validated `(game, score)`.
    pub fn validate(&self) -> Result<(&str, i64), MetaError> {
        let game = self.game.as_deref().filter(|g| !g.is_empty()).ok_or(MetaError::InvalidScore)?;
        let score = match &self.score {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .ok_or(MetaError::InvalidScore)?,
            _ => return Err(MetaError::InvalidScore),
        };
        Ok((game, score))
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// `{ "meta": ... }` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaEnvelope {
    pub meta: MetaProgress,
}

/// `{ "error": ... }` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&MetaError> for ErrorBody {
    fn from(err: &MetaError) -> Self {
        Self { error: err.to_string() }
    }
}

/// Read a meta object leniently.
///
/// Negative, fractional or non-numeric fields are dropped rather than
/// failing the whole profile.
pub fn meta_from_value(value: &Value) -> MetaProgress {
    let essence = value
        .get("essence")
        .and_then(Value::as_u64)
        .map(|e| e.min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    let upgrades: BTreeMap<String, u32> = value
        .get("upgrades")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_u64().map(|lvl| (k.clone(), lvl.min(u32::MAX as u64) as u32)))
                .collect()
        })
        .unwrap_or_default();

    MetaProgress { essence, upgrades }
}

/// Parse a `{ "meta": ... }` body, falling back to an empty profile.
pub fn parse_meta_response(body: &str) -> MetaProgress {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("meta") {
            Some(meta) if meta.is_object() => meta_from_value(meta),
            _ => {
                warn!("Meta response has no meta object, using defaults");
                MetaProgress::default()
            }
        },
        Err(e) => {
            warn!("Malformed meta response ({}), using defaults", e);
            MetaProgress::default()
        }
    }
}

/// Parse an error body into a user-facing message.
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "Cannot purchase".to_string())
}

// =============================================================================
// DISPATCH
// =============================================================================

/// A request against the meta service.
#[derive(Debug, Clone)]
pub enum MetaRequest {
    Fetch,
    Earn(EarnRequest),
    Purchase(PurchaseRequest),
    Score(ScoreRequest),
}

/// Serve one request from a store, producing the JSON body and whether
/// it succeeded.
pub async fn dispatch<S: MetaStore>(store: &S, profile: ProfileId, request: MetaRequest) -> (bool, Value) {
    let result = match request {
        MetaRequest::Fetch => store.fetch_meta(profile).await.map(envelope),
        MetaRequest::Earn(req) => match req.amount() {
            Ok(amount) => store.earn_essence(profile, amount).await.map(envelope),
            Err(e) => Err(e),
        },
        MetaRequest::Purchase(req) => match req.key() {
            Ok(key) => store.purchase_upgrade(profile, key).await.map(envelope),
            Err(e) => Err(e),
        },
        MetaRequest::Score(req) => match req.validate() {
            Ok((game, score)) => store
                .submit_score(profile, game, score)
                .await
                .map(|saved| serde_json::json!({ "saved": saved })),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(body) => (true, body),
        Err(e) => (false, serde_json::to_value(ErrorBody::from(&e)).unwrap_or(Value::Null)),
    }
}

fn envelope(meta: MetaProgress) -> Value {
    serde_json::to_value(MetaEnvelope { meta }).unwrap_or(Value::Null)
}

// =============================================================================
// TESTS
// =============================================================================
