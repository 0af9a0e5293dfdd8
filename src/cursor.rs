//! Signed pagination cursors for visit listings
//!
//! A cursor is `base64url(json).base64url(hmac_sha256(payload))`, so clients can
//! hand it back verbatim but cannot forge a position.

use anyhow::{anyhow, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::OnceLock;

use crate::models::VisitEvent;

static HMAC_KEY: OnceLock<Vec<u8>> = OnceLock::new();

fn random_key() -> Vec<u8> {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..32).map(|_| rng.random::<u8>()).collect()
}

/// Set the signing key. Only the first call has an effect.
pub fn init_cursor_hmac_key(secret: Option<&str>) {
    let key = match secret {
        Some(s) => s.as_bytes().to_vec(),
        None => random_key(),
    };
    HMAC_KEY.get_or_init(|| key);
}

fn get_hmac_key() -> &'static [u8] {
    HMAC_KEY.get_or_init(random_key)
}

/// Position of the last visit on a page. Listings run newest first, ordered by
/// `(ts, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub ts: i64,
    pub id: String,
}

impl CursorData {
    pub fn after(visit: &VisitEvent) -> Self {
        Self {
            ts: visit.ts,
            id: visit.id.clone(),
        }
    }
}

fn sign(payload: &str) -> Result<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(get_hmac_key())
        .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

pub fn create_cursor(data: &CursorData) -> Result<String> {
    let json = serde_json::to_string(data)?;
    let payload = BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes());
    let signature = sign(&payload)?.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        payload,
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    ))
}

pub fn verify_cursor(cursor: &str) -> Result<CursorData> {
    let (payload, signature_b64) = match cursor.split('.').collect::<Vec<_>>()[..] {
        [payload, signature] => (payload, signature),
        _ => return Err(anyhow!("Invalid cursor format")),
    };

    let provided = BASE64_URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| anyhow!("Invalid cursor signature encoding"))?;

    // Constant-time comparison
    sign(payload)?
        .verify_slice(&provided)
        .map_err(|_| anyhow!("Cursor signature verification failed"))?;

    let json_bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| anyhow!("Invalid cursor payload encoding"))?;
    serde_json::from_slice(&json_bytes).map_err(|_| anyhow!("Invalid cursor data"))
}

/// One page of `visits` (newest first) strictly after `cursor`
pub fn page_visits(
    mut visits: Vec<VisitEvent>,
    cursor: Option<&CursorData>,
    limit: usize,
) -> (Vec<VisitEvent>, Option<CursorData>) {
    let key = |v: &VisitEvent| (v.ts, v.id.len(), v.id.clone());
    visits.sort_by_key(|v| std::cmp::Reverse(key(v)));

    if let Some(cursor) = cursor {
        let position = (cursor.ts, cursor.id.len(), cursor.id.clone());
        visits.retain(|v| key(v) < position);
    }

    let has_more = visits.len() > limit;
    visits.truncate(limit);
    let next = if has_more {
        visits.last().map(CursorData::after)
    } else {
        None
    };
    (visits, next)
}
