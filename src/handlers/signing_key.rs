//! Ed25519 signing keys.
//!
//! The private key is returned exactly once, PKCS#8 PEM encoded, and never
//! stored. The backend keeps only the public half so the key can be looked up
//! until its lease is revoked.

use chrono::Utc;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use serde_json::{json, Value};
use tracing::info;
use zeroize::Zeroizing;

use super::HandlerContext;
use crate::domain::{Lease, Request, ResourceId, Response, Secret, SecretRef, SecretType};
use crate::errors::{BackendError, BackendResult};
use crate::lease::LeaseStore;
use crate::storage::KEY_PREFIX;

pub const ALGORITHM: &str = "ed25519";

fn record_prefix(name: &str) -> String {
    format!("{}{}/", KEY_PREFIX, name)
}

fn generate() -> SigningKey {
    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut *seed);
    SigningKey::from_bytes(&seed)
}

/// Generate a key pair under `name` and lease it
pub(super) async fn create(ctx: &HandlerContext, request: &Request, name: &str) -> BackendResult<Response> {
    let ttl = request.duration_param("ttl")?.unwrap_or(ctx.settings.default_ttl);
    LeaseStore::validate_ttl(ttl, ctx.settings.max_ttl)?;

    let signing_key = generate();
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| BackendError::internal(format!("Failed to encode private key: {}", e)))?;
    let public_key = hex::encode(signing_key.verifying_key().to_bytes());

    // The lease guards the stored record itself
    let record_key = format!("{}{}", record_prefix(name), ResourceId::generate());
    ctx.storage
        .put(&record_key, json!({ "public_key": public_key, "algorithm": ALGORITHM, "created_at": Utc::now() }))
        .await?;

    let secret_ref = SecretRef::new(SecretType::SigningKey, request.path(), ResourceId::from(record_key.as_str()));
    // Key leases cannot be renewed, so the ceiling is the TTL itself
    let lease = match ctx.leases.issue(secret_ref, ttl, ttl, false) {
        Ok(lease) => lease,
        Err(err) => {
            ctx.storage.delete(&record_key).await?;
            return Err(err);
        }
    };

    info!(lease_id = %lease.id, key_name = name, "Generated signing key");

    let data = Secret::new()
        .with_text("private_key", private_pem.as_str())
        .with_text("public_key", public_key)
        .with_text("algorithm", ALGORITHM)
        .into_response_data();
    Ok(Response::with_data(data).lease(lease))
}

/// Public keys currently stored under `name`
pub async fn read(ctx: &HandlerContext, name: &str) -> BackendResult<Response> {
    let prefix = record_prefix(name);
    let ids = ctx.storage.list(&prefix).await?;

    let mut keys = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = ctx.storage.get(&format!("{}{}", prefix, id)).await? {
            keys.push(json!({ "id": id, "public_key": record["public_key"], "created_at": record["created_at"] }));
        }
    }
    if keys.is_empty() {
        return Err(BackendError::not_found("signing key", name));
    }

    Ok(Response::new().insert("algorithm", Value::from(ALGORITHM)).insert("keys", Value::Array(keys)))
}

/// Forget the public key record guarded by `lease`
pub(super) async fn teardown(ctx: &HandlerContext, lease: &Lease) -> BackendResult<()> {
    let record_key = lease.secret_ref.resource_id.as_str();
    if !record_key.starts_with(KEY_PREFIX) {
        return Err(BackendError::internal(format!("lease '{}' is not a signing key lease", lease.id)));
    }
    ctx.storage
        .delete(record_key)
        .await
        .map(|_| ())
        .map_err(|e| BackendError::revocation_failed(lease.id.as_str(), e.to_string()))
}
