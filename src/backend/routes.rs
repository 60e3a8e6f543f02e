//! The backend's route table.

use crate::domain::Operation;
use crate::errors::BackendResult;
use crate::handlers::SecretHandler;
use crate::router::Router;

/// What a routed request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ListRoles,
    WriteRole,
    ReadRole,
    DeleteRole,
    /// Produce a new secret through a secret handler
    Issue(SecretHandler),
    ListKv,
    ReadKv,
    DeleteKv,
    ReadSigningKey,
    ListLeases,
    ReadLease,
    RenewLease,
    RevokeLease,
}

/// `(pattern, operation, endpoint)` triples registered at startup
pub const ROUTES: &[(&str, Operation, Endpoint)] = &[
    ("roles", Operation::Read, Endpoint::ListRoles),
    ("roles/{name}", Operation::Create, Endpoint::WriteRole),
    ("roles/{name}", Operation::Update, Endpoint::WriteRole),
    ("roles/{name}", Operation::Read, Endpoint::ReadRole),
    ("roles/{name}", Operation::Delete, Endpoint::DeleteRole),
    ("creds/{role}", Operation::Create, Endpoint::Issue(SecretHandler::Credential)),
    ("creds/{role}", Operation::Read, Endpoint::Issue(SecretHandler::Credential)),
    ("keys/{name}", Operation::Create, Endpoint::Issue(SecretHandler::SigningKey)),
    ("keys/{name}", Operation::Read, Endpoint::ReadSigningKey),
    ("kv", Operation::Read, Endpoint::ListKv),
    ("kv/{*path}", Operation::Create, Endpoint::Issue(SecretHandler::Kv)),
    ("kv/{*path}", Operation::Update, Endpoint::Issue(SecretHandler::Kv)),
    ("kv/{*path}", Operation::Read, Endpoint::ReadKv),
    ("kv/{*path}", Operation::Delete, Endpoint::DeleteKv),
    ("leases", Operation::Read, Endpoint::ListLeases),
    ("leases/{*lease_id}", Operation::Read, Endpoint::ReadLease),
    ("leases/{*lease_id}", Operation::Renew, Endpoint::RenewLease),
    ("leases/{*lease_id}", Operation::Revoke, Endpoint::RevokeLease),
];

/// Build a router from a route table, failing on the first conflict
pub fn build_router(routes: &[(&str, Operation, Endpoint)]) -> BackendResult<Router<Endpoint>> {
    let mut router = Router::new();
    for (pattern, operation, endpoint) in routes {
        router.register(pattern, *operation, *endpoint)?;
    }
    Ok(router)
}
