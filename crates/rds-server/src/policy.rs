use rds_core::{RdsError, Result};
use rds_rpc::RpcRequest;

/// A caller is the datasite admin iff its transport-derived identity equals
/// the datasite owner's email. Everyone else is a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Guest,
}

pub fn role_for(sender_email: &str, owner_email: &str) -> Role {
    if sender_email == owner_email {
        Role::Admin
    } else {
        Role::Guest
    }
}

/// Gate an operation on the admin role. A failed gate surfaces `Permission`
/// and never silently downgrades the operation.
pub fn require_admin(request: &RpcRequest, owner_email: &str, action: &str) -> Result<()> {
    match role_for(&request.sender_email, owner_email) {
        Role::Admin => Ok(()),
        Role::Guest => Err(RdsError::Permission(format!(
            "{} must be the datasite admin to {action}",
            request.sender_email
        ))),
    }
}
