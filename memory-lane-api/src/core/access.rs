//! Ownership and visibility rules for memory lanes.

use crate::core::auth::AuthUser;
use crate::core::error::ServiceError;
use crate::models::lane::{MemoryLane, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("You do not have access to this memory lane")]
    Private,

    #[error("Only the owner can modify this memory lane")]
    NotOwner,
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        ServiceError::Forbidden(err.to_string())
    }
}

pub fn is_owner(lane: &MemoryLane, viewer: Option<&AuthUser>) -> bool {
    viewer.is_some_and(|user| user.id == lane.user_id)
}

/// Returns whether the viewer owns the lane; private lanes are closed to
/// everyone else.
pub fn check_view(lane: &MemoryLane, viewer: Option<&AuthUser>) -> Result<bool, AccessError> {
    let owner = is_owner(lane, viewer);
    if lane.visibility == Visibility::Private && !owner {
        return Err(AccessError::Private);
    }
    Ok(owner)
}

pub fn check_edit(lane: &MemoryLane, user: &AuthUser) -> Result<(), AccessError> {
    if is_owner(lane, Some(user)) {
        Ok(())
    } else {
        Err(AccessError::NotOwner)
    }
}
