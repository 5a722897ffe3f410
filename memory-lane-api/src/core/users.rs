use std::sync::Arc;
use tracing::info;

use crate::core::auth::AuthUser;
use crate::core::error::{ServiceError, ServiceResult};
use crate::core::storage::Store;
use crate::models::user::{UpdateUser, UpdateUserResponse, UserInfo};

/// Profile lookups that merge token metadata with local overrides.
pub struct UserManager {
    store: Arc<dyn Store>,
}

impl UserManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// A stored profile name wins over the one carried in the token.
    pub async fn get_user(&self, user: &AuthUser) -> ServiceResult<UserInfo> {
        let profile = self
            .store
            .get_profile(&user.id)
            .await
            .map_err(ServiceError::storage("Failed to load user"))?;

        Ok(UserInfo {
            name: profile
                .map(|p| p.name)
                .or_else(|| user.metadata.name.clone()),
            avatar: user.metadata.avatar_url.clone(),
        })
    }

    pub async fn update_user(
        &self,
        user: &AuthUser,
        update: UpdateUser,
    ) -> ServiceResult<UpdateUserResponse> {
        let name = update.name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("Name is required".to_string()));
        }

        self.store
            .upsert_profile(&user.id, name)
            .await
            .map_err(ServiceError::storage("Failed to update user"))?;

        info!("Updated profile of {}", user.id);
        Ok(UpdateUserResponse {
            success: true,
            message: "User updated successfully".to_string(),
        })
    }
}
