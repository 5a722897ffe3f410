pub mod entry;
pub mod error;
pub mod lane;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};

/// Body returned by mutations that have nothing else to report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationStatus {
    pub success: bool,
}

impl OperationStatus {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests;
