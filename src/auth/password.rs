//! bcrypt hashing, run on the blocking pool so request workers stay free.

use crate::error::{AppError, AppResult};

pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("password hashing error: {}", e)))
}

/// Constant-time comparison via bcrypt. A malformed hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("secret1".into(), 4).await.unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("secret2".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_mismatch() {
        assert!(!verify_password("secret1".into(), "not-a-hash".into())
            .await
            .unwrap());
    }
}
