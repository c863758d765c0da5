use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    auth::repo_types::TokenRow,
    store::{Store, StoreError},
};

/// Hex SHA-256 of the bearer string. The ledger only ever stores this value.
pub fn fingerprint(bearer: &str) -> String {
    hex::encode(Sha256::digest(bearer.as_bytes()))
}

/// Set of tokens that have been issued and not yet revoked.
#[derive(Clone)]
pub struct TokenLedger {
    store: Arc<dyn Store>,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, bearer: &str) -> Result<TokenRow, StoreError> {
        let row = self.store.insert_token(&fingerprint(bearer)).await?;
        debug!(token_id = row.id, "token recorded");
        Ok(row)
    }

    pub async fn is_valid(&self, bearer: &str) -> Result<Option<TokenRow>, StoreError> {
        self.store.find_token(&fingerprint(bearer)).await
    }

    /// Deleting an already revoked row is not an error.
    pub async fn revoke(&self, row: &TokenRow) -> Result<(), StoreError> {
        let removed = self.store.delete_token(row.id).await?;
        debug!(token_id = row.id, removed, "token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> TokenLedger {
        TokenLedger::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn fingerprint_is_stable_hex_sha256() {
        let a = fingerprint("bearer");
        assert_eq!(a, fingerprint("bearer"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, fingerprint("bearer2"));
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn record_then_is_valid() {
        let ledger = ledger();
        let row = ledger.record("tok").await.unwrap();
        assert_eq!(row.token_hash, fingerprint("tok"));
        assert_ne!(row.token_hash, "tok");
        assert_eq!(ledger.is_valid("tok").await.unwrap(), Some(row));
        assert_eq!(ledger.is_valid("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_invalidates() {
        let ledger = ledger();
        let row = ledger.record("tok").await.unwrap();
        ledger.revoke(&row).await.unwrap();
        assert!(ledger.is_valid("tok").await.unwrap().is_none());
        ledger.revoke(&row).await.unwrap();
    }

    #[tokio::test]
    async fn revoking_one_token_keeps_others() {
        let ledger = ledger();
        let a = ledger.record("a").await.unwrap();
        ledger.record("b").await.unwrap();
        ledger.revoke(&a).await.unwrap();
        assert!(ledger.is_valid("a").await.unwrap().is_none());
        assert!(ledger.is_valid("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_bearer_is_not_valid() {
        assert!(ledger().is_valid("").await.unwrap().is_none());
    }
}
