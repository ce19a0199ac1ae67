use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::info;

use crate::db::database::Database;
use crate::error::GenerationError;

pub const CREDENTIAL_SETTING_KEY: &str = "GEMINI_API_KEY";

/// Value a build pipeline injects when no key was provided.
const EMPTY_PLACEHOLDER: &str = "\"\"";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

fn usable(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed == EMPTY_PLACEHOLDER {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolves the Gemini key: the stored user key wins over the environment key.
///
/// Reads never touch the network. Writes go through [`CredentialProvider::save`]
/// and [`CredentialProvider::clear`]; anything caching availability must
/// re-query afterwards.
#[derive(Clone)]
pub struct CredentialProvider {
    db: Option<Database>,
    stored: Arc<RwLock<Option<String>>>,
    build_time: Option<String>,
}

impl CredentialProvider {
    pub async fn load(db: Database, build_time: &str) -> Result<Self> {
        let stored = db
            .get_setting(CREDENTIAL_SETTING_KEY)
            .await?
            .and_then(|row| usable(Some(&row.value)));
        Ok(CredentialProvider {
            db: Some(db),
            stored: Arc::new(RwLock::new(stored)),
            build_time: usable(Some(build_time)),
        })
    }

    /// A provider without backing storage; writes only live for the process.
    #[cfg(test)]
    pub fn in_memory(stored: Option<&str>, build_time: &str) -> Self {
        CredentialProvider {
            db: None,
            stored: Arc::new(RwLock::new(usable(stored))),
            build_time: usable(Some(build_time)),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.resolve().is_ok()
    }

    pub fn has_stored_credential(&self) -> bool {
        self.stored.read().is_some()
    }

    pub fn resolve(&self) -> Result<Credential, GenerationError> {
        if let Some(value) = self.stored.read().as_ref() {
            return Ok(Credential(value.clone()));
        }
        self.build_time
            .as_ref()
            .map(|value| Credential(value.clone()))
            .ok_or(GenerationError::CredentialMissing)
    }

    /// Stores a user key. A blank value removes the stored entry instead.
    pub async fn save(&self, value: &str) -> Result<()> {
        let Some(value) = usable(Some(value)) else {
            return self.clear().await;
        };
        if let Some(db) = &self.db {
            db.set_setting(CREDENTIAL_SETTING_KEY, &value).await?;
        }
        *self.stored.write() = Some(value);
        info!("Stored user API key");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.delete_setting(CREDENTIAL_SETTING_KEY).await?;
        }
        *self.stored.write() = None;
        info!("Cleared stored user API key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_build_keys_are_absent() {
        for build_time in ["", "   ", "\"\""] {
            let provider = CredentialProvider::in_memory(None, build_time);
            assert!(!provider.has_credential());
            assert_eq!(provider.resolve(), Err(GenerationError::CredentialMissing));
        }
    }

    #[test]
    fn stored_key_wins_over_build_key() {
        let provider = CredentialProvider::in_memory(Some("user-key"), "build-key");
        assert_eq!(provider.resolve().unwrap().expose(), "user-key");

        let provider = CredentialProvider::in_memory(None, "build-key");
        assert_eq!(provider.resolve().unwrap().expose(), "build-key");
    }

    #[test]
    fn debug_output_never_shows_the_key() {
        let credential = CredentialProvider::in_memory(Some("secret-123"), "")
            .resolve()
            .unwrap();
        assert!(!format!("{credential:?}").contains("secret-123"));
    }

    #[tokio::test]
    async fn save_and_clear_persist_through_the_database() {
        let db = Database::init("sqlite::memory:").await.unwrap();
        let provider = CredentialProvider::load(db.clone(), "").await.unwrap();
        assert!(!provider.has_credential());

        provider.save("  user-key  ").await.unwrap();
        assert_eq!(provider.resolve().unwrap().expose(), "user-key");
        let reloaded = CredentialProvider::load(db.clone(), "").await.unwrap();
        assert!(reloaded.has_stored_credential());

        provider.save("   ").await.unwrap();
        assert!(!provider.has_credential());
        assert!(db.get_setting(CREDENTIAL_SETTING_KEY).await.unwrap().is_none());
    }
}
