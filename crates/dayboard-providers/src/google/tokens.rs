//! File-backed token store.
//!
//! The session is kept as JSON in `token-user.json` inside a dedicated
//! directory. Writes go through a temp file and a rename so a crash never
//! leaves a truncated token file behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::TokenStore;
use crate::session::AuthorizedSession;

/// Name of the file holding the cached session.
pub const TOKEN_FILE_NAME: &str = "token-user.json";

/// Token store persisting the session in a local directory.
#[derive(Debug)]
pub struct FileTokenStore {
    /// Directory owned by the store.
    dir: PathBuf,

    /// In-memory copy of the last loaded or saved session.
    cached: RwLock<Option<AuthorizedSession>>,
}

impl FileTokenStore {
    /// Creates a store rooted at `dir`. Nothing is touched on disk yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cached: RwLock::new(None),
        }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the token file.
    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE_NAME)
    }

    /// Returns the session held in memory, without touching the disk.
    pub fn cached(&self) -> Option<AuthorizedSession> {
        self.cached.read().unwrap().clone()
    }
}

impl TokenStore for FileTokenStore {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> ProviderResult<Option<AuthorizedSession>> {
        let path = self.token_path();
        if !path.exists() {
            debug!("no token file at {:?}", path);
            *self.cached.write().unwrap() = None;
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file {:?}", path))
                .with_source(e)
        })?;

        let session: AuthorizedSession = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file {:?}", path))
                .with_source(e)
        })?;

        debug!("loaded session from {:?}", path);
        *self.cached.write().unwrap() = Some(session.clone());
        Ok(Some(session))
    }

    fn save(&self, session: &AuthorizedSession) -> ProviderResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ProviderError::configuration(format!("failed to create token directory {:?}", self.dir))
                .with_source(e)
        })?;

        let path = self.token_path();
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(session).map_err(|e| {
            ProviderError::internal("failed to serialize session").with_source(e)
        })?;

        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration("failed to write token file").with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &path).map_err(|e| {
            ProviderError::configuration("failed to rename token file").with_source(e)
        })?;

        *self.cached.write().unwrap() = Some(session.clone());
        debug!("saved session to {:?}", path);
        Ok(())
    }

    fn clear(&self) -> ProviderResult<()> {
        *self.cached.write().unwrap() = None;

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(
                    ProviderError::configuration("failed to read token directory").with_source(e),
                );
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|e| {
                    ProviderError::configuration(format!("failed to remove {:?}", path))
                        .with_source(e)
                })?;
            }
        }
        info!("cleared token store at {:?}", self.dir);
        Ok(())
    }

    fn delete(&self) -> ProviderResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!("deleted token store at {:?}", self.dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(
                ProviderError::configuration("failed to delete token directory").with_source(e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn session() -> AuthorizedSession {
        AuthorizedSession::new(
            "access-token",
            Some("refresh-token".to_string()),
            Some(3600),
            vec!["openid".to_string()],
        )
        .with_id_token("id-token")
    }

    fn store_in(tmp: &tempfile::TempDir) -> FileTokenStore {
        FileTokenStore::new(tmp.path().join("google-auth"))
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);

        store.save(&session()).unwrap();
        assert!(store.token_path().exists());
        assert!(!store.token_path().with_extension("json.tmp").exists());

        let reopened = store_in(&tmp);
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded, session_with_same_tokens(&loaded));
        assert_eq!(loaded.access_token, "access-token");
        assert_eq!(loaded.id_token.as_deref(), Some("id-token"));
        assert_eq!(reopened.cached(), Some(loaded));
    }

    fn session_with_same_tokens(other: &AuthorizedSession) -> AuthorizedSession {
        let mut s = session();
        s.expires_at = other.expires_at;
        s.issued_at = other.issued_at;
        s
    }

    #[test]
    fn missing_file_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        assert!(store.load().unwrap().is_none());
        assert!(!store.dir().exists());
    }

    #[test]
    fn corrupt_file_is_a_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.token_path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.save(&session()).unwrap();

        let mode = fs::metadata(store.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn clear_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.save(&session()).unwrap();
        fs::write(store.dir().join("stray.json"), "{}").unwrap();

        store.clear().unwrap();
        assert!(store.dir().exists());
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
        assert!(store.cached().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn reset_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.save(&session()).unwrap();

        store.reset().unwrap();
        assert!(!store.dir().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn reset_of_missing_store_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.reset().unwrap();
    }
}
