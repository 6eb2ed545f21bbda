use std::path::{Path, PathBuf};

use crate::credential::Credential;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One JSON file per account under `auth-dir/`. Files are rewritten
/// atomically (temp file + rename in the same directory) so a crashed
/// refresh never leaves a truncated credential behind.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_all(&self) -> Result<Vec<Credential>, StoreError> {
        let mut credentials = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(credentials),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str::<Credential>(&raw) {
                Ok(credential) => credentials.push(credential),
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "skipping unreadable credential file");
                }
            }
        }
        Ok(credentials)
    }

    pub fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(&credential.id);
        let tmp = path.with_extension("json.tmp");
        let rendered =
            serde_json::to_vec_pretty(credential).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&tmp, rendered).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let safe: String = id
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmgate_common::ProviderKind;

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("lmgate-store-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = CredentialStore::new(&dir);

        let credential = Credential::oauth(
            ProviderKind::GeminiCli,
            "acct-1",
            "ya29.token",
            Some("refresh".to_string()),
            Some(1_700_000_000),
        );
        store.save(&credential).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![credential]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_dir_loads_empty() {
        let store = CredentialStore::new("/nonexistent/lmgate-auth");
        assert!(store.load_all().unwrap().is_empty());
    }
}
