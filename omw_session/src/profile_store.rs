use std::path::{Path, PathBuf};

use omw_lib::profile::Profile;

use crate::ProfileStoreError;

pub const PROFILE_FILE_NAME: &str = "omw_profile.json";

/// Keeps the user profile between runs. Load once at start, save on every edit.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store using the default file name inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(PROFILE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved profile, or `None` if nothing usable has been saved yet.
    pub async fn load(&self) -> Result<Option<Profile>, ProfileStoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ProfileStoreError::Io(format!("Failed to read {:?}: {}", self.path, err))),
        };

        let profile: Profile = serde_json::from_str(&contents)
            .map_err(|err| ProfileStoreError::Format(format!("{:?}: {}", self.path, err)))?;

        Ok(profile.has_first_name().then_some(profile))
    }

    /// Saves the profile. Profiles without a first name are skipped and `false` is returned.
    pub async fn save(&self, profile: &Profile) -> Result<bool, ProfileStoreError> {
        if !profile.has_first_name() {
            return Ok(false);
        }

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                tokio::fs::create_dir_all(dir).await
                    .map_err(|err| ProfileStoreError::Io(format!("Failed to create profile directory {:?}: {}", dir, err)))?;
            }
        }

        let json = serde_json::to_string(profile)
            .map_err(|err| ProfileStoreError::Format(err.to_string()))?;
        tokio::fs::write(&self.path, json).await
            .map_err(|err| ProfileStoreError::Io(format!("Failed to write {:?}: {}", self.path, err)))?;

        tracing::debug!("Saved profile to {:?}", self.path);
        Ok(true)
    }
}
