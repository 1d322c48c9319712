use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use kobiri_core::auth::OAuthConfig;
use kobiri_core::gemini;
use kobiri_core::mealdb;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub mealdb_url: String,
    pub oauth: Option<OAuthConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "kobiri").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::from_dir(data_dir, |key| std::env::var(key).ok())
    }

    /// Build a config rooted at `data_dir`, reading settings through `lookup`.
    pub fn from_dir(data_dir: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_api_key = match env("KOBIRI_GEMINI_API_KEY").or_else(|| env("GEMINI_API_KEY")) {
            Some(key) => Some(key),
            None => read_secret(&data_dir.join("gemini_api_key"))?,
        };

        let oauth = match (
            env("KOBIRI_OAUTH_AUTHORIZE_URL"),
            env("KOBIRI_OAUTH_CLIENT_ID"),
            env("KOBIRI_OAUTH_REDIRECT_URL"),
        ) {
            (Some(authorize_url), Some(client_id), Some(redirect_url)) => Some(OAuthConfig {
                authorize_url,
                client_id,
                redirect_url,
            }),
            _ => None,
        };

        Ok(Config {
            db_path: data_dir.join("kobiri.db"),
            gemini_api_key,
            gemini_model: env("KOBIRI_GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            mealdb_url: env("KOBIRI_MEALDB_URL").unwrap_or_else(|| mealdb::DEFAULT_BASE_URL.to_string()),
            oauth,
            data_dir,
        })
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join("session")
    }

    /// Access token saved by the last `kobiri login`.
    pub fn load_session_token(&self) -> Result<Option<String>> {
        read_secret(&self.session_path())
    }

    pub fn save_session_token(&self, token: &str) -> Result<()> {
        let path = self.session_path();
        std::fs::write(&path, token).context("Failed to write session file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        Ok(())
    }

    pub fn clear_session_token(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

fn read_secret(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let value = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = value.trim().to_string();
    Ok((!value.is_empty()).then_some(value))
}
