//! Persisted config: bot credential, chat-user whitelist, web UI password hash.
//! Lives at <home>/.telegram-terminal/config.json (0600), inside a 0700 directory.
//! Written atomically (tmp file + rename), same pattern as a projects.json registry:
//! read-modify-write, never a partial file on disk.

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

const CONFIG_DIR_NAME: &str = ".telegram-terminal";
const CONFIG_FILE: &str = "config.json";
pub const PID_FILE: &str = "remote-term.pid";
pub const LOG_FILE: &str = "remote-term.log";

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Root directory for persisted state. Cached once per process; does not imply the
/// directory exists yet (see `ensure_config_dir`).
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(CONFIG_DIR_NAME)
    })
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

pub fn pid_file_path() -> PathBuf {
    config_dir().join(PID_FILE)
}

pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE)
}

/// Create the config directory if missing, restricted to owner (mode 0700 on unix).
pub fn ensure_config_dir() -> io::Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Persisted config record. Unknown fields are ignored by serde_json; missing fields
/// fall back to their defaults (empty whitelist, no hash, no token).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    #[serde(default)]
    pub webui_password_hash: Option<String>,
}

impl Config {
    pub fn is_user_allowed(&self, chat_user_id: i64) -> bool {
        self.allowed_users.contains(&chat_user_id)
    }
}

/// Load config from disk. Returns the default (empty) config if the file is missing
/// or unparseable — a fresh install has no config.json yet, which is not an error.
pub fn load() -> Config {
    let path = config_path();
    let Ok(data) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    serde_json::from_str(&data).unwrap_or_default()
}

/// Persist config atomically: write to a sibling `.tmp` file, then rename over the
/// target. Restricts the final file to owner-read/write on unix.
pub fn save(cfg: &Config) -> io::Result<()> {
    ensure_config_dir()?;
    let path = config_path();
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(cfg)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(&tmp, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_ignored_and_missing_fields_default() {
        let cfg: Config = serde_json::from_str(
            r#"{"bot_token":"abc","unknown_field":123}"#,
        )
        .unwrap();
        assert_eq!(cfg.bot_token.as_deref(), Some("abc"));
        assert!(cfg.allowed_users.is_empty());
        assert!(cfg.webui_password_hash.is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = Config {
            bot_token: Some("t".into()),
            allowed_users: vec![1, 2, 3],
            webui_password_hash: Some("$2b$...".into()),
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        std::fs::rename(&tmp, &path).unwrap();
        let data = std::fs::read_to_string(&path).unwrap();
        let round_tripped: Config = serde_json::from_str(&data).unwrap();
        assert_eq!(round_tripped, cfg);
    }

    #[test]
    fn is_user_allowed_checks_membership() {
        let cfg = Config { allowed_users: vec![42], ..Default::default() };
        assert!(cfg.is_user_allowed(42));
        assert!(!cfg.is_user_allowed(7));
    }
}
