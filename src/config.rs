use crate::{
    api::UserIdentity,
    bet::GameRules,
    sync::SyncConfig,
};
use serde::Deserialize;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const API_URL_ENV: &str = "ROLLS_API_URL";
pub const USER_ID_ENV: &str = "ROLLS_USER_ID";
pub const INIT_DATA_ENV: &str = "ROLLS_INIT_DATA";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{origin} user id '{value}' is not a number")]
    InvalidUserId { origin: &'static str, value: String },
    #[error("no user id given (use --user-id, ROLLS_USER_ID or the config file)")]
    MissingUserId,
}

/// Optional JSON config file. Every field may be omitted.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub user_id: Option<u64>,
    pub init_data: Option<String>,
    pub log_dir: Option<String>,
    pub sync: SyncConfig,
    pub rules: GameRules,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values given on the command line. They win over everything else.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub user_id: Option<String>,
    pub init_data: Option<String>,
    pub config_path: Option<String>,
    pub log_dir: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub identity: UserIdentity,
    pub sync: SyncConfig,
    pub rules: GameRules,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn load(cli: &CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Layers defaults, the config file, the environment and the command line,
    /// in that order.
    pub fn resolve(
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match cli.config_path.as_deref() {
            Some(raw) => ConfigFile::read(&expand_path(raw))?,
            None => ConfigFile::default(),
        };

        let api_url = cli
            .api_url
            .clone()
            .or_else(|| env(API_URL_ENV))
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let user_id = match (&cli.user_id, env(USER_ID_ENV)) {
            (Some(raw), _) => Some(parse_user_id("--user-id", raw)?),
            (None, Some(raw)) => Some(parse_user_id(USER_ID_ENV, &raw)?),
            (None, None) => file.user_id,
        }
        .ok_or(ConfigError::MissingUserId)?;

        let init_data = cli
            .init_data
            .clone()
            .or_else(|| env(INIT_DATA_ENV))
            .or(file.init_data)
            .unwrap_or_default();

        let log_dir = cli
            .log_dir
            .as_deref()
            .or(file.log_dir.as_deref())
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        Ok(AppConfig {
            api_url,
            identity: UserIdentity { user_id, init_data },
            sync: file.sync,
            rules: file.rules,
            log_dir,
        })
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn parse_user_id(origin: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidUserId {
            origin,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::amount::Amount;
    use std::{
        collections::HashMap,
        time::Duration,
    };

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_temp_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.json", name, std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn resolve__env_only__uses_defaults_for_the_rest() {
        // given
        let env = env_from(&[(USER_ID_ENV, "12345"), (INIT_DATA_ENV, "auth=1")]);

        // when
        let config = AppConfig::resolve(&CliOverrides::default(), env).unwrap();

        // then
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.identity.user_id, 12345);
        assert_eq!(config.identity.init_data, "auth=1");
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.rules.min_bet, Amount::from_nanotons(10_000_000));
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
    }

    #[test]
    fn resolve__cli_beats_env_beats_file() {
        // given
        let path = write_temp_config(
            "rolls-client-layering",
            r#"{
                "api_url": "http://file:1",
                "user_id": 1,
                "init_data": "file",
                "sync": {"request_timeout": 2500, "outcome_retries": 2},
                "rules": {"max_bet": 20}
            }"#,
        );
        let cli = CliOverrides {
            user_id: Some("3".to_string()),
            config_path: Some(path.display().to_string()),
            ..CliOverrides::default()
        };
        let env = env_from(&[(API_URL_ENV, "http://env:2"), (USER_ID_ENV, "2")]);

        // when
        let config = AppConfig::resolve(&cli, env).unwrap();

        // then
        assert_eq!(config.api_url, "http://env:2");
        assert_eq!(config.identity.user_id, 3);
        assert_eq!(config.identity.init_data, "file");
        assert_eq!(config.sync.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.sync.outcome_retries, 2);
        assert_eq!(config.sync.reveal_grace_secs, 3);
        assert_eq!(config.rules.max_bet, Amount::from_ton(20));
        assert_eq!(config.rules.min_bet, GameRules::default().min_bet);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn resolve__missing_user_id__is_an_error() {
        let res = AppConfig::resolve(&CliOverrides::default(), env_from(&[]));
        assert!(matches!(res, Err(ConfigError::MissingUserId)));
    }

    #[test]
    fn resolve__non_numeric_user_id__names_its_origin() {
        let env = env_from(&[(USER_ID_ENV, "alice")]);
        let err = AppConfig::resolve(&CliOverrides::default(), env).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ROLLS_USER_ID user id 'alice' is not a number"
        );
    }

    #[test]
    fn resolve__unreadable_file__reports_path() {
        let cli = CliOverrides {
            config_path: Some("/definitely/not/here.json".to_string()),
            ..CliOverrides::default()
        };
        let err = AppConfig::resolve(&cli, env_from(&[(USER_ID_ENV, "1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
