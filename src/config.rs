use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_database_url() -> String {
    env::var("DATABASE_URL").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_database_name() -> String {
    env::var("DATABASE_NAME").unwrap_or("lms".to_string())
}

fn default_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(5000)
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("./uploads".to_string()))
}

#[cfg(debug_assertions)]
fn default_admin_emails() -> Vec<String> {
    vec![String::from("admin@localhost")]
}
#[cfg(not(debug_assertions))]
fn default_admin_emails() -> Vec<String> {
    vec![]
}

fn default_token_lifetime_days() -> i64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Users registering with one of these emails become admins.
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_token_lifetime_days")]
    pub token_lifetime_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            database_url: default_database_url(),
            database_name: default_database_name(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            admin_emails: default_admin_emails(),
            token_lifetime_days: default_token_lifetime_days(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;
        config.apply_env_overrides();

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// Environment variables take precedence over values read from the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(name) = env::var("DATABASE_NAME") {
            self.database_name = name;
        }
        if let Some(port) = env::var("PORT").ok().and_then(|it| it.parse().ok()) {
            self.port = port;
        }
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|it| it.eq_ignore_ascii_case(email))
    }
}
