/// Storage-plugin settings applied to every job the builder produces.
///
/// The builder never reads the process environment itself; construct this
/// once with [`StorageSettings::from_env`] (or explicit values) and pass it
/// in.
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    /// Access key written into the flexVolume options of every template.
    pub access_key: String,
    /// Running user; seeds the default volume subpath (`/<username>`).
    pub username: String,
    /// Root used when expanding `~/` paths. When empty, `users/<username>`
    /// is used instead.
    pub home_path: String,
}

impl StorageSettings {
    pub fn new(access_key: &str, username: &str, home_path: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            username: username.to_string(),
            home_path: home_path.to_string(),
        }
    }

    /// Read settings from the environment (and a `.env` file if present).
    /// Missing variables default to empty strings.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            access_key: std::env::var("V3IO_ACCESS_KEY").unwrap_or_else(|_| "".to_string()),
            username: std::env::var("V3IO_USERNAME").unwrap_or_else(|_| "".to_string()),
            home_path: std::env::var("V3IO_HOME").unwrap_or_else(|_| "".to_string()),
        }
    }
}
