use log::debug;

/// Loads `.env` from the working directory or its parents, if any.
pub fn init() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(_) => debug!("No .env file found"),
    }
}

/// Reads and parses an environment variable, `None` when unset or invalid.
pub fn var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
