/// Relay configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Secret used to sign and verify access tokens.
    pub jwt_secret: String,
    /// Access-token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Whether room names are folded to lowercase before lookup/creation.
    ///
    /// When true, `Lobby` and `lobby` resolve to the same room. When false,
    /// differently-cased names are distinct rooms.
    pub fold_room_names: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            jwt_secret: required_var("JWT_SECRET"),
            token_ttl_secs: std::env::var("TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            fold_room_names: std::env::var("ROOM_NAME_FOLD_CASE")
                .ok()
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
