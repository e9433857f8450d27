/// Runtime settings, read once at startup. Everything has a development
/// default so a bare `cargo run` works; production overrides come from the
/// environment (or a `.env` file via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub required_min_password_length: usize,
    pub chats_per_page: i64,
    pub messages_per_load_event: i64,
    pub auth_token_expires_in: i64,
    pub reset_token_expires_in: i64,
    /// HTTP mail relay endpoint; mail is dropped (and logged) when unset.
    pub mail_endpoint: Option<String>,
    pub mail_sender: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://tetatet.db".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            required_min_password_length: 8,
            chats_per_page: 8,
            messages_per_load_event: 10,
            auth_token_expires_in: 3600,
            reset_token_expires_in: 1800,
            mail_endpoint: None,
            mail_sender: "tetatet".to_owned(),
        }
    }
}

fn var_or(name: &str, default: String) -> String {
    dotenv::var(name).unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match dotenv::var(name) {
        Ok(value) => value.parse().unwrap_or(default),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Config {
        let defaults = Config::default();
        Config {
            database_url: var_or("DATABASE_URL", defaults.database_url),
            bind_addr: var_or("BIND_ADDR", defaults.bind_addr),
            required_min_password_length: parse_or(
                "REQUIRED_MIN_PASSWORD_LENGTH",
                defaults.required_min_password_length,
            ),
            chats_per_page: parse_or("CHATS_PER_PAGE", defaults.chats_per_page),
            messages_per_load_event: parse_or(
                "MESSAGES_PER_LOAD_EVENT",
                defaults.messages_per_load_event,
            ),
            auth_token_expires_in: parse_or(
                "AUTHENTICATION_TOKEN_DEFAULT_EXPIRES_IN",
                defaults.auth_token_expires_in,
            ),
            reset_token_expires_in: parse_or(
                "PASSWORD_DEFAULT_EXPIRES_IN",
                defaults.reset_token_expires_in,
            ),
            mail_endpoint: dotenv::var("MAIL_ENDPOINT").ok(),
            mail_sender: var_or("MAIL_SENDER", defaults.mail_sender),
        }
    }
}
