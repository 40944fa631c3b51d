use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::Session;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Hosted backend
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub http_timeout_secs: u64,

    // Session issued by the auth service
    pub user_id: String,
    pub access_token: String,

    // Month boundaries are judged in this zone; None means the local clock.
    pub timezone: Option<String>,

    // Display
    pub recent_trades_limit: usize,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let timezone = env("DASHBOARD_TIMEZONE", "");

        Config {
            supabase_url: env("SUPABASE_URL", ""),
            supabase_anon_key: env("SUPABASE_ANON_KEY", ""),
            http_timeout_secs: env("HTTP_TIMEOUT_SECS", "15").parse().unwrap_or(15),
            user_id: env("SUPABASE_USER_ID", ""),
            access_token: env("SUPABASE_ACCESS_TOKEN", ""),
            timezone: if timezone.trim().is_empty() {
                None
            } else {
                Some(timezone.trim().to_string())
            },
            recent_trades_limit: env("RECENT_TRADES_LIMIT", "20").parse().unwrap_or(20),
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    /// Explicit session for backend calls.
    pub fn session(&self) -> Session {
        Session::new(&self.user_id, &self.access_token)
    }

    /// Names of required settings that are still empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase_url.is_empty() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase_anon_key.is_empty() {
            missing.push("SUPABASE_ANON_KEY");
        }
        if self.user_id.is_empty() {
            missing.push("SUPABASE_USER_ID");
        }
        if self.access_token.is_empty() {
            missing.push("SUPABASE_ACCESS_TOKEN");
        }
        missing
    }

    /// Configured IANA zone, or None for the local clock. Unknown names are
    /// logged and ignored.
    pub fn tz(&self) -> Option<Tz> {
        let name = self.timezone.as_deref()?;
        match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                warn!("Unknown DASHBOARD_TIMEZONE {:?}, using local time", name);
                None
            }
        }
    }
}
