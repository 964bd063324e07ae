use std::env;

use chrono::FixedOffset;
use tracing::warn;

/// Default clinic UTC offset in minutes (UTC+3, no DST).
pub const DEFAULT_CLINIC_UTC_OFFSET_MINUTES: i32 = 180;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_api_key: String,
    /// Offset of the clinic's civil timezone from UTC, in minutes.
    /// The whole system runs on one local calendar; this is the only
    /// timezone knob there is.
    pub clinic_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_api_key: env::var("STORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_API_KEY not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CLINIC_UTC_OFFSET_MINUTES),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_api_key.is_empty()
    }

    /// The clinic's fixed civil timezone.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}
