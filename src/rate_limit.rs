use serde::Serialize;

// Prefix used when a config does not set one. Every unprefixed call site
// sharing an identifier therefore shares one budget.
pub const DEFAULT_PREFIX: &str = "rl";

// Standard API limit (requests per window)
pub const DEFAULT_STANDARD_LIMIT: u32 = 100;

// Strict endpoint limit (requests per window)
pub const DEFAULT_STRICT_LIMIT: u32 = 20;

// Login/auth endpoint limit (requests per window)
pub const DEFAULT_AUTH_LIMIT: u32 = 10;

// Public chart endpoint limit (requests per window)
pub const DEFAULT_PUBLIC_CHART_LIMIT: u32 = 60;

// Default window length in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;

// One throttling window per (prefix, identifier) key. Dead once the window
// passes; check() replaces it instead of mutating further.
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: i64, // epoch millis
}

// Limit + window for one class of calls. Distinct prefixes keep fully
// independent counters for the same identifier.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_secs: u64,
    pub prefix: Option<String>,
}

impl RateLimitConfig {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs,
            prefix: None,
        }
    }

    pub fn with_prefix(limit: u32, window_secs: u64, prefix: &str) -> Self {
        Self {
            limit,
            window_secs,
            prefix: Some(prefix.to_string()),
        }
    }

    // Named presets, part of the public contract

    pub fn standard() -> Self {
        Self::with_prefix(DEFAULT_STANDARD_LIMIT, DEFAULT_WINDOW_SECS, "api")
    }

    pub fn strict() -> Self {
        Self::with_prefix(DEFAULT_STRICT_LIMIT, DEFAULT_WINDOW_SECS, "strict")
    }

    pub fn auth() -> Self {
        Self::with_prefix(DEFAULT_AUTH_LIMIT, DEFAULT_WINDOW_SECS, "auth")
    }

    pub fn public_chart() -> Self {
        Self::with_prefix(DEFAULT_PUBLIC_CHART_LIMIT, DEFAULT_WINDOW_SECS, "public_chart")
    }

    // Store key for an identifier under this config's namespace
    pub(crate) fn key_for(&self, identifier: &str) -> String {
        let prefix = self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX);
        format!("{}:{}", prefix, identifier)
    }
}

// Outcome of a single rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub success: bool,
    pub remaining: u32,
    pub reset_at: i64, // epoch millis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_contract() {
        let standard = RateLimitConfig::standard();
        assert_eq!(standard.limit, 100);
        assert_eq!(standard.window_secs, 60);
        assert_eq!(standard.prefix.as_deref(), Some("api"));

        let strict = RateLimitConfig::strict();
        assert_eq!(strict.limit, 20);
        assert_eq!(strict.prefix.as_deref(), Some("strict"));

        let auth = RateLimitConfig::auth();
        assert_eq!(auth.limit, 10);
        assert_eq!(auth.prefix.as_deref(), Some("auth"));

        let chart = RateLimitConfig::public_chart();
        assert_eq!(chart.limit, 60);
        assert_eq!(chart.prefix.as_deref(), Some("public_chart"));
    }

    #[test]
    fn unprefixed_configs_share_the_default_namespace() {
        let a = RateLimitConfig::new(10, 60);
        let b = RateLimitConfig::new(99, 30);
        assert_eq!(a.key_for("1.2.3.4"), "rl:1.2.3.4");
        assert_eq!(a.key_for("1.2.3.4"), b.key_for("1.2.3.4"));
    }

    #[test]
    fn prefixes_namespace_the_key() {
        let auth = RateLimitConfig::auth();
        let strict = RateLimitConfig::strict();
        assert_eq!(auth.key_for("1.2.3.4"), "auth:1.2.3.4");
        assert_ne!(auth.key_for("1.2.3.4"), strict.key_for("1.2.3.4"));
    }
}
