use std::time::Duration;

use searchfall_core::{Error, ProviderResult, Result};

pub mod brave;
pub mod duckduckgo;
pub mod engine;
pub mod retry;
pub mod scrape;
pub mod xai;

pub use engine::TieredSearch;

/// Shared HTTP client for all tiers. Safety defaults: avoid "hang forever"
/// on DNS/TLS/body stalls; adapters still set a per-request timeout.
pub fn default_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("searchfall/0.1")
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Unreachable(e.to_string()))
}

/// Per-request timeout for provider calls. Overridable but clamped so a huge
/// value cannot pin a tier indefinitely.
pub(crate) fn request_timeout() -> Duration {
    let ms = std::env::var("SEARCHFALL_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(20_000)
        .clamp(1_000, 240_000);
    Duration::from_millis(ms)
}

/// First non-empty env var wins; whitespace-only values count as unset.
pub(crate) fn env_var_nonempty(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|v| !v.trim().is_empty()))
}

/// Transport errors: timeouts are worth another attempt, anything else
/// (DNS, TLS, refused connection) is treated as the provider being down.
pub(crate) fn transport_failure(what: &str, e: &reqwest::Error) -> ProviderResult {
    if e.is_timeout() {
        ProviderResult::Transient {
            reason: format!("{what} timed out: {e}"),
        }
    } else {
        ProviderResult::Fatal {
            reason: format!("{what} unreachable: {e}"),
        }
    }
}

/// Percent-decodes redirect-wrapped URLs extracted from search result pages.
/// Decodes at the byte level first so a stray non-UTF-8 escape degrades to a
/// replacement char instead of dropping the whole URL; invalid escapes pass
/// through untouched.
pub(crate) fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

#[cfg(test)]
pub(crate) mod test_util {
    /// Env vars are process-global; tests that mutate them restore on drop.
    pub struct EnvGuard {
        k: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        pub fn set(k: &'static str, v: &str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::set_var(k, v);
            Self { k, prev }
        }

        pub fn unset(k: &'static str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::remove_var(k);
            Self { k, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(v) = self.prev.take() {
                std::env::set_var(self.k, v);
            } else {
                std::env::remove_var(self.k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_util::EnvGuard;

    #[test]
    fn percent_decode_unwraps_encoded_urls() {
        assert_eq!(
            percent_decode("https%3A%2F%2Fexample.com%2Fpath"),
            "https://example.com/path"
        );
        // `+` is a literal in percent-encoded URLs, not a space.
        assert_eq!(percent_decode("a+b"), "a+b");
        // Truncated/invalid escapes pass through.
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn env_var_nonempty_ignores_whitespace_values() {
        let _g1 = EnvGuard::set("SEARCHFALL_TEST_PRIMARY", "   ");
        let _g2 = EnvGuard::set("SEARCHFALL_TEST_FALLBACK", "value");
        assert_eq!(
            env_var_nonempty("SEARCHFALL_TEST_PRIMARY", "SEARCHFALL_TEST_FALLBACK").as_deref(),
            Some("value")
        );
    }

    #[test]
    fn request_timeout_is_clamped() {
        let _g = EnvGuard::set("SEARCHFALL_TIMEOUT_MS", "50");
        assert_eq!(request_timeout(), Duration::from_millis(1_000));
    }

    proptest::proptest! {
        #[test]
        fn percent_decode_never_panics(s in ".{0,64}") {
            let _ = percent_decode(&s);
        }

        #[test]
        fn percent_decode_roundtrips_encoded_ascii(s in "[ -~]{0,32}") {
            let encoded: String = s.bytes().map(|b| format!("%{b:02X}")).collect();
            proptest::prop_assert_eq!(percent_decode(&encoded), s);
        }
    }
}
