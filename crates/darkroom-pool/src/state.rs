use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Per-key validity. `Invalid` is terminal until the user removes and
/// re-adds the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// Never used or tested.
    Unknown,
    /// A validation probe is in flight. Transient only; never persisted.
    Checking,
    /// Confirmed usable.
    Valid,
    /// Confirmed unusable (bad key).
    Invalid,
}

/// One entry in the key pool. The secret is the only identity; keys are
/// compared by secret equality and never logged in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub secret: String,
    pub validity: Validity,
    pub is_preferred: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub cooldown_until: Option<OffsetDateTime>,
}

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            validity: Validity::Unknown,
            is_preferred: false,
            cooldown_until: None,
        }
    }

    /// Eligible for selection: not invalid and not inside a cooldown window.
    pub fn usable_at(&self, now: OffsetDateTime) -> bool {
        self.validity != Validity::Invalid
            && self.cooldown_until.is_none_or(|until| until <= now)
    }
}

/// Shortened form of a secret safe for logs: first and last four characters.
/// Counts characters, not bytes; secrets are arbitrary user input.
pub fn redact_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_owned();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn redaction_never_reveals_short_secrets() {
        assert_eq!(redact_secret("abc"), "****");
        assert_eq!(redact_secret("12345678"), "****");
        assert_eq!(redact_secret("AIzaSyExampleKey01"), "AIza...ey01");
    }

    #[test]
    fn redaction_handles_multi_byte_secrets() {
        // Byte offset 4 falls inside the three-byte euro sign.
        assert_eq!(redact_secret("ab€defghi"), "ab€d...fghi");
        assert_eq!(redact_secret("ключ-секрет"), "ключ...крет");
        assert_eq!(redact_secret("密密密密"), "****");
    }

    #[test]
    fn cooldown_window_excludes_then_releases() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let mut key = ApiKey::new("k");
        assert!(key.usable_at(now));
        key.cooldown_until = Some(now + Duration::seconds(60));
        assert!(!key.usable_at(now));
        assert!(key.usable_at(now + Duration::seconds(60)));
    }

    #[test]
    fn invalid_is_never_usable() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let mut key = ApiKey::new("k");
        key.validity = Validity::Invalid;
        assert!(!key.usable_at(now));
    }

    #[test]
    fn persisted_layout_is_camel_case() {
        let key = ApiKey {
            secret: "s".into(),
            validity: Validity::Valid,
            is_preferred: true,
            cooldown_until: None,
        };
        let json = serde_json::to_value(&key).expect("key should serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "secret": "s",
                "validity": "valid",
                "isPreferred": true
            })
        );
    }
}
