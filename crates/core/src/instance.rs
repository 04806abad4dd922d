use std::env;
use std::fmt::{Display, Formatter};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity token for one running process instance.
///
/// Generated once at process start and passed explicitly into every service
/// that needs to identify this instance; stable for the process lifetime and
/// globally unique across instances (host, pid, start time, random suffix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates a fresh instance identity for this process.
    #[must_use]
    pub fn generate() -> Self {
        let host = env::var("HOSTNAME")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "host".to_owned());
        let started_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let suffix = Uuid::new_v4().simple().to_string();

        Self(format!(
            "{host}-{pid}-{started_millis}-{short}",
            pid = process::id(),
            short = &suffix[..8]
        ))
    }

    /// Creates an instance identity from an existing token value.
    #[must_use]
    pub fn from_token(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for InstanceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceId;

    #[test]
    fn generated_ids_are_distinct() {
        let first = InstanceId::generate();
        let second = InstanceId::generate();
        assert_ne!(first, second);
    }

    #[test]
    fn generated_id_is_not_empty() {
        let id = InstanceId::generate();
        assert!(!id.as_str().is_empty());
    }
}
