use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit severity. Drives retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Long-term retention, never trimmed
    Critical,
    #[default]
    Important,
    /// Trimmed aggressively (logins, logouts)
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can be recorded in the audit log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. "role" in "role.created"
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Per-action override; deletions are always critical.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Probe(Uuid);

    impl Loggable for Probe {
        fn entity_type() -> &'static str { "probe" }
        fn subject_id(&self) -> Uuid { self.0 }
    }

    #[test]
    fn test_deleted_is_critical_by_default() {
        let probe = Probe(Uuid::nil());
        assert_eq!(probe.severity_for_action("deleted"), Severity::Critical);
        assert_eq!(probe.severity_for_action("created"), Severity::Important);
        assert_eq!(Severity::Noise.as_str(), "noise");
    }
}
