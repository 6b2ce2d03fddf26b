//! Provider, controller, and policy enums for sift.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! and `as_str()` returns the same representation used in SQL storage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// External service a linked account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Bugzilla,
    Github,
    Jira,
    Google,
}

impl Provider {
    pub const ALL: &'static [Self] = &[Self::Bugzilla, Self::Github, Self::Jira, Self::Google];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bugzilla => "bugzilla",
            Self::Github => "github",
            Self::Jira => "jira",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Who owns the lifecycle of a core item.
///
/// ```text
/// manual       : user created or detached, manual "mark done" enabled
/// service      : tracked through one remote entity (pasted URL, straggler)
/// service_list : sourced by a saved list scan
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    Manual,
    Service,
    ServiceList,
}

impl Controller {
    /// Whether the UI may offer a manual "mark done" action.
    ///
    /// Service controlled items take their done state from upstream.
    #[must_use]
    pub const fn allows_manual_done(self) -> bool {
        match self {
            Self::Manual => true,
            Self::Service | Self::ServiceList => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Service => "service",
            Self::ServiceList => "service_list",
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MissingPolicy
// ---------------------------------------------------------------------------

/// What happens to a tracked item once its remote entity is confirmed gone.
///
/// Each provider declares its own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Remove both the shadow entity and the core item.
    Delete,
    /// Remove the shadow entity and hand the core item to the user.
    Detach,
}

impl MissingPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Detach => "detach",
        }
    }
}

impl fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_as_str_matches_serde() {
        for provider in Provider::ALL {
            let json = serde_json::to_string(provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.as_str()));
        }
    }

    #[test]
    fn only_manual_items_allow_manual_done() {
        assert!(Controller::Manual.allows_manual_done());
        assert!(!Controller::Service.allows_manual_done());
        assert!(!Controller::ServiceList.allows_manual_done());
    }

    #[test]
    fn controller_serializes_snake_case() {
        let json = serde_json::to_string(&Controller::ServiceList).unwrap();
        assert_eq!(json, "\"service_list\"");
    }
}
