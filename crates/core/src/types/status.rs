//! Status enums for notifications.

use serde::{Deserialize, Serialize};

/// Severity of a user-facing notification.
///
/// Determines how a notification is presented; it has no effect on its
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Lowercase name, as used in serialized form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a notification that is still in the active set.
///
/// ```text
/// Pending ──entry delay──▶ Visible ──duration / dismiss──▶ Hiding ──exit delay──▶ (removed)
///    └──────────────────────dismiss───────────────────────▶ Hiding
/// ```
///
/// Removal is not a variant: a removed notification is no longer in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Created, entry animation not yet started.
    #[default]
    Pending,
    /// Fully shown.
    Visible,
    /// Exit animation running; removal is scheduled.
    Hiding,
}

impl Visibility {
    /// Whether the entry timer may still move this notification to `Visible`.
    #[must_use]
    pub const fn can_reveal(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether a dismissal still has an effect.
    #[must_use]
    pub const fn can_hide(self) -> bool {
        !matches!(self, Self::Hiding)
    }
}
