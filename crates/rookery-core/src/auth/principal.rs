use serde::{Deserialize, Serialize};

/// Identity the backend reports for the current session.
///
/// The `role` field is the backend's raw label and is never interpreted
/// directly; `auth::roles` normalizes it at every decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Principal {
    /// Name for list views and log lines
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.email.as_deref().unwrap_or("(unknown)")
        } else {
            &self.name
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.display_name(), self.id)
    }
}
