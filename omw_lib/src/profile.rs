use serde::{Deserialize, Serialize};

/// The person sharing their location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
}

impl Profile {
    pub fn new(first_name: impl Into<String>, profession: Option<String>) -> Self {
        Self {
            first_name: first_name.into(),
            profession,
        }
    }

    pub fn has_first_name(&self) -> bool {
        !self.first_name.trim().is_empty()
    }

    /// Profession with blank values treated as absent.
    pub fn profession(&self) -> Option<&str> {
        self.profession
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[test]
fn blank_profession_is_absent() {
    let profile = Profile::new("Sam", Some("  ".into()));
    assert_eq!(profile.profession(), None);
    assert!(profile.has_first_name());
    assert!(!Profile::new(" ", None).has_first_name());
}
