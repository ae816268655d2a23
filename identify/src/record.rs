use std::fmt;

use serde::{Deserialize, Serialize};

/// Who an enrolled template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which finger a template was enrolled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerSlot {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }
}

impl fmt::Display for FingerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enrolled template as delivered by the upstream record store.
///
/// A multi-finger pool carries one record per (identity, finger) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: String,

    pub role: Role,

    /// Base64 template text, possibly with a `data:image/...;base64,` prefix.
    #[serde(default)]
    pub fingerprint: Option<String>,

    #[serde(default, alias = "fingerType")]
    pub finger_type: Option<FingerSlot>,

    /// Set upstream when the stored template failed an integrity check.
    #[serde(default, alias = "isCorrupted")]
    pub is_corrupted: bool,

    #[serde(default, alias = "fingerprintId")]
    pub fingerprint_id: Option<String>,
}

impl EnrollmentRecord {
    pub fn new(id: impl Into<String>, role: Role, fingerprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            fingerprint: Some(fingerprint.into()),
            finger_type: None,
            is_corrupted: false,
            fingerprint_id: None,
        }
    }

    /// A record with no template enrolled yet.
    pub fn without_template(id: impl Into<String>, role: Role) -> Self {
        Self {
            fingerprint: None,
            ..Self::new(id, role, String::new())
        }
    }

    pub fn with_finger(mut self, finger: FingerSlot) -> Self {
        self.finger_type = Some(finger);
        self
    }

    pub fn with_fingerprint_id(mut self, fingerprint_id: impl Into<String>) -> Self {
        self.fingerprint_id = Some(fingerprint_id.into());
        self
    }

    pub fn flagged_corrupt(mut self) -> Self {
        self.is_corrupted = true;
        self
    }

    /// Returns the template text, or `None` when absent or blank.
    pub fn template(&self) -> Option<&str> {
        self.fingerprint.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            role: self.role,
            id: self.id.clone(),
            finger: self.finger_type,
        }
    }
}

/// Identifies one cached feature set.
///
/// Compared structurally, so identities containing `:` cannot collide with
/// a different (id, finger) split. [`Display`](fmt::Display) is for logs only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub role: Role,
    pub id: String,
    pub finger: Option<FingerSlot>,
}

impl CacheKey {
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
            finger: None,
        }
    }

    pub fn with_finger(mut self, finger: FingerSlot) -> Self {
        self.finger = Some(finger);
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)?;
        if let Some(finger) = self.finger {
            write!(f, ":{finger}")?;
        }
        Ok(())
    }
}

/// Outcome of one identification.
///
/// "No match" is a normal value: `id` is `None` and `confidence` is 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub id: Option<String>,

    /// Score in `[0, 100]`.
    pub confidence: f32,

    #[serde(rename = "finger_type")]
    pub finger: Option<FingerSlot>,

    pub fingerprint_id: Option<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            id: None,
            confidence: 0.0,
            finger: None,
            fingerprint_id: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.id.is_some()
    }
}

impl Default for MatchResult {
    fn default() -> Self {
        Self::no_match()
    }
}
