use serde::{Deserialize, Serialize};

/// Classification rule set for one probe target.
///
/// Evaluation order is fixed: `must_not` first, then `captcha_keywords` with
/// the optional `fallback`, then the baseline conditions. Baseline fields are
/// flattened so the wire shape stays `{status, title, body, ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(flatten)]
    pub baseline: BaselineExpect,

    /// Case-insensitive substrings in title or body that signal a
    /// human-verification challenge
    #[serde(default)]
    pub captcha_keywords: Vec<String>,

    /// Secondary status/title pair that must hold for a challenged page to
    /// count as tolerable; absent means any challenge is tolerated
    #[serde(default)]
    pub fallback: Option<FallbackExpect>,

    /// Hard disqualifiers, any single hit forces the unusable verdict
    #[serde(default)]
    pub must_not: MustNot,
}

/// Conditions a clean page must satisfy. Absent conditions hold trivially.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineExpect {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Secondary expectation checked when a challenge keyword is present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackExpect {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Explicit disqualifiers. Each list is independent; a status in `status`,
/// or any `title`/`body` substring present, rejects the page outright. A
/// status code not listed here never disqualifies on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MustNot {
    #[serde(default)]
    pub status: Vec<u16>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub body: Vec<String>,
}

impl MustNot {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.title.is_empty() && self.body.is_empty()
    }
}
