//! Pure quality classification for probe outcomes.
//!
//! Precedence is fixed and exhaustive: an outright attempt failure, then the
//! hard disqualifiers, then challenge keywords with their optional fallback,
//! then the baseline conditions. Reordering the disqualifier and keyword
//! steps would let a challenge page that also matches a disqualifier slip
//! through as tolerable, so the order is part of the contract.

use crate::models::{Expectation, FetchResult, PageSnapshot, ProbeOutcome, Quality};

/// Which classification step decided the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictRule {
    AttemptFailed,
    MustNotStatus,
    MustNotTitle,
    MustNotBody,
    CaptchaFallback,
    CaptchaFallbackMissed,
    CaptchaKeyword,
    Baseline,
    BaselineMismatch,
}

impl VerdictRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictRule::AttemptFailed => "attempt_failed",
            VerdictRule::MustNotStatus => "must_not_status",
            VerdictRule::MustNotTitle => "must_not_title",
            VerdictRule::MustNotBody => "must_not_body",
            VerdictRule::CaptchaFallback => "captcha_fallback",
            VerdictRule::CaptchaFallbackMissed => "captcha_fallback_missed",
            VerdictRule::CaptchaKeyword => "captcha_keyword",
            VerdictRule::Baseline => "baseline",
            VerdictRule::BaselineMismatch => "baseline_mismatch",
        }
    }
}

impl std::fmt::Display for VerdictRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification result: the quality level, the rule that fired, and a
/// human-readable reason carried into state and alerts
#[derive(Debug, Clone, PartialEq)]
pub struct QualityVerdict {
    pub quality: Quality,
    pub rule: VerdictRule,
    pub reason: String,
}

impl QualityVerdict {
    fn new(quality: Quality, rule: VerdictRule, reason: impl Into<String>) -> Self {
        QualityVerdict {
            quality,
            rule,
            reason: reason.into(),
        }
    }
}

/// Classify one probe outcome against the target's expectation rules.
pub fn classify(outcome: &ProbeOutcome, expect: &Expectation) -> QualityVerdict {
    let page = match &outcome.fetch {
        FetchResult::Failed { reason } => {
            return QualityVerdict::new(Quality::Unusable, VerdictRule::AttemptFailed, reason);
        }
        FetchResult::Page(page) => page,
    };

    let title = page.title.to_lowercase();
    let body = page.body.to_lowercase();

    if let Some(verdict) = check_must_not(page, &title, &body, expect) {
        return verdict;
    }

    if let Some(keyword) = matched_keyword(&title, &body, &expect.captcha_keywords) {
        return check_challenge(page, &title, keyword, expect);
    }

    check_baseline(page, &title, &body, expect)
}

/// Hard disqualifiers. Each list is independent; the first hit wins. A status
/// code absent from the list never disqualifies on its own.
fn check_must_not(
    page: &PageSnapshot,
    title: &str,
    body: &str,
    expect: &Expectation,
) -> Option<QualityVerdict> {
    let must_not = &expect.must_not;

    if must_not.status.contains(&page.status) {
        return Some(QualityVerdict::new(
            Quality::Unusable,
            VerdictRule::MustNotStatus,
            format!("disqualifying status {}", page.status),
        ));
    }

    if let Some(needle) = first_substring_hit(title, &must_not.title) {
        return Some(QualityVerdict::new(
            Quality::Unusable,
            VerdictRule::MustNotTitle,
            format!("disqualifying title match: {:?}", needle),
        ));
    }

    if let Some(needle) = first_substring_hit(body, &must_not.body) {
        return Some(QualityVerdict::new(
            Quality::Unusable,
            VerdictRule::MustNotBody,
            format!("disqualifying body match: {:?}", needle),
        ));
    }

    None
}

/// A challenge keyword was found. With a fallback expectation configured the
/// page must also satisfy it to be tolerated; without one, keyword presence
/// alone is tolerable.
fn check_challenge(
    page: &PageSnapshot,
    title: &str,
    keyword: &str,
    expect: &Expectation,
) -> QualityVerdict {
    let Some(fallback) = &expect.fallback else {
        return QualityVerdict::new(
            Quality::Tolerable,
            VerdictRule::CaptchaKeyword,
            format!("challenge keyword {:?} present", keyword),
        );
    };

    if let Some(status) = fallback.status {
        if page.status != status {
            return QualityVerdict::new(
                Quality::Unusable,
                VerdictRule::CaptchaFallbackMissed,
                format!(
                    "challenge keyword {:?} present, fallback not satisfied: status {}, expected {}",
                    keyword, page.status, status
                ),
            );
        }
    }

    if let Some(want) = &fallback.title {
        if !title.contains(&want.to_lowercase()) {
            return QualityVerdict::new(
                Quality::Unusable,
                VerdictRule::CaptchaFallbackMissed,
                format!(
                    "challenge keyword {:?} present, fallback not satisfied: title missing {:?}",
                    keyword, want
                ),
            );
        }
    }

    QualityVerdict::new(
        Quality::Tolerable,
        VerdictRule::CaptchaFallback,
        format!("challenge keyword {:?} present, fallback holds", keyword),
    )
}

/// Baseline conditions: every configured condition must hold for optimal.
fn check_baseline(
    page: &PageSnapshot,
    title: &str,
    body: &str,
    expect: &Expectation,
) -> QualityVerdict {
    let baseline = &expect.baseline;

    if let Some(status) = baseline.status {
        if page.status != status {
            return QualityVerdict::new(
                Quality::Unusable,
                VerdictRule::BaselineMismatch,
                format!("status {}, expected {}", page.status, status),
            );
        }
    }

    if let Some(want) = &baseline.title {
        if !title.contains(&want.to_lowercase()) {
            return QualityVerdict::new(
                Quality::Unusable,
                VerdictRule::BaselineMismatch,
                format!("title missing required substring {:?}", want),
            );
        }
    }

    if let Some(want) = &baseline.body {
        if !body.contains(&want.to_lowercase()) {
            return QualityVerdict::new(
                Quality::Unusable,
                VerdictRule::BaselineMismatch,
                format!("body missing required substring {:?}", want),
            );
        }
    }

    QualityVerdict::new(
        Quality::Optimal,
        VerdictRule::Baseline,
        "baseline expectation satisfied",
    )
}

/// First keyword found in title or body, both already lowercased
fn matched_keyword<'a>(title: &str, body: &str, keywords: &'a [String]) -> Option<&'a str> {
    keywords.iter().map(String::as_str).find(|kw| {
        let kw = kw.to_lowercase();
        title.contains(&kw) || body.contains(&kw)
    })
}

fn first_substring_hit<'a>(haystack: &str, needles: &'a [String]) -> Option<&'a str> {
    needles
        .iter()
        .map(String::as_str)
        .find(|needle| haystack.contains(&needle.to_lowercase()))
}
