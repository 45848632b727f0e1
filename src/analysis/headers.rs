//! Shared header normalization for all detectors.
//!
//! Historical detector variants each re-parsed raw header strings with ad-hoc
//! regexes. This module is the single normalization step: a typed
//! [`AuthResults`] record plus the domain-extraction helpers every detector
//! shares.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SPF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"spf\s*=\s*([a-z]+)").unwrap());
static DKIM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"dkim\s*=\s*([a-z]+)").unwrap());
static DMARC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"dmarc\s*=\s*([a-z]+)").unwrap());
static EMAIL_DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9.-]+)").unwrap());

/// Parsed status of the three email-authentication protocols.
///
/// A missing token defaults to `"pass"` — fail-open, a documented trust
/// assumption: an absent Authentication-Results header must not penalize
/// legitimate mail from providers that do not stamp one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResults {
    pub spf: String,
    pub dkim: String,
    pub dmarc: String,
}

impl AuthResults {
    /// Parse an `Authentication-Results` header value.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let token = |re: &Regex| {
            re.captures(&lower)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| "pass".to_string())
        };
        Self {
            spf: token(&SPF_RE),
            dkim: token(&DKIM_RE),
            dmarc: token(&DMARC_RE),
        }
    }
}

impl Default for AuthResults {
    fn default() -> Self {
        Self::parse("")
    }
}

/// Extract the domain from an address like `Name <user@example.com>`.
///
/// Lowercased, trailing `>` stripped. Empty string if no `@domain` is found.
pub fn domain_from_email(addr: &str) -> String {
    EMAIL_DOMAIN_RE
        .captures(addr)
        .map(|c| c[1].trim_end_matches('>').trim_end_matches('.').to_lowercase())
        .unwrap_or_default()
}

/// Extract the host from a URL, lowercased. Empty string if unparseable.
pub fn domain_from_url(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// True when `candidate` equals `org_domain` or is one of its subdomains.
pub fn is_same_org(candidate: &str, org_domain: &str) -> bool {
    if candidate.is_empty() || org_domain.is_empty() {
        return false;
    }
    candidate == org_domain || candidate.ends_with(&format!(".{org_domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_tokens() {
        let auth = AuthResults::parse("spf=pass dkim=fail dmarc=quarantine");
        assert_eq!(auth.spf, "pass");
        assert_eq!(auth.dkim, "fail");
        assert_eq!(auth.dmarc, "quarantine");
    }

    #[test]
    fn tolerates_spacing_and_case() {
        let auth = AuthResults::parse("SPF = Fail; DKIM=pass; DMARC  =  none");
        assert_eq!(auth.spf, "fail");
        assert_eq!(auth.dkim, "pass");
        assert_eq!(auth.dmarc, "none");
    }

    #[test]
    fn missing_tokens_default_to_pass() {
        let auth = AuthResults::parse("mx.example.com; dkim=fail");
        assert_eq!(auth.spf, "pass");
        assert_eq!(auth.dkim, "fail");
        assert_eq!(auth.dmarc, "pass");
    }

    #[test]
    fn empty_header_is_all_pass() {
        let auth = AuthResults::default();
        assert_eq!(auth.spf, "pass");
        assert_eq!(auth.dkim, "pass");
        assert_eq!(auth.dmarc, "pass");
    }

    #[test]
    fn domain_from_display_name_address() {
        assert_eq!(
            domain_from_email("Alice Smith <alice@Example.COM>"),
            "example.com"
        );
        assert_eq!(domain_from_email("bob@corp.io"), "corp.io");
        assert_eq!(domain_from_email("no-at-sign-here"), "");
    }

    #[test]
    fn domain_from_url_host() {
        assert_eq!(domain_from_url("https://Mail.Example.com/a/b"), "mail.example.com");
        assert_eq!(domain_from_url("not a url"), "");
    }

    #[test]
    fn same_org_accepts_subdomains() {
        assert!(is_same_org("example.com", "example.com"));
        assert!(is_same_org("mail.example.com", "example.com"));
        assert!(!is_same_org("evil.com", "example.com"));
        // Suffix match must be on a label boundary
        assert!(!is_same_org("notexample.com", "example.com"));
        assert!(!is_same_org("", "example.com"));
    }
}
