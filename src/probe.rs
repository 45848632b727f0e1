//! Sandbox URL probing — DNS resolution and redirect-chain inspection.
//!
//! Every suspendable step returns an explicit [`ProbeOutcome`] branch instead
//! of an implicit catch-all, so absorption vs. propagation is visible at the
//! call site: findings are penalized, timeouts and network noise are
//! inconclusive, private targets are skipped without comment.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::{Host, Url};

/// A reportable probe finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFinding {
    /// Severity contributed to the technical score (deduplicated per reason).
    pub severity: u8,
    /// Penalty dedup key, e.g. `"Unresolvable Domain"`.
    pub reason: String,
    /// Detail interpolated into the report text.
    pub detail: String,
    /// Where the redirect chain ended, when it was followed.
    pub final_url: Option<String>,
}

/// Outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Nothing suspicious observed.
    Clean,
    /// A penalizable observation.
    Finding(ProbeFinding),
    /// The probe hit its deadline. Inconclusive, never penalized.
    Timeout,
    /// Unrelated network failure. Inconclusive, never penalized.
    Inconclusive,
    /// Local/private-network target. Never probed, never reported (anti-SSRF).
    Skipped,
}

/// Sandbox probe collaborator. Implementations apply their own network
/// timeouts and must never panic past this boundary.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Probe backed by plain HEAD requests with manual redirect following.
pub struct HttpProbe {
    client: reqwest::Client,
    redirect_limit: usize,
}

impl HttpProbe {
    /// Build a probe. `timeout` bounds each network request; `redirect_limit`
    /// is the hop count above which a chain is reported.
    pub fn new(timeout: Duration, redirect_limit: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            redirect_limit,
        })
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn probe(&self, raw: &str) -> ProbeOutcome {
        let Ok(parsed) = Url::parse(raw) else {
            return ProbeOutcome::Inconclusive;
        };

        if is_private_target(&parsed) {
            debug!(url = %raw, "Skipping private-network target");
            return ProbeOutcome::Skipped;
        }

        let Some(host) = parsed.host_str() else {
            return ProbeOutcome::Inconclusive;
        };
        let port = parsed.port_or_known_default().unwrap_or(80);

        // DNS first: an unresolvable domain is a finding in its own right and
        // saves a doomed HTTP round trip.
        match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => {
                let addrs: Vec<_> = addrs.collect();
                if !addrs.is_empty() && addrs.iter().all(|a| ip_is_private(a.ip())) {
                    debug!(url = %raw, "All resolved addresses are private, skipping");
                    return ProbeOutcome::Skipped;
                }
            }
            Err(_) => {
                return ProbeOutcome::Finding(ProbeFinding {
                    severity: 30,
                    reason: "Unresolvable Domain".to_string(),
                    detail: host.to_string(),
                    final_url: None,
                });
            }
        }

        self.walk_redirects(parsed).await
    }
}

impl HttpProbe {
    /// Follow the redirect chain hop by hop, counting depth.
    async fn walk_redirects(&self, start: Url) -> ProbeOutcome {
        let mut current = start;
        let mut hops = 0usize;

        loop {
            let response = match self.client.head(current.clone()).send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return ProbeOutcome::Timeout,
                Err(_) => return ProbeOutcome::Inconclusive,
            };

            if !response.status().is_redirection() {
                return ProbeOutcome::Clean;
            }

            let Some(next) = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| current.join(loc).ok())
            else {
                // Redirect without a usable Location — nothing to follow.
                return ProbeOutcome::Clean;
            };

            if is_private_target(&next) {
                return ProbeOutcome::Skipped;
            }

            hops += 1;
            if hops > self.redirect_limit {
                return ProbeOutcome::Finding(ProbeFinding {
                    severity: 50,
                    reason: "Excessive Redirects".to_string(),
                    detail: format!("Depth: {hops}"),
                    final_url: Some(next.to_string()),
                });
            }

            current = next;
        }
    }
}

/// True when a URL targets the local host or a private network by literal
/// address or well-known local name.
pub fn is_private_target(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip_is_private(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => ip_is_private(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let d = domain.to_lowercase();
            d == "localhost" || d.ends_with(".localhost") || d.ends_with(".internal")
        }
        None => true,
    }
}

/// Loopback, RFC1918, link-local, CGNAT, ULA, or unspecified.
fn ip_is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                // CGNAT 100.64.0.0/10
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // ULA fc00::/7
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // Link-local fe80::/10
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn localhost_is_private() {
        assert!(is_private_target(&url("http://localhost/x")));
        assert!(is_private_target(&url("http://admin.localhost/x")));
        assert!(is_private_target(&url("http://db.cluster.internal/x")));
    }

    #[test]
    fn loopback_and_rfc1918_literals_are_private() {
        assert!(is_private_target(&url("http://127.0.0.1/")));
        assert!(is_private_target(&url("http://10.0.0.8/")));
        assert!(is_private_target(&url("http://192.168.1.1/admin")));
        assert!(is_private_target(&url("http://172.16.4.2/")));
        assert!(is_private_target(&url("http://[::1]/")));
        assert!(is_private_target(&url("http://[fd00::1]/")));
    }

    #[test]
    fn public_hosts_are_not_private() {
        assert!(!is_private_target(&url("http://example.com/")));
        assert!(!is_private_target(&url("http://8.8.8.8/")));
        assert!(!is_private_target(&url("http://[2001:db8::1]/")));
    }

    #[test]
    fn cgnat_range_is_private() {
        assert!(ip_is_private("100.64.0.1".parse().unwrap()));
        assert!(ip_is_private("100.127.255.254".parse().unwrap()));
        assert!(!ip_is_private("100.128.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn probe_skips_private_target_without_network() {
        let probe = HttpProbe::new(Duration::from_millis(100), 4).unwrap();
        assert_eq!(
            probe.probe("http://127.0.0.1:1/never-touched").await,
            ProbeOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn probe_rejects_garbage_as_inconclusive() {
        let probe = HttpProbe::new(Duration::from_millis(100), 4).unwrap();
        assert_eq!(probe.probe("http://").await, ProbeOutcome::Inconclusive);
    }
}
