//! Client identity rotation
//!
//! Every outbound request gets a user agent drawn from a pool built once from
//! platform tokens crossed with browser templates, plus the content negotiation
//! and referer headers the target site expects.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};

use crate::domain::SourceKind;
use crate::domain::constants::{douban, netease};

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; WOW64",
    "Windows NT 6.1; Win64; x64",
    "Windows NT 6.3; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 13_4",
    "Macintosh; Intel Mac OS X 14_2_1",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

const CHROME_VERSIONS: &[&str] = &[
    "114.0.5735.199",
    "116.0.5845.188",
    "118.0.5993.117",
    "120.0.6099.129",
    "122.0.6261.112",
    "124.0.6367.207",
    "126.0.6478.127",
];

const FIREFOX_VERSIONS: &[&str] = &["115.0", "118.0", "121.0", "123.0", "125.0"];

const EDGE_VERSIONS: &[&str] = &["118.0.2088.76", "120.0.2210.91", "122.0.2365.92"];

/// Headers sent with every request to one source, apart from the user agent
#[derive(Debug, Clone, Copy)]
pub struct HeaderProfile {
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub referer: &'static str,
}

impl HeaderProfile {
    pub fn for_source(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Netease => Self {
                accept: netease::ACCEPT,
                accept_language: netease::ACCEPT_LANGUAGE,
                referer: netease::REFERER,
            },
            SourceKind::Douban => Self {
                accept: douban::ACCEPT,
                accept_language: douban::ACCEPT_LANGUAGE,
                referer: douban::REFERER,
            },
        }
    }
}

/// Read-only pool of user agents; safe to share behind an `Arc`
#[derive(Debug, Clone)]
pub struct IdentityRotator {
    user_agents: Vec<HeaderValue>,
}

impl IdentityRotator {
    pub fn new() -> Self {
        let mut agents = Vec::new();
        for platform in PLATFORMS {
            for version in CHROME_VERSIONS {
                agents.push(format!(
                    "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version} Safari/537.36"
                ));
            }
            for version in FIREFOX_VERSIONS {
                agents.push(format!(
                    "Mozilla/5.0 ({platform}; rv:{version}) Gecko/20100101 Firefox/{version}"
                ));
            }
            for version in EDGE_VERSIONS {
                // Edge reports the matching Chromium major with a zeroed build
                let major = version.split('.').next().unwrap_or(version);
                agents.push(format!(
                    "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36 Edg/{version}"
                ));
            }
        }

        let user_agents = agents
            .into_iter()
            .filter_map(|agent| HeaderValue::from_str(&agent).ok())
            .collect();
        Self { user_agents }
    }

    pub fn pool_size(&self) -> usize {
        self.user_agents.len()
    }

    /// Picks a random user agent from the pool
    pub fn user_agent(&self) -> HeaderValue {
        match self.user_agents.len() {
            0 => HeaderValue::from_static("Mozilla/5.0"),
            len => self.user_agents[fastrand::usize(..len)].clone(),
        }
    }

    /// Full header set for one request to `kind`
    pub fn headers_for(&self, kind: SourceKind) -> HeaderMap {
        let profile = HeaderProfile::for_source(kind);
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent());
        headers.insert(ACCEPT, HeaderValue::from_static(profile.accept));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(profile.accept_language),
        );
        headers.insert(REFERER, HeaderValue::from_static(profile.referer));
        headers
    }
}

impl Default for IdentityRotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pool_is_the_full_cross_product() {
        let rotator = IdentityRotator::new();
        let per_platform = CHROME_VERSIONS.len() + FIREFOX_VERSIONS.len() + EDGE_VERSIONS.len();
        assert_eq!(rotator.pool_size(), PLATFORMS.len() * per_platform);

        let distinct: HashSet<_> = rotator.user_agents.iter().collect();
        assert_eq!(distinct.len(), rotator.pool_size());
    }

    #[test]
    fn headers_follow_source_profile() {
        let rotator = IdentityRotator::new();

        let headers = rotator.headers_for(SourceKind::Douban);
        assert_eq!(headers[REFERER], douban::REFERER);
        assert_eq!(headers[ACCEPT], douban::ACCEPT);
        assert!(headers.contains_key(USER_AGENT));

        let headers = rotator.headers_for(SourceKind::Netease);
        assert_eq!(headers[REFERER], netease::REFERER);
        assert_eq!(headers[ACCEPT_LANGUAGE], netease::ACCEPT_LANGUAGE);
    }

    #[test]
    fn user_agent_varies_across_calls() {
        let rotator = IdentityRotator::new();
        let seen: HashSet<_> = (0..50).map(|_| rotator.user_agent()).collect();
        assert!(seen.len() > 1);
    }
}
