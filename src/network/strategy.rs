//! Mapping from request URLs to caching strategies.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde::Serialize;

use super::request::OutboundRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CacheFirst => "cache_first",
            Self::NetworkFirst => "network_first",
            Self::StaleWhileRevalidate => "stale_while_revalidate",
            Self::NetworkOnly => "network_only",
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    strategy: Strategy,
}

/// Ordered URL rules; the first matching pattern wins.
#[derive(Debug, Clone, Default)]
pub struct StrategyRules {
    rules: Vec<Rule>,
    fallback: Option<Strategy>,
}

static DEFAULT_RULES: Lazy<StrategyRules> = Lazy::new(|| {
    let table: [(&str, Strategy); 6] = [
        (r"/auth/|/admin(?:/|$)|/analytics", Strategy::NetworkOnly),
        (r"/rest/v\d+/rpc/", Strategy::NetworkOnly),
        (
            r"\.(?:js|mjs|css|woff2?|ttf|otf|ico|png|jpe?g|gif|webp|avif|svg)(?:\?.*)?$",
            Strategy::CacheFirst,
        ),
        (r"/rest/v\d+/|/api/", Strategy::NetworkFirst),
        (
            r"\.(?:json|webmanifest|xml|txt)(?:\?.*)?$",
            Strategy::StaleWhileRevalidate,
        ),
        (
            r"^https?://[^/]+(?:/[^.?#]*)?(?:\?[^#]*)?$",
            Strategy::StaleWhileRevalidate,
        ),
    ];

    table
        .into_iter()
        .filter_map(|(pattern, strategy)| Some((Regex::new(pattern).ok()?, strategy)))
        .fold(StrategyRules::new(), |rules, (pattern, strategy)| {
            rules.push(pattern, strategy)
        })
});

impl StrategyRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules for the content site.
    pub fn standard() -> Self {
        DEFAULT_RULES.clone()
    }

    pub fn with_rule(self, pattern: &str, strategy: Strategy) -> Result<Self, regex::Error> {
        Ok(self.push(Regex::new(pattern)?, strategy))
    }

    /// Strategy used when no rule matches. Defaults to network-first.
    pub fn with_fallback(mut self, strategy: Strategy) -> Self {
        self.fallback = Some(strategy);
        self
    }

    fn push(mut self, pattern: Regex, strategy: Strategy) -> Self {
        self.rules.push(Rule { pattern, strategy });
        self
    }

    pub fn classify(&self, url: &url::Url) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(url.as_str()))
            .map(|rule| rule.strategy)
            .unwrap_or(self.fallback.unwrap_or(Strategy::NetworkFirst))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Only plain GET requests over http(s) go through the cache.
pub fn should_intercept(request: &OutboundRequest) -> bool {
    request.method == Method::GET && matches!(request.url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn classify(url: &str) -> Strategy {
        StrategyRules::standard().classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn standard_rules_cover_asset_kinds() {
        assert_eq!(
            classify("https://cdn.example.com/app.3f9a.js"),
            Strategy::CacheFirst
        );
        assert_eq!(
            classify("https://img.example.com/covers/a.webp?w=640"),
            Strategy::CacheFirst
        );
        assert_eq!(
            classify("https://db.example.com/rest/v1/items?select=*"),
            Strategy::NetworkFirst
        );
        assert_eq!(
            classify("https://example.com/guides/field-kit"),
            Strategy::StaleWhileRevalidate
        );
        assert_eq!(
            classify("https://example.com/auth/callback"),
            Strategy::NetworkOnly
        );
    }

    #[test]
    fn built_in_patterns_all_compile() {
        assert_eq!(StrategyRules::standard().len(), 6);
    }

    #[test]
    fn network_only_wins_over_later_rules() {
        assert_eq!(
            classify("https://db.example.com/rest/v1/rpc/increment_views"),
            Strategy::NetworkOnly
        );
    }

    #[test]
    fn unmatched_urls_use_fallback() {
        let rules = StrategyRules::new()
            .with_rule(r"\.css$", Strategy::CacheFirst)
            .unwrap();
        let url = Url::parse("https://example.com/data.bin").unwrap();
        assert_eq!(rules.classify(&url), Strategy::NetworkFirst);

        let rules = rules.with_fallback(Strategy::NetworkOnly);
        assert_eq!(rules.classify(&url), Strategy::NetworkOnly);
    }

    #[test]
    fn only_http_gets_are_intercepted() {
        let url = Url::parse("https://example.com/a.css").unwrap();
        assert!(should_intercept(&OutboundRequest::get(url.clone())));
        assert!(!should_intercept(&OutboundRequest::new(
            Method::POST,
            url.clone()
        )));
        assert!(!should_intercept(&OutboundRequest::new(Method::HEAD, url)));

        let ftp = Url::parse("ftp://example.com/a.css").unwrap();
        assert!(!should_intercept(&OutboundRequest::get(ftp)));
    }
}
