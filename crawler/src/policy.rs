use std::time::Duration;

/// Parsed robots-style crawl rules. Directives are collected from every
/// block whose `User-agent` names us (or `*`); anything malformed is
/// ignored, so a broken policy degrades to "allow everything".
#[derive(Debug, Clone, Default)]
pub struct CrawlPolicy {
    allows: Vec<String>,
    disallows: Vec<String>,
    delay: Option<Duration>,
}

impl CrawlPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse the line-oriented directive format: case-insensitive
    /// `User-agent` / `Disallow` / `Allow` / `Crawl-delay` fields, `#`
    /// comments, unknown fields skipped. A block applies when its agent
    /// value is `*` or a substring of `user_agent`.
    pub fn parse(text: &str, user_agent: &str) -> Self {
        let agent = user_agent.to_lowercase();
        let mut active = false;
        let mut policy = CrawlPolicy::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match field.trim().to_lowercase().as_str() {
                "user-agent" => {
                    let v = value.to_lowercase();
                    active = v == "*" || agent.contains(&v);
                }
                "disallow" if active => {
                    if !value.is_empty() {
                        policy.disallows.push(value.to_lowercase());
                    }
                }
                "allow" if active => {
                    if !value.is_empty() {
                        policy.allows.push(value.to_lowercase());
                    }
                }
                "crawl-delay" if active => {
                    if let Ok(secs) = value.parse::<f64>() {
                        if secs >= 0.0 {
                            policy.delay = Some(Duration::from_millis((secs * 1000.0) as u64));
                        }
                    }
                }
                other => {
                    tracing::debug!(field = other, "ignoring unknown policy field");
                }
            }
        }
        policy
    }

    /// Permitted unless a Disallow pattern matches and no Allow pattern at
    /// least as specific (longer or equal) also matches.
    pub fn is_allowed(&self, address: &str) -> bool {
        let addr = address.to_lowercase();
        let best_disallow = self
            .disallows
            .iter()
            .filter(|p| matches_pattern(&addr, p))
            .map(|p| p.len())
            .max();
        let Some(disallow_len) = best_disallow else {
            return true;
        };
        self.allows
            .iter()
            .any(|p| matches_pattern(&addr, p) && p.len() >= disallow_len)
    }

    /// A declared Crawl-delay is a floor on the configured pacing, never a
    /// reduction.
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.delay
    }
}

/// Simple glob: `*` matches any substring, a pattern without `*` matches as
/// a plain substring.
fn matches_pattern(text: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if !pattern.contains('*') {
        return text.contains(pattern);
    }
    let mut rest = text;
    for part in pattern.split('*') {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = "websearch-bot/0.1";

    #[test]
    fn default_allows_everything() {
        let policy = CrawlPolicy::allow_all();
        assert!(policy.is_allowed("/anything/at/all"));
        assert_eq!(policy.crawl_delay(), None);
    }

    #[test]
    fn disallow_blocks_matching_paths() {
        let policy = CrawlPolicy::parse("User-agent: *\nDisallow: /private", AGENT);
        assert!(!policy.is_allowed("/private/page.rw"));
        assert!(policy.is_allowed("/public/page.rw"));
    }

    #[test]
    fn allow_overrides_when_more_specific() {
        let text = "User-agent: *\nDisallow: /private\nAllow: /private/ok";
        let policy = CrawlPolicy::parse(text, AGENT);
        assert!(!policy.is_allowed("/private/secret.rw"));
        assert!(policy.is_allowed("/private/ok/page.rw"));
    }

    #[test]
    fn wildcard_patterns_match_any_substring() {
        let policy = CrawlPolicy::parse("User-agent: *\nDisallow: /tmp*draft", AGENT);
        assert!(!policy.is_allowed("/tmp/2024/draft.rw"));
        assert!(policy.is_allowed("/tmp/2024/final.rw"));
    }

    #[test]
    fn blocks_for_other_agents_do_not_apply() {
        let text = "User-agent: otherbot\nDisallow: /\n\nUser-agent: websearch-bot\nDisallow: /secret";
        let policy = CrawlPolicy::parse(text, AGENT);
        assert!(policy.is_allowed("/open/page.rw"));
        assert!(!policy.is_allowed("/secret/page.rw"));
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let text = "# site policy\nUser-agent: *\nSitemap: /map.rw\nDisallow: /hidden";
        let policy = CrawlPolicy::parse(text, AGENT);
        assert!(!policy.is_allowed("/hidden/page.rw"));
    }

    #[test]
    fn crawl_delay_is_parsed_in_seconds() {
        let policy = CrawlPolicy::parse("User-agent: *\nCrawl-delay: 1.5", AGENT);
        assert_eq!(policy.crawl_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn malformed_lines_degrade_to_allow() {
        let policy = CrawlPolicy::parse("?? not a directive ??\nDisallow /oops", AGENT);
        assert!(policy.is_allowed("/oops/page.rw"));
    }
}
