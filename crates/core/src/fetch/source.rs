//! Source site detection.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSite {
    Youtube,
    Reddit,
    Twitter,
    Unknown,
}

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];
const REDDIT_HOSTS: &[&str] = &["reddit.com", "redd.it"];
const TWITTER_HOSTS: &[&str] = &["twitter.com", "x.com", "t.co", "twimg.com"];

impl SourceSite {
    pub fn detect(url: &str) -> Self {
        let Some(host) = host_of(url) else {
            return Self::Unknown;
        };
        let matches = |hosts: &[&str]| {
            hosts
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
        };

        if matches(YOUTUBE_HOSTS) {
            Self::Youtube
        } else if matches(REDDIT_HOSTS) {
            Self::Reddit
        } else if matches(TWITTER_HOSTS) {
            Self::Twitter
        } else {
            Self::Unknown
        }
    }

    /// Sites whose separate streams must be merged into mp4 to play back.
    pub fn merges_to_mp4(&self) -> bool {
        matches!(self, Self::Reddit | Self::Twitter)
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Youtube => "youtube",
            Self::Reddit => "reddit",
            Self::Twitter => "twitter",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Lowercased host of an http(s) URL, without port or credentials.
pub fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(
            SourceSite::detect("https://www.youtube.com/watch?v=abc"),
            SourceSite::Youtube
        );
        assert_eq!(SourceSite::detect("https://youtu.be/abc"), SourceSite::Youtube);
        assert_eq!(
            SourceSite::detect("https://old.reddit.com/r/videos/comments/x"),
            SourceSite::Reddit
        );
        assert_eq!(
            SourceSite::detect("https://x.com/user/status/1"),
            SourceSite::Twitter
        );
        assert_eq!(
            SourceSite::detect("https://mobile.twitter.com/user/status/1"),
            SourceSite::Twitter
        );
        assert_eq!(SourceSite::detect("https://t.co/xyz"), SourceSite::Twitter);
        assert_eq!(
            SourceSite::detect("https://vimeo.com/12345"),
            SourceSite::Unknown
        );
    }

    #[test]
    fn test_lookalike_hosts_are_unknown() {
        assert_eq!(
            SourceSite::detect("https://notx.com/video"),
            SourceSite::Unknown
        );
        assert_eq!(
            SourceSite::detect("https://x.com.evil.net/video"),
            SourceSite::Unknown
        );
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("HTTPS://User@Example.COM:8080/path").as_deref(),
            Some("example.com")
        );
        assert_eq!(host_of("ftp://example.com"), None);
        assert_eq!(host_of("https:///nohost"), None);
    }

    #[test]
    fn test_merges_to_mp4() {
        assert!(SourceSite::Reddit.merges_to_mp4());
        assert!(SourceSite::Twitter.merges_to_mp4());
        assert!(!SourceSite::Youtube.merges_to_mp4());
    }
}
