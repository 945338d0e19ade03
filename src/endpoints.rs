//! Maps UI selections onto upstream endpoint paths and query parameters.
//!
//! Paths are relative to the upstream origin and carry no `.json` suffix;
//! the gateway appends that when forwarding. Community and user names are
//! percent-encoded into a single path segment.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const PROXY_PREFIX: &str = "/api/reddit";

/// Sentinel community meaning "the front page", and sentinel time window
/// meaning "no time restriction".
pub const ALL: &str = "all";

const NAME_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseSelectionError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! selection_enum {
    ($name:ident, $label:literal, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseSelectionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseSelectionError {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

selection_enum!(PostFilter, "post filter", default = Hot, {
    Hot => "hot",
    New => "new",
    Top => "top",
    Rising => "rising",
    Best => "best",
});

selection_enum!(TimeWindow, "time window", default = Day, {
    Hour => "hour",
    Day => "day",
    Week => "week",
    Month => "month",
    Year => "year",
    All => "all",
});

selection_enum!(CommunityFilter, "community filter", default = Popular, {
    Popular => "popular",
    New => "new",
    Gold => "gold",
    Default => "default",
});

selection_enum!(SearchType, "search type", default = Posts, {
    Posts => "posts",
    Subreddits => "subreddits",
    Users => "users",
});

impl SearchType {
    /// Upstream vocabulary for the `type` parameter. The UI names are plural;
    /// dropping the trailing `s` gives the upstream name for this closed set,
    /// except posts, which the upstream calls links.
    pub fn upstream_type(&self) -> &'static str {
        match self {
            SearchType::Posts => "link",
            SearchType::Subreddits => "subreddit",
            SearchType::Users => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Endpoint {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path on the same-origin proxy that serves this endpoint.
    pub fn proxied_path(&self) -> String {
        format!("{}{}", PROXY_PREFIX, self.path)
    }
}

/// Community and user names upstream are limited to ASCII letters, digits,
/// `-` and `_`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn segment(name: &str) -> String {
    utf8_percent_encode(name, NAME_SEGMENT).to_string()
}

pub fn listing(filter: PostFilter, time: TimeWindow, community: &str, limit: u32) -> Endpoint {
    let community = community.trim().trim_start_matches("r/");
    let path = if community.is_empty() || community == ALL {
        format!("/{}", filter)
    } else {
        format!("/r/{}/{}", segment(community), filter)
    };
    let endpoint = Endpoint::new(path).param("limit", limit);
    if filter == PostFilter::Top && time != TimeWindow::All {
        endpoint.param("t", time)
    } else {
        endpoint
    }
}

pub fn communities(filter: CommunityFilter, limit: u32) -> Endpoint {
    Endpoint::new(format!("/subreddits/{}", filter)).param("limit", limit)
}

pub fn search(query: &str, kind: SearchType, limit: u32) -> Endpoint {
    Endpoint::new("/search")
        .param("q", query)
        .param("type", kind.upstream_type())
        .param("limit", limit)
}

pub fn user_about(username: &str) -> Endpoint {
    Endpoint::new(format!("/user/{}/about", segment(username)))
}

pub fn user_submitted(username: &str, limit: u32) -> Endpoint {
    Endpoint::new(format!("/user/{}/submitted", segment(username))).param("limit", limit)
}

/// Permalinks are already upstream paths.
pub fn post_detail(permalink: &str) -> Endpoint {
    Endpoint::new(permalink)
}
