//! Selection state and the pure transitions that drive the viewer.
//!
//! The browser owns no hidden globals: every request carries the current
//! [`SelectionState`], an [`Action`] is applied to it, and the resulting
//! [`Effect`] tells the pipeline what to fetch and render.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::endpoints::{
    self, CommunityFilter, ParseSelectionError, PostFilter, SearchType, TimeWindow,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown action: {0:?}")]
    UnknownAction(String),
    #[error("unknown section: {0:?}")]
    UnknownSection(String),
    #[error("action {action:?} requires parameter {param:?}")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },
    #[error("invalid {param}: {value:?}")]
    InvalidParam { param: &'static str, value: String },
    #[error(transparent)]
    Selection(#[from] ParseSelectionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Posts,
    Subreddits,
    Search,
    Users,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Posts => "posts",
            Section::Subreddits => "subreddits",
            Section::Search => "search",
            Section::Users => "users",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posts" => Ok(Section::Posts),
            "subreddits" => Ok(Section::Subreddits),
            "search" => Ok(Section::Search),
            "users" => Ok(Section::Users),
            other => Err(SessionError::UnknownSection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub section: Section,
    pub posts_filter: PostFilter,
    pub posts_time: TimeWindow,
    pub subreddits_filter: CommunityFilter,
}

const KEY_SECTION: &str = "section";
const KEY_POSTS_FILTER: &str = "filter";
const KEY_POSTS_TIME: &str = "time";
const KEY_SUBREDDITS_FILTER: &str = "sfilter";

impl SelectionState {
    /// Reads the selection from request parameters; absent keys keep their
    /// defaults, unknown values are rejected.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, SessionError> {
        let mut state = SelectionState::default();
        if let Some(value) = params.get(KEY_SECTION) {
            state.section = value.parse()?;
        }
        if let Some(value) = params.get(KEY_POSTS_FILTER) {
            state.posts_filter = value.parse()?;
        }
        if let Some(value) = params.get(KEY_POSTS_TIME) {
            state.posts_time = value.parse()?;
        }
        if let Some(value) = params.get(KEY_SUBREDDITS_FILTER) {
            state.subreddits_filter = value.parse()?;
        }
        Ok(state)
    }

    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(KEY_SECTION, self.section.as_str())
            .append_pair(KEY_POSTS_FILTER, self.posts_filter.as_str())
            .append_pair(KEY_POSTS_TIME, self.posts_time.as_str())
            .append_pair(KEY_SUBREDDITS_FILTER, self.subreddits_filter.as_str())
            .finish()
    }

    pub fn apply(self, action: Action) -> Transition {
        let mut state = self;
        let effect = match action {
            Action::Navigate(section) => {
                state.section = section;
                match section {
                    Section::Posts => state.load_posts(),
                    Section::Subreddits => state.load_communities(),
                    Section::Search => Effect::SearchPrompt,
                    Section::Users => Effect::UserPrompt,
                }
            }
            Action::SetPostsFilter(filter) => {
                state.posts_filter = filter;
                state.load_posts()
            }
            Action::SetPostsTime(time) => {
                state.posts_time = time;
                state.load_posts()
            }
            Action::SetSubredditsFilter(filter) => {
                state.subreddits_filter = filter;
                state.load_communities()
            }
            Action::FilterPosts(query) => match non_blank(&query) {
                Some(query) => Effect::QuickSearch {
                    query,
                    kind: SearchType::Posts,
                },
                None => state.load_posts(),
            },
            Action::FilterSubreddits(query) => match non_blank(&query) {
                Some(query) => Effect::QuickSearch {
                    query,
                    kind: SearchType::Subreddits,
                },
                None => state.load_communities(),
            },
            Action::Search { query, kind } => match non_blank(&query) {
                Some(query) => Effect::Search { query, kind },
                None => Effect::SearchPrompt,
            },
            Action::LookupUser(name) => match non_blank(&name) {
                Some(username) => Effect::UserProfile { username },
                None => Effect::UserPrompt,
            },
            Action::OpenPost(permalink) => Effect::PostDetail { permalink },
            Action::OpenSubreddit(name) => {
                state.section = Section::Posts;
                Effect::CommunityPosts { name }
            }
        };
        Transition { state, effect }
    }

    fn load_posts(&self) -> Effect {
        Effect::LoadPosts {
            filter: self.posts_filter,
            time: self.posts_time,
        }
    }

    fn load_communities(&self) -> Effect {
        Effect::LoadCommunities {
            filter: self.subreddits_filter,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(Section),
    SetPostsFilter(PostFilter),
    SetPostsTime(TimeWindow),
    SetSubredditsFilter(CommunityFilter),
    FilterPosts(String),
    FilterSubreddits(String),
    Search { query: String, kind: SearchType },
    LookupUser(String),
    OpenPost(String),
    OpenSubreddit(String),
}

impl Action {
    /// Decodes a fragment route name plus its parameters. Parameter names
    /// match the `data-*` attributes emitted by the renderers.
    pub fn parse(name: &str, params: &HashMap<String, String>) -> Result<Self, SessionError> {
        let get = |action: &'static str, param: &'static str| {
            params
                .get(param)
                .cloned()
                .ok_or(SessionError::MissingParam { action, param })
        };
        let text = |param: &str| params.get(param).cloned().unwrap_or_default();

        let action = match name {
            "navigate" => Action::Navigate(get("navigate", "section")?.parse()?),
            "posts-filter" => Action::SetPostsFilter(get("posts-filter", "value")?.parse()?),
            "posts-time" => Action::SetPostsTime(get("posts-time", "value")?.parse()?),
            "subreddits-filter" => {
                Action::SetSubredditsFilter(get("subreddits-filter", "value")?.parse()?)
            }
            "posts-search" => Action::FilterPosts(text("q")),
            "subreddits-search" => Action::FilterSubreddits(text("q")),
            "search" => Action::Search {
                query: text("q"),
                kind: match params.get("type") {
                    Some(kind) => kind.parse()?,
                    None => SearchType::default(),
                },
            },
            "user" => {
                let name = text("name");
                let trimmed = name.trim();
                if !trimmed.is_empty() && !endpoints::is_valid_name(trimmed) {
                    return Err(invalid("name", trimmed));
                }
                Action::LookupUser(name)
            }
            "post" => {
                let permalink = get("post", "permalink")?;
                if !permalink.starts_with('/') || permalink.contains(['?', '#', '\\']) {
                    return Err(invalid("permalink", &permalink));
                }
                Action::OpenPost(permalink)
            }
            "subreddit" => {
                let name = get("subreddit", "name")?;
                if !endpoints::is_valid_name(name.trim().trim_start_matches("r/")) {
                    return Err(invalid("name", &name));
                }
                Action::OpenSubreddit(name)
            }
            other => return Err(SessionError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

fn invalid(param: &'static str, value: &str) -> SessionError {
    SessionError::InvalidParam {
        param,
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadPosts { filter: PostFilter, time: TimeWindow },
    LoadCommunities { filter: CommunityFilter },
    QuickSearch { query: String, kind: SearchType },
    Search { query: String, kind: SearchType },
    SearchPrompt,
    UserProfile { username: String },
    UserPrompt,
    PostDetail { permalink: String },
    CommunityPosts { name: String },
}

impl Effect {
    pub fn issues_request(&self) -> bool {
        !matches!(self, Effect::SearchPrompt | Effect::UserPrompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SelectionState,
    pub effect: Effect,
}
