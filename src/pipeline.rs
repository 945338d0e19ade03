//! Runs the effect of a UI action: picks the endpoint, fetches it through a
//! [`ListingSource`] and renders the panel that should replace the current
//! one.
//!
//! Failures never escape as errors. They are logged and replaced by a short
//! static message in the affected panel. Nothing is retried, and an empty
//! listing is final: no follow-up request is made.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::data::ListingSource;
use crate::debounce::Debouncer;
use crate::endpoints::{self, CommunityFilter, Endpoint, PostFilter, SearchType, TimeWindow};
use crate::reddit::{self, Listing, PostDetail};
use crate::render::{self, Fragment};
use crate::session::{Action, Effect, SelectionState, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Posts,
    Subreddits,
    Search,
    User,
    PostDetail,
}

impl Panel {
    /// Id of the element the fragment replaces.
    pub fn element_id(&self) -> &'static str {
        match self {
            Panel::Posts => "posts-container",
            Panel::Subreddits => "subreddits-container",
            Panel::Search => "search-results",
            Panel::User => "user-container",
            Panel::PostDetail => "modal-body",
        }
    }

    pub fn for_effect(effect: &Effect) -> Panel {
        match effect {
            Effect::LoadPosts { .. } | Effect::CommunityPosts { .. } => Panel::Posts,
            Effect::LoadCommunities { .. } => Panel::Subreddits,
            Effect::QuickSearch { kind, .. } => match kind {
                SearchType::Posts => Panel::Posts,
                SearchType::Subreddits => Panel::Subreddits,
                SearchType::Users => Panel::Search,
            },
            Effect::Search { .. } | Effect::SearchPrompt => Panel::Search,
            Effect::UserProfile { .. } | Effect::UserPrompt => Panel::User,
            Effect::PostDetail { .. } => Panel::PostDetail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelUpdate {
    pub panel: Panel,
    pub html: Fragment,
}

impl PanelUpdate {
    fn new(panel: Panel, html: Fragment) -> Self {
        Self { panel, html }
    }
}

pub struct Pipeline<S> {
    source: S,
    page_size: u32,
    comment_limit: usize,
    debounce: Duration,
}

impl<S: ListingSource> Pipeline<S> {
    pub fn new(source: S, config: &ClientConfig) -> Self {
        Self {
            source,
            page_size: config.page_size,
            comment_limit: config.comment_limit,
            debounce: config.debounce,
        }
    }

    /// Applies `action` to `state` and renders the resulting panel.
    pub fn dispatch(&self, state: SelectionState, action: Action) -> (SelectionState, PanelUpdate) {
        let Transition { state, effect } = state.apply(action);
        (state, self.run(effect))
    }

    /// Loading indicator for effects that issue a request.
    pub fn pending(effect: &Effect) -> Option<PanelUpdate> {
        effect
            .issues_request()
            .then(|| PanelUpdate::new(Panel::for_effect(effect), render::loading()))
    }

    /// Applies `action` without running its effect; yields the loading
    /// update the caller should show while the real request is in flight.
    pub fn preview(
        &self,
        state: SelectionState,
        action: Action,
    ) -> (SelectionState, Option<PanelUpdate>) {
        let Transition { state, effect } = state.apply(action);
        (state, Self::pending(&effect))
    }

    /// Quiet period for search-as-you-type input.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn run(&self, effect: Effect) -> PanelUpdate {
        let panel = Panel::for_effect(&effect);
        let html = match effect {
            Effect::LoadPosts { filter, time } => self.load_posts(filter, time),
            Effect::LoadCommunities { filter } => self.load_communities(filter),
            Effect::QuickSearch { query, kind } => self.quick_search(&query, kind),
            Effect::Search { query, kind } => self.search(&query, kind),
            Effect::SearchPrompt => render::search_prompt(),
            Effect::UserProfile { username } => self.user_profile(&username),
            Effect::UserPrompt => render::user_prompt(),
            Effect::PostDetail { permalink } => self.post_detail(&permalink),
            Effect::CommunityPosts { name } => self.community_posts(&name),
        };
        PanelUpdate::new(panel, html)
    }

    fn listing(&self, endpoint: &Endpoint) -> Result<Listing> {
        let value = self.source.fetch(endpoint)?;
        Ok(Listing::from_value(value))
    }

    fn load_posts(&self, filter: PostFilter, time: TimeWindow) -> Fragment {
        let endpoint = endpoints::listing(filter, time, endpoints::ALL, self.page_size);
        match self.listing(&endpoint) {
            Ok(listing) if listing.is_empty() => render::error("No posts found"),
            Ok(listing) => render::render_listing(&listing),
            Err(err) => {
                log_failure("posts", &endpoint, &err);
                render::error("Failed to load posts. Please try again.")
            }
        }
    }

    fn load_communities(&self, filter: CommunityFilter) -> Fragment {
        let endpoint = endpoints::communities(filter, self.page_size);
        match self.listing(&endpoint) {
            Ok(listing) if listing.is_empty() => render::error("No subreddits found"),
            Ok(listing) => {
                debug!(count = listing.len(), "loaded subreddits");
                render::render_listing(&listing)
            }
            Err(err) => {
                log_failure("subreddits", &endpoint, &err);
                render::error("Failed to load subreddits. Please try again.")
            }
        }
    }

    /// Search-as-you-type inside the posts or subreddits panel.
    fn quick_search(&self, query: &str, kind: SearchType) -> Fragment {
        let endpoint = endpoints::search(query, kind, self.page_size);
        match self.listing(&endpoint) {
            Ok(listing) if listing.is_empty() => match kind {
                SearchType::Posts => render::error("No posts found"),
                SearchType::Subreddits => render::error("No subreddits found"),
                SearchType::Users => no_results(query),
            },
            Ok(listing) => render::render_listing(&listing),
            Err(err) => {
                log_failure("quick search", &endpoint, &err);
                render::error("Search failed")
            }
        }
    }

    fn search(&self, query: &str, kind: SearchType) -> Fragment {
        let endpoint = endpoints::search(query, kind, self.page_size);
        match self.listing(&endpoint) {
            Ok(listing) if listing.is_empty() => no_results(query),
            Ok(listing) => {
                let header = render::section_header(
                    3,
                    &format!("Search Results for \"{}\" ({} results)", query, listing.len()),
                    "",
                );
                let grid_class = match kind {
                    SearchType::Posts => "posts-grid",
                    SearchType::Subreddits => "subreddits-grid",
                    SearchType::Users => "users-grid",
                };
                let grid = render::grid(grid_class, &render::render_listing(&listing));
                format!("{header}{grid}").into()
            }
            Err(err) => {
                log_failure("search", &endpoint, &err);
                render::error("Search failed. Please try again.")
            }
        }
    }

    /// Profile metadata and submissions are fetched concurrently; both must
    /// succeed for anything but the error message to render.
    fn user_profile(&self, username: &str) -> Fragment {
        let about = endpoints::user_about(username);
        let submitted = endpoints::user_submitted(username, self.page_size);

        let (about_result, submitted_result) = thread::scope(|scope| {
            let about_handle = scope.spawn(|| self.source.fetch(&about));
            let submitted_handle = scope.spawn(|| self.source.fetch(&submitted));
            (join_fetch(about_handle), join_fetch(submitted_handle))
        });

        let profile = about_result.and_then(|about_value| {
            let account = reddit::account_from_value(about_value)?;
            let submissions = Listing::from_value(submitted_result?);
            Ok((account, submissions))
        });

        match profile {
            Ok((account, submissions)) => render::render_profile(username, &account, &submissions),
            Err(err) => {
                log_failure("user profile", &about, &err);
                render::error(
                    "Failed to load user profile. Please check the username and try again.",
                )
            }
        }
    }

    fn post_detail(&self, permalink: &str) -> Fragment {
        let endpoint = endpoints::post_detail(permalink);
        let detail = self
            .source
            .fetch(&endpoint)
            .and_then(PostDetail::from_value);
        match detail {
            Ok(detail) => render::render_post_detail(&detail, self.comment_limit),
            Err(err) => {
                log_failure("post detail", &endpoint, &err);
                render::error("Failed to load post details.")
            }
        }
    }

    /// A community's hot posts, reached by clicking a community card.
    fn community_posts(&self, name: &str) -> Fragment {
        let endpoint = endpoints::listing(
            PostFilter::Hot,
            TimeWindow::Day,
            name,
            self.page_size,
        );
        match self.listing(&endpoint) {
            Ok(listing) if listing.is_empty() => render::error("No posts found in this subreddit"),
            Ok(listing) => {
                let header = render::section_header(
                    2,
                    &format!("Posts from r/{}", name),
                    &render::back_to_posts_button(),
                );
                let grid = render::grid("posts-grid", &render::render_listing(&listing));
                format!("{header}{grid}").into()
            }
            Err(err) => {
                log_failure("subreddit posts", &endpoint, &err);
                render::error("Failed to load subreddit posts")
            }
        }
    }
}

impl<S: ListingSource + 'static> Pipeline<S> {
    /// Wires a debouncer with the configured quiet period in front of the
    /// pipeline for search-as-you-type input. Each settled action yields a
    /// loading update (when it fetches) followed by the rendered panel,
    /// together with the new selection.
    pub fn live(
        self: Arc<Self>,
    ) -> (
        Debouncer<(SelectionState, Action)>,
        Receiver<(SelectionState, PanelUpdate)>,
    ) {
        let (tx, rx) = unbounded();
        let quiet = self.debounce;
        let debouncer = Debouncer::new(quiet, move |(state, action): (SelectionState, Action)| {
            let Transition { state, effect } = state.apply(action);
            if let Some(loading) = Self::pending(&effect) {
                let _ = tx.send((state, loading));
            }
            let update = self.run(effect);
            let _ = tx.send((state, update));
        });
        (debouncer, rx)
    }
}

fn join_fetch(
    handle: thread::ScopedJoinHandle<'_, Result<serde_json::Value>>,
) -> Result<serde_json::Value> {
    handle
        .join()
        .unwrap_or_else(|_| Err(anyhow!("fetch worker panicked")))
}

fn no_results(query: &str) -> Fragment {
    render::placeholder("search", &format!("No results found for \"{}\"", query))
}

fn log_failure(what: &str, endpoint: &Endpoint, err: &anyhow::Error) {
    warn!(path = %endpoint.path, error = %format!("{err:#}"), "failed to load {what}");
}
