//! HTML fragments for listing items and the panels that hold them.
//!
//! Every piece of upstream text is escaped here. Renderers decode the raw
//! payload themselves, so a malformed item degrades to its fallback
//! fragment instead of failing the whole listing.

use std::fmt;

use tracing::debug;

use crate::format::{
    escape_html, format_age, format_number, sanitize_upstream_url, truncate_text,
    DEFAULT_TRUNCATE,
};
use crate::reddit::{self, Account, Comment, Community, ItemKind, Post, Thing, DEFAULT_ICON_URL};

const DESCRIPTION_LIMIT: usize = 100;
const DELETED: &str = "[deleted]";

pub const SEARCH_PROMPT: &str = "Enter your search query above to get started";
pub const USER_PROMPT: &str = "Enter a username to view their profile and posts";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fragment {
    fn from(value: String) -> Self {
        Fragment(value)
    }
}

/// Outcome of rendering one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Ok(Fragment),
    Fallback(Fragment),
}

impl Rendered {
    pub fn fragment(&self) -> &Fragment {
        match self {
            Rendered::Ok(fragment) | Rendered::Fallback(fragment) => fragment,
        }
    }

    pub fn into_fragment(self) -> Fragment {
        match self {
            Rendered::Ok(fragment) | Rendered::Fallback(fragment) => fragment,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Rendered::Fallback(_))
    }
}

fn decode<T: serde::de::DeserializeOwned>(thing: &Thing) -> Option<T> {
    match thing.decode::<T>() {
        Ok(record) => Some(record),
        Err(err) => {
            debug!(kind = %thing.kind, error = %err, "item payload did not decode");
            None
        }
    }
}

fn text_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(fallback)
}

/// Icon URL, or the default icon when the upstream value is missing, empty
/// or the literal string `"null"`.
pub fn icon_url(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(url) if !url.is_empty() && url != "null" => sanitize_upstream_url(url),
        _ => DEFAULT_ICON_URL.to_string(),
    }
}

fn avatar(url: &str, alt: &str) -> String {
    format!(
        r#"<img src="{src}" alt="{alt}" class="avatar" onerror="this.onerror=null;this.src='{default}'">"#,
        src = escape_html(url),
        alt = escape_html(alt),
        default = DEFAULT_ICON_URL,
    )
}

fn stat(icon: &str, value: &str) -> String {
    format!(
        r#"<span class="post-stat"><i class="fas fa-{icon}"></i> {value}</span>"#,
        value = escape_html(value)
    )
}

fn post_stats(post: &Post) -> String {
    format!(
        r#"<div class="post-stats">{}{}{}</div>"#,
        stat("arrow-up", &format_number(post.score.unwrap_or(0))),
        stat("comment", &format_number(post.num_comments.unwrap_or(0))),
        stat("clock", &format_age(post.created_utc)),
    )
}

fn post_header(post: &Post) -> String {
    format!(
        r#"<div class="post-header"><span class="post-subreddit">r/{}</span> <span class="post-author">by u/{}</span></div>"#,
        escape_html(text_or(&post.subreddit, "unknown")),
        escape_html(text_or(&post.author, DELETED)),
    )
}

pub fn render_post(thing: &Thing) -> Rendered {
    let Some(post) = decode::<Post>(thing) else {
        return Rendered::Fallback(
            r#"<div class="post-card"><h3 class="post-title">Unable to load post</h3></div>"#
                .to_string()
                .into(),
        );
    };

    let mut html = String::new();
    match post.permalink.as_deref().filter(|p| !p.is_empty()) {
        Some(permalink) => html.push_str(&format!(
            r#"<div class="post-card" data-action="post" data-permalink="{}">"#,
            escape_html(permalink)
        )),
        None => html.push_str(r#"<div class="post-card">"#),
    }
    html.push_str(&post_header(&post));
    html.push_str(&format!(
        r#"<h3 class="post-title">{}</h3>"#,
        escape_html(text_or(&post.title, "Untitled"))
    ));
    if post.is_self_post() {
        let excerpt = truncate_text(post.selftext.as_deref(), DEFAULT_TRUNCATE);
        if !excerpt.is_empty() {
            html.push_str(&format!(
                r#"<p class="post-content">{}</p>"#,
                escape_html(&excerpt)
            ));
        }
    }
    if let Some(url) = post.image_url() {
        html.push_str(&format!(
            r#"<img src="{}" alt="Post image" class="post-image">"#,
            escape_html(&sanitize_upstream_url(url))
        ));
    }
    html.push_str(&post_stats(&post));
    html.push_str("</div>");
    Rendered::Ok(html.into())
}

pub fn render_community(thing: &Thing) -> Rendered {
    let Some(community) = decode::<Community>(thing) else {
        return Rendered::Fallback(
            format!(
                r#"<div class="subreddit-card"><div class="subreddit-header"><div class="subreddit-icon">{}</div><div class="subreddit-info"><h3>r/Unknown</h3><p>Unable to load subreddit information</p></div></div></div>"#,
                avatar(DEFAULT_ICON_URL, "Unknown")
            )
            .into(),
        );
    };

    let name = text_or(&community.display_name, "Unknown");
    let prefixed = match community
        .display_name_prefixed
        .as_deref()
        .filter(|v| !v.trim().is_empty())
    {
        Some(prefixed) => prefixed.to_string(),
        None => format!("r/{}", name),
    };
    let description = truncate_text(
        Some(text_or(&community.public_description, "No description available")),
        DESCRIPTION_LIMIT,
    );

    let html = format!(
        r#"<div class="subreddit-card" data-action="subreddit" data-name="{name_attr}"><div class="subreddit-header"><div class="subreddit-icon">{icon}</div><div class="subreddit-info"><h3>{prefixed}</h3><p>{description}</p></div></div><div class="subreddit-stats">{members}{online}</div></div>"#,
        name_attr = escape_html(name),
        icon = avatar(&icon_url(community.icon_img.as_deref()), name),
        prefixed = escape_html(&prefixed),
        description = escape_html(&description),
        members = stat(
            "users",
            &format!("{} members", format_number(community.subscribers.unwrap_or(0)))
        ),
        online = stat(
            "circle",
            &format!("{} online", format_number(community.active_user_count.unwrap_or(0)))
        ),
    );
    Rendered::Ok(html.into())
}

fn karma_stats(account: &Account) -> String {
    format!(
        r#"<div class="user-stat"><div class="user-stat-value">{}</div><div class="user-stat-label">Post Karma</div></div><div class="user-stat"><div class="user-stat-value">{}</div><div class="user-stat-label">Comment Karma</div></div>"#,
        format_number(account.link_karma.unwrap_or(0)),
        format_number(account.comment_karma.unwrap_or(0)),
    )
}

pub fn render_user(thing: &Thing) -> Rendered {
    let Some(account) = decode::<Account>(thing) else {
        return Rendered::Fallback(
            format!(
                r#"<div class="user-card"><div class="user-header"><div class="user-avatar">{}</div><div class="user-details"><h3>u/{}</h3></div></div></div>"#,
                avatar(DEFAULT_ICON_URL, DELETED),
                DELETED
            )
            .into(),
        );
    };

    let name = text_or(&account.name, DELETED);
    let html = format!(
        r#"<div class="user-card" data-action="user" data-name="{name}"><div class="user-header"><div class="user-avatar">{avatar}</div><div class="user-details"><h3>u/{name}</h3><div class="user-stats">{stats}</div></div></div></div>"#,
        name = escape_html(name),
        avatar = avatar(&icon_url(account.icon_img.as_deref()), name),
        stats = karma_stats(&account),
    );
    Rendered::Ok(html.into())
}

/// `more` placeholders in comment trees render nothing.
pub fn render_comment(thing: &Thing) -> Option<Rendered> {
    if thing.item_kind() == ItemKind::More {
        return None;
    }
    let Some(comment) = decode::<Comment>(thing) else {
        return Some(Rendered::Fallback(
            format!(
                r#"<div class="comment"><div class="comment-body">{}</div></div>"#,
                DELETED
            )
            .into(),
        ));
    };

    let html = format!(
        r#"<div class="comment"><div class="comment-header"><span class="comment-author">u/{author}</span> <span class="comment-score">{score} points</span> <span class="comment-time">{age}</span></div><div class="comment-body">{body}</div></div>"#,
        author = escape_html(text_or(&comment.author, DELETED)),
        score = format_number(comment.score.unwrap_or(0)),
        age = escape_html(&format_age(comment.created_utc)),
        body = escape_html(text_or(&comment.body, DELETED)),
    );
    Some(Rendered::Ok(html.into()))
}

/// Dispatches on the item's kind tag.
pub fn render_item(thing: &Thing) -> Option<Rendered> {
    match thing.item_kind() {
        ItemKind::Post => Some(render_post(thing)),
        ItemKind::Community => Some(render_community(thing)),
        ItemKind::User => Some(render_user(thing)),
        ItemKind::Comment | ItemKind::More => render_comment(thing),
        ItemKind::Other(kind) => {
            debug!(%kind, "skipping unsupported listing item");
            None
        }
    }
}

/// Renders every item of a listing, concatenated in order.
pub fn render_listing(listing: &reddit::Listing) -> Fragment {
    let mut html = String::new();
    for rendered in listing.children.iter().filter_map(render_item) {
        html.push_str(rendered.fragment().as_str());
    }
    html.into()
}

pub fn grid(class: &str, items: &Fragment) -> Fragment {
    format!(r#"<div class="{class}">{items}</div>"#).into()
}

pub fn loading() -> Fragment {
    r#"<div class="loading"><i class="fas fa-spinner fa-spin"></i><p>Loading...</p></div>"#
        .to_string()
        .into()
}

pub fn error(message: &str) -> Fragment {
    format!(
        r#"<div class="error"><i class="fas fa-exclamation-triangle"></i><p>{}</p></div>"#,
        escape_html(message)
    )
    .into()
}

pub fn placeholder(icon: &str, message: &str) -> Fragment {
    format!(
        r#"<div class="search-placeholder"><i class="fas fa-{icon}"></i><p>{}</p></div>"#,
        escape_html(message)
    )
    .into()
}

pub fn search_prompt() -> Fragment {
    placeholder("search", SEARCH_PROMPT)
}

pub fn user_prompt() -> Fragment {
    placeholder("user", USER_PROMPT)
}

pub fn section_header(level: u8, title: &str, extra: &str) -> Fragment {
    format!(
        r#"<div class="section-header"><h{level}>{}</h{level}>{extra}</div>"#,
        escape_html(title)
    )
    .into()
}

pub fn back_to_posts_button() -> String {
    r#"<button class="btn btn-primary" data-action="navigate" data-section="posts">Back to All Posts</button>"#
        .to_string()
}

/// Profile header for `/user/{name}/about`, followed by the submissions.
pub fn render_profile(username: &str, account: &Account, submissions: &reddit::Listing) -> Fragment {
    let mut html = format!(
        r#"<div class="user-info"><div class="user-header"><div class="user-avatar">{avatar}</div><div class="user-details"><h3>u/{name}</h3><div class="user-stats">{karma}<div class="user-stat"><div class="user-stat-value">{since}</div><div class="user-stat-label">Member Since</div></div></div></div></div></div>"#,
        avatar = avatar(&icon_url(account.icon_img.as_deref()), username),
        name = escape_html(username),
        karma = karma_stats(account),
        since = escape_html(&format_age(account.created_utc)),
    );
    if submissions.is_empty() {
        html.push_str(r#"<p class="empty">No posts found for this user.</p>"#);
    } else {
        html.push_str(grid("posts-grid", &render_listing(submissions)).as_str());
    }
    html.into()
}

/// Full view of a single post with the first `comment_limit` top-level
/// comments.
pub fn render_post_detail(detail: &reddit::PostDetail, comment_limit: usize) -> Fragment {
    let post: Post = decode(&detail.post).unwrap_or_default();

    let mut html = String::from(r#"<div class="post-details">"#);
    html.push_str(&post_header(&post));
    html.push_str(&format!(
        r#"<h2 class="post-title">{}</h2>"#,
        escape_html(text_or(&post.title, "Untitled"))
    ));
    if let Some(selftext) = post.selftext.as_deref().filter(|t| !t.is_empty()) {
        html.push_str(&format!(
            r#"<div class="post-content">{}</div>"#,
            escape_html(selftext)
        ));
    }
    if let Some(url) = post.url.as_deref().filter(|u| !u.is_empty()) {
        if !post.is_self_post() {
            html.push_str(&format!(
                r#"<a href="{}" target="_blank" rel="noreferrer" class="post-link">View Original Content</a>"#,
                escape_html(&sanitize_upstream_url(url))
            ));
        }
    }
    html.push_str(&post_stats(&post));

    let comments: String = detail
        .comments
        .children
        .iter()
        .take(comment_limit)
        .filter_map(render_comment)
        .map(Rendered::into_fragment)
        .map(Fragment::into_string)
        .collect();
    html.push_str(&format!(
        r#"<div class="comments-section"><h3>Comments ({})</h3><div class="comments-list">{}</div></div>"#,
        detail.comments.len(),
        comments
    ));
    html.push_str("</div>");
    html.into()
}
