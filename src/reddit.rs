//! Read models for the upstream listing API.
//!
//! Listings are decoded leniently: an envelope with no `data` or no
//! `children` is an empty listing, and each child keeps its payload as raw
//! JSON until a renderer decodes it into the record for its kind. A broken
//! child never takes its siblings down with it.

use anyhow::{anyhow, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com/";
pub const DEFAULT_USER_AGENT: &str = "RedInsight/1.0 (Educational Project)";
pub const DEFAULT_ICON_URL: &str =
    "https://www.redditstatic.com/desktop2x/img/favicon/android-icon-192x192.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Post,
    Community,
    User,
    Comment,
    More,
    Other(String),
}

impl ItemKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "t3" => ItemKind::Post,
            "t5" => ItemKind::Community,
            "t2" => ItemKind::User,
            "t1" => ItemKind::Comment,
            "more" => ItemKind::More,
            other => ItemKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default, deserialize_with = "lenient_children")]
    pub children: Vec<Thing>,
}

impl Listing {
    /// Parses a listing envelope. Anything that is not shaped like one is
    /// treated as "no results".
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<ListingEnvelope>(value) {
            Ok(envelope) => envelope.data.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "listing payload malformed; treating as empty");
                Listing::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Thing {
    /// Builds a thing from one raw listing child. A missing or non-string
    /// `kind` and a missing `data` are kept as-is so that only this item
    /// degrades when rendered.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                let kind = match fields.remove("kind") {
                    Some(Value::String(kind)) => kind,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let data = fields.remove("data").unwrap_or(Value::Null);
                Thing { kind, data }
            }
            other => {
                debug!(child = %other, "listing child is not an object");
                Thing {
                    kind: String::new(),
                    data: other,
                }
            }
        }
    }

    pub fn item_kind(&self) -> ItemKind {
        ItemKind::from_tag(&self.kind)
    }

    /// Decodes the payload into the record for this item's kind.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ListingEnvelope {
    #[serde(default)]
    data: Option<Listing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub author: Option<String>,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_utc: Option<f64>,
    pub permalink: Option<String>,
    pub url: Option<String>,
    pub is_self: Option<bool>,
    pub thumbnail: Option<String>,
    pub preview: Option<Preview>,
}

impl Post {
    /// Preview image if present, else the thumbnail; `self`/`default`
    /// thumbnails are placeholders, not images.
    pub fn image_url(&self) -> Option<&str> {
        let preview = self
            .preview
            .as_ref()
            .and_then(|preview| preview.images.first())
            .and_then(|image| image.source.as_ref())
            .and_then(|source| source.url.as_deref())
            .filter(|url| !url.is_empty());
        let candidate = preview.or_else(|| self.thumbnail.as_deref())?;
        match candidate {
            "" | "self" | "default" => None,
            url => Some(url),
        }
    }

    pub fn is_self_post(&self) -> bool {
        self.is_self.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preview {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<PreviewImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewImage {
    pub source: Option<PreviewSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewSource {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Community {
    pub display_name: Option<String>,
    pub display_name_prefixed: Option<String>,
    pub public_description: Option<String>,
    pub subscribers: Option<i64>,
    pub active_user_count: Option<i64>,
    pub icon_img: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub name: Option<String>,
    pub link_karma: Option<i64>,
    pub comment_karma: Option<i64>,
    pub created_utc: Option<f64>,
    pub icon_img: Option<String>,
}

/// `/user/{name}/about` answers with a single `{kind, data}` thing rather
/// than a listing.
pub fn account_from_value(value: Value) -> Result<Account> {
    let thing = Thing::from_value(value);
    if thing.data.is_null() {
        return Err(anyhow!("reddit: user payload missing data"));
    }
    Ok(thing.decode()?)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    pub body: Option<String>,
    pub author: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
}

/// The `[post listing, comment listing]` pair returned for a permalink.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Thing,
    pub comments: Listing,
}

impl PostDetail {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut parts = match value {
            Value::Array(parts) => parts.into_iter(),
            _ => return Err(anyhow!("reddit: post detail payload is not an array")),
        };
        let post_listing = parts
            .next()
            .map(Listing::from_value)
            .ok_or_else(|| anyhow!("reddit: post detail payload empty"))?;
        let post = post_listing
            .children
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("reddit: post listing empty"))?;
        let comments = parts.next().map(Listing::from_value).unwrap_or_default();
        Ok(PostDetail { post, comments })
    }
}

fn lenient_children<'de, D>(deserializer: D) -> Result<Vec<Thing>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = null_as_default(deserializer)?;
    Ok(raw.into_iter().map(Thing::from_value).collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_tolerates_missing_pieces() {
        assert!(Listing::from_value(json!({})).is_empty());
        assert!(Listing::from_value(json!({"data": null})).is_empty());
        assert!(Listing::from_value(json!({"data": {"children": null}})).is_empty());
        assert!(Listing::from_value(json!([1, 2, 3])).is_empty());
        assert!(Listing::from_value(json!("oops")).is_empty());
    }

    #[test]
    fn listing_keeps_child_order_and_kinds() {
        let listing = Listing::from_value(json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"title": "first"}},
                {"kind": "t5", "data": {"display_name": "rust"}},
                {"kind": "more", "data": {"count": 4}},
            ]}
        }));
        let kinds: Vec<ItemKind> = listing.children.iter().map(Thing::item_kind).collect();
        assert_eq!(kinds, vec![ItemKind::Post, ItemKind::Community, ItemKind::More]);
        let post: Post = listing.children[0].decode().unwrap();
        assert_eq!(post.title.as_deref(), Some("first"));
    }

    #[test]
    fn one_broken_child_leaves_the_rest() {
        let listing = Listing::from_value(json!({
            "data": {"children": [
                {"kind": "t3", "data": {"title": "good-one"}},
                {"kind": 3, "data": {}},
                null,
                "stray",
                {"kind": "t3"},
                {"kind": "t3", "data": {"title": "good-two"}},
            ]}
        }));
        assert_eq!(listing.len(), 6);
        let kinds: Vec<ItemKind> = listing.children.iter().map(Thing::item_kind).collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::Post,
                ItemKind::Other("3".into()),
                ItemKind::Other(String::new()),
                ItemKind::Other(String::new()),
                ItemKind::Post,
                ItemKind::Post,
            ]
        );
        assert!(listing.children[4].data.is_null());
        let last: Post = listing.children[5].decode().unwrap();
        assert_eq!(last.title.as_deref(), Some("good-two"));
    }

    #[test]
    fn nulls_decode_as_absent() {
        let thing = Thing {
            kind: "t5".into(),
            data: json!({"subscribers": null, "icon_img": null, "display_name": "rust"}),
        };
        let community: Community = thing.decode().unwrap();
        assert_eq!(community.subscribers, None);
        assert_eq!(community.icon_img, None);
    }

    #[test]
    fn image_url_skips_sentinels() {
        let mut post = Post {
            thumbnail: Some("self".into()),
            ..Post::default()
        };
        assert_eq!(post.image_url(), None);
        post.thumbnail = Some("default".into());
        assert_eq!(post.image_url(), None);
        post.thumbnail = Some("https://b.thumbs.redditmedia.com/x.jpg".into());
        assert_eq!(post.image_url(), Some("https://b.thumbs.redditmedia.com/x.jpg"));

        let post: Post = serde_json::from_value(json!({
            "thumbnail": "self",
            "preview": {"images": [{"source": {"url": "https://preview.redd.it/a.png"}}]}
        }))
        .unwrap();
        assert_eq!(post.image_url(), Some("https://preview.redd.it/a.png"));
    }

    #[test]
    fn post_detail_requires_a_post() {
        let detail = PostDetail::from_value(json!([
            {"data": {"children": [{"kind": "t3", "data": {"title": "hello"}}]}},
            {"data": {"children": [{"kind": "t1", "data": {"body": "hi"}}]}},
        ]))
        .unwrap();
        assert_eq!(detail.comments.len(), 1);

        assert!(PostDetail::from_value(json!([{"data": {"children": []}}])).is_err());
        assert!(PostDetail::from_value(json!({"data": {}})).is_err());
    }

    #[test]
    fn post_detail_without_comment_listing_has_no_comments() {
        let detail = PostDetail::from_value(json!([
            {"data": {"children": [{"kind": "t3", "data": {}}]}},
        ]))
        .unwrap();
        assert!(detail.comments.is_empty());
    }

    #[test]
    fn account_reads_about_payload() {
        let account =
            account_from_value(json!({"kind": "t2", "data": {"name": "spez", "link_karma": 10}}))
                .unwrap();
        assert_eq!(account.name.as_deref(), Some("spez"));
        assert_eq!(account.comment_karma, None);
        assert!(account_from_value(json!({"kind": "t2"})).is_err());
        assert!(account_from_value(json!({"kind": "t2", "data": "spez"})).is_err());
    }
}
