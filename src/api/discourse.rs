//! Discourse REST API client

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::ApiCredentials;
use crate::error::{ApiError, ApiResult, ErrorKind};
use crate::models::{
    Byte, Category, Comment, CurrentUser, DraftData, OPENING_POST_NUMBER, RemoteDraft,
    ThresholdSource, UploadedImage, ValidationThresholds, link_replies,
};

use super::{CreatedPost, ForumApi, NewReply, NewTopic};

/// Discourse post action type for likes
const LIKE_ACTION_TYPE: u32 = 2;

/// Discourse API client
pub struct DiscourseClient {
    client: Client,
    site: String,
    credentials: Option<ApiCredentials>,
}

impl DiscourseClient {
    /// Create a new client for a site
    pub fn new(site: &str, credentials: Option<ApiCredentials>) -> Self {
        Self {
            client: Client::new(),
            site: site.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Site URL without a trailing slash
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Whether requests carry credentials
    pub const fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build API URL
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.site, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.credentials {
            Some(credentials) => credentials
                .headers()
                .into_iter()
                .fold(request, |req, (name, value)| req.header(name, value)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            tracing::debug!("Discourse error {} ({}): {}", status, err.kind, err.message);
            return Err(err);
        }

        Ok(response.json().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(())
    }
}

impl ForumApi for DiscourseClient {
    async fn current_user(&self) -> ApiResult<CurrentUser> {
        let response: CurrentUserResponse = self
            .send(self.client.get(self.url("/session/current.json")))
            .await
            .map_err(|e| {
                // Discourse answers 404 here when nobody is signed in
                if e.kind == ErrorKind::NotFound {
                    ApiError { kind: ErrorKind::AuthRequired, ..e }
                } else {
                    e
                }
            })?;

        Ok(response.current_user)
    }

    async fn categories(&self) -> ApiResult<Vec<Category>> {
        let response: CategoriesResponse = self
            .send(
                self.client
                    .get(self.url("/categories.json?include_subcategories=true")),
            )
            .await?;

        let mut categories = Vec::new();
        for mut entry in response.category_list.categories {
            let subcategories = std::mem::take(&mut entry.subcategory_list);
            let parent_id = entry.category.id;
            categories.push(entry.category);
            categories.extend(subcategories.into_iter().map(|mut sub| {
                sub.parent_category_id = sub.parent_category_id.or(Some(parent_id));
                sub
            }));
        }

        Ok(categories)
    }

    async fn validation_thresholds(&self) -> ApiResult<ValidationThresholds> {
        let result: ApiResult<SiteSettingsResponse> = self
            .send(
                self.client
                    .get(self.url("/admin/site_settings.json?filter=min_")),
            )
            .await;

        // Non-staff credentials cannot read site settings; the stock values apply
        let settings = match result {
            Ok(settings) => settings.site_settings,
            Err(e) if e.kind == ErrorKind::Network => return Err(e),
            Err(e) => {
                tracing::debug!("Using default validation thresholds: {}", e);
                return Ok(ValidationThresholds::default());
            }
        };

        Ok(thresholds_from_settings(settings))
    }

    async fn get_topic(&self, topic_id: u64) -> ApiResult<Byte> {
        let topic: TopicResponse = self
            .send(self.client.get(self.url(&format!("/t/{topic_id}.json"))))
            .await?;

        Ok(topic.into_byte(&self.site))
    }

    async fn get_draft(&self, draft_key: &str) -> ApiResult<Option<RemoteDraft>> {
        let url = self.url(&format!("/drafts/{}.json", urlencoding::encode(draft_key)));
        let response: DraftResponse = self.send(self.client.get(url)).await?;

        let content = match response.draft.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let data: DraftData = serde_json::from_str(raw).map_err(|e| {
                    ApiError::new(ErrorKind::Other, format!("Unreadable draft data: {e}"))
                })?;
                Some(data.into())
            }
            _ => None,
        };

        Ok(Some(RemoteDraft {
            draft_key: draft_key.to_string(),
            sequence: response.draft_sequence,
            content,
        }))
    }

    async fn save_draft(&self, draft_key: &str, data: &DraftData, sequence: u64) -> ApiResult<u64> {
        let data = serde_json::to_string(data)
            .map_err(|e| ApiError::new(ErrorKind::Other, format!("Invalid draft data: {e}")))?;
        let sequence = sequence.to_string();
        let params = [
            ("draft_key", draft_key),
            ("data", data.as_str()),
            ("sequence", sequence.as_str()),
        ];

        let response: SaveDraftResponse = self
            .send(self.client.post(self.url("/drafts.json")).form(&params))
            .await?;

        Ok(response.draft_sequence)
    }

    async fn delete_draft(&self, draft_key: &str, sequence: u64) -> ApiResult<()> {
        let url = self.url(&format!(
            "/drafts/{}.json?sequence={sequence}",
            urlencoding::encode(draft_key)
        ));
        self.send_empty(self.client.delete(url)).await
    }

    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> ApiResult<UploadedImage> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("type", "composer")
            .text("synchronous", "true")
            .part("file", part);

        self.send(self.client.post(self.url("/uploads.json")).multipart(form))
            .await
    }

    async fn create_topic(&self, topic: &NewTopic) -> ApiResult<CreatedPost> {
        let response: CreatePostResponse = self
            .send(self.client.post(self.url("/posts.json")).json(topic))
            .await?;
        Ok(response.into())
    }

    async fn create_post(&self, reply: &NewReply) -> ApiResult<CreatedPost> {
        let response: CreatePostResponse = self
            .send(self.client.post(self.url("/posts.json")).json(reply))
            .await?;
        Ok(response.into())
    }

    async fn like_post(&self, post_id: u64) -> ApiResult<()> {
        let request = PostActionRequest {
            id: post_id,
            post_action_type_id: LIKE_ACTION_TYPE,
        };
        self.send_empty(self.client.post(self.url("/post_actions.json")).json(&request))
            .await
    }

    async fn unlike_post(&self, post_id: u64) -> ApiResult<()> {
        let url = self.url(&format!(
            "/post_actions/{post_id}.json?post_action_type_id={LIKE_ACTION_TYPE}"
        ));
        self.send_empty(self.client.delete(url)).await
    }

    async fn bookmark_post(&self, post_id: u64) -> ApiResult<u64> {
        let request = BookmarkRequest {
            bookmarkable_id: post_id,
            bookmarkable_type: "Post",
        };
        let response: BookmarkResponse = self
            .send(self.client.post(self.url("/bookmarks.json")).json(&request))
            .await?;
        Ok(response.id)
    }

    async fn remove_bookmark(&self, bookmark_id: u64) -> ApiResult<()> {
        let url = self.url(&format!("/bookmarks/{bookmark_id}.json"));
        self.send_empty(self.client.delete(url)).await
    }
}

// ==================== API Types ====================

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    category_list: CategoryList,
}

#[derive(Debug, Deserialize)]
struct CategoryList {
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    #[serde(flatten)]
    category: Category,
    #[serde(default)]
    subcategory_list: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct SiteSettingsResponse {
    site_settings: Vec<SiteSetting>,
}

#[derive(Debug, Deserialize)]
struct SiteSetting {
    setting: String,
    value: serde_json::Value,
}

/// Overlay the readable `min_*` settings on the stock thresholds
fn thresholds_from_settings(settings: Vec<SiteSetting>) -> ValidationThresholds {
    let mut thresholds = ValidationThresholds {
        source: ThresholdSource::Site,
        ..ValidationThresholds::default()
    };
    for setting in settings {
        let Some(value) = setting.value_usize() else {
            continue;
        };
        match setting.setting.as_str() {
            "min_topic_title_length" => thresholds.min_title = value,
            "min_first_post_length" => thresholds.min_post = value,
            _ => {}
        }
    }
    thresholds
}

impl SiteSetting {
    fn value_usize(&self) -> Option<usize> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_u64().map(|v| v as usize),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    #[serde(default)]
    draft: Option<String>,
    #[serde(default)]
    draft_sequence: u64,
}

#[derive(Debug, Deserialize)]
struct SaveDraftResponse {
    draft_sequence: u64,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    id: u64,
    topic_id: u64,
    post_number: u64,
    #[serde(default)]
    topic_slug: String,
}

impl From<CreatePostResponse> for CreatedPost {
    fn from(r: CreatePostResponse) -> Self {
        Self {
            id: r.id,
            topic_id: r.topic_id,
            post_number: r.post_number,
            topic_slug: r.topic_slug,
        }
    }
}

#[derive(Debug, Serialize)]
struct PostActionRequest {
    id: u64,
    post_action_type_id: u32,
}

#[derive(Debug, Serialize)]
struct BookmarkRequest {
    bookmarkable_id: u64,
    bookmarkable_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct BookmarkResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    id: u64,
    title: String,
    slug: String,
    #[serde(default)]
    category_id: Option<u64>,
    #[serde(default)]
    posts_count: u32,
    created_at: String,
    post_stream: PostStream,
}

#[derive(Debug, Deserialize)]
struct PostStream {
    posts: Vec<DiscoursePost>,
}

#[derive(Debug, Deserialize)]
struct DiscoursePost {
    id: u64,
    post_number: u64,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_template: Option<String>,
    #[serde(default)]
    cooked: String,
    created_at: String,
    #[serde(default)]
    reply_to_post_number: Option<u64>,
    #[serde(default)]
    actions_summary: Vec<ActionSummary>,
    #[serde(default)]
    bookmark_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ActionSummary {
    id: u32,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    acted: bool,
}

fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// Turn Discourse "cooked" HTML into plain text
pub fn strip_html(cooked: &str) -> String {
    let content = cooked
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p><p>", "\n\n")
        .replace("</p>\n<p>", "\n\n");

    let content = regex_lite::Regex::new(r"<[^>]+>")
        .map(|re| re.replace_all(&content, "").to_string())
        .unwrap_or(content);

    html_escape::decode_html_entities(&content).trim().to_string()
}

impl DiscoursePost {
    fn into_comment(self, site: &str) -> Comment {
        let like = self.actions_summary.iter().find(|a| a.id == LIKE_ACTION_TYPE);
        let avatar = self.avatar_template.map(|t| {
            let path = t.replace("{size}", "90");
            if path.starts_with("http") {
                path
            } else {
                format!("{site}{path}")
            }
        });

        Comment {
            id: self.id.to_string(),
            post_number: self.post_number,
            author_name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| self.username.clone()),
            author_username: self.username,
            author_avatar: avatar,
            content: strip_html(&self.cooked),
            created_at: parse_time(&self.created_at),
            likes: like.map_or(0, |a| a.count),
            liked: like.is_some_and(|a| a.acted),
            bookmark_id: self.bookmark_id,
            parent_id: None,
            reply_to_post_number: self.reply_to_post_number,
            is_reply: false,
            is_new: false,
        }
    }
}

impl TopicResponse {
    fn into_byte(self, site: &str) -> Byte {
        let mut opening = None;
        let mut comments = Vec::new();

        for post in self.post_stream.posts {
            let comment = post.into_comment(site);
            if comment.post_number == OPENING_POST_NUMBER {
                opening = Some(comment);
            } else {
                comments.push(comment);
            }
        }
        link_replies(&mut comments);

        Byte {
            id: self.id,
            title: self.title,
            slug: self.slug,
            category_id: self.category_id,
            opening,
            comments,
            posts_count: self.posts_count,
            created_at: parse_time(&self.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC_JSON: &str = r#"{
        "id": 99,
        "title": "Welcome",
        "slug": "welcome",
        "category_id": 5,
        "posts_count": 3,
        "created_at": "2024-05-01T10:00:00.000Z",
        "post_stream": {"posts": [
            {"id": 1001, "post_number": 1, "username": "op", "cooked": "<p>Hello &amp; welcome</p>",
             "created_at": "2024-05-01T10:00:00.000Z"},
            {"id": 1002, "post_number": 2, "username": "bob", "name": "Bob",
             "avatar_template": "/user_avatar/x/bob/{size}/1.png",
             "cooked": "<p>First</p><p>Second</p>", "created_at": "2024-05-01T11:00:00.000Z",
             "actions_summary": [{"id": 2, "count": 4, "acted": true}], "bookmark_id": 77},
            {"id": 1003, "post_number": 3, "username": "carol", "cooked": "<p>re</p>",
             "created_at": "2024-05-01T12:00:00.000Z", "reply_to_post_number": 2}
        ]}
    }"#;

    #[test]
    fn test_topic_into_byte() {
        let topic: TopicResponse = serde_json::from_str(TOPIC_JSON).unwrap();
        let byte = topic.into_byte("https://forum.example.com");

        assert_eq!(byte.opening.as_ref().unwrap().content, "Hello & welcome");
        assert_eq!(byte.comments.len(), 2);

        let bob = &byte.comments[0];
        assert_eq!(bob.id, "1002");
        assert_eq!(bob.content, "First\n\nSecond");
        assert_eq!(bob.likes, 4);
        assert!(bob.liked);
        assert_eq!(bob.bookmark_id, Some(77));
        assert_eq!(
            bob.author_avatar.as_deref(),
            Some("https://forum.example.com/user_avatar/x/bob/90/1.png")
        );

        let carol = &byte.comments[1];
        assert_eq!(carol.parent_id.as_deref(), Some("1002"));
        assert!(carol.is_reply);
    }

    #[test]
    fn test_categories_flatten_shape() {
        let json = r#"{"category_list": {"categories": [
            {"id": 1, "name": "Tech", "slug": "tech", "subcategory_list": [
                {"id": 2, "name": "Rust", "slug": "rust"}
            ]}
        ]}}"#;
        let response: CategoriesResponse = serde_json::from_str(json).unwrap();
        let entry = &response.category_list.categories[0];
        assert_eq!(entry.category.id, 1);
        assert_eq!(entry.subcategory_list[0].name, "Rust");
    }

    #[test]
    fn test_site_setting_values() {
        let json = r#"{"site_settings": [
            {"setting": "min_topic_title_length", "value": "8"},
            {"setting": "min_first_post_length", "value": 12}
        ]}"#;
        let response: SiteSettingsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.site_settings[0].value_usize(), Some(8));
        assert_eq!(response.site_settings[1].value_usize(), Some(12));
    }

    #[test]
    fn test_thresholds_from_settings() {
        let json = r#"{"site_settings": [
            {"setting": "min_topic_title_length", "value": "8"},
            {"setting": "min_post_length", "value": 3},
            {"setting": "min_first_post_length", "value": null}
        ]}"#;
        let response: SiteSettingsResponse = serde_json::from_str(json).unwrap();
        let thresholds = thresholds_from_settings(response.site_settings);

        assert_eq!(thresholds.min_title, 8);
        assert_eq!(thresholds.min_post, ValidationThresholds::default().min_post);
        assert_eq!(thresholds.source, ThresholdSource::Site);
        assert!(!thresholds.is_default());
        assert!(ValidationThresholds::default().is_default());
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>a<br>b</p>"), "a\nb");
        assert_eq!(strip_html("<p>&lt;tag&gt;</p>"), "<tag>");
    }
}
