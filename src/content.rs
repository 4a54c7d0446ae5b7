//!
//! atelier content model
//! ---------------------
//! Entity types persisted by the content store: blog posts, pages (including
//! curated collections), site settings, the resume document, newsletter
//! subscribers, contact messages and push device registrations.
//!
//! Content bodies are raw markdown; rendering happens in the frontend. All
//! timestamps are UTC. Identifiers are opaque strings (uuid v4 for entities
//! created here, fixed well-known ids for system pages).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool { true }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    /// Raw markdown body.
    pub content: String,
    pub status: PostStatus,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Absence in stored documents means "listed"; only an explicit false hides
    /// the post from feeds.
    #[serde(default = "default_true")]
    pub is_listed: bool,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hint_link: Option<String>,
}

impl Post {
    /// A post appears in public feeds only when published and listed.
    /// Password protection gates content, not listing.
    pub fn is_publicly_listed(&self) -> bool {
        self.status == PostStatus::Published && self.is_listed
    }

    /// Copy with the stored secret removed, for serialization to visitors.
    pub fn without_secret(&self) -> Post {
        let mut p = self.clone();
        p.password = None;
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Regular content page, optionally with a curated post feed.
    Page,
    /// Sidebar section heading, no content of its own.
    Heading,
    /// External link entry in the sidebar.
    Link,
}

impl Default for PageKind {
    fn default() -> Self { PageKind::Page }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: PageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default)]
    pub in_sidebar: bool,
    /// Sidebar position; pages listings are always sorted by this.
    #[serde(default)]
    pub order: i64,
    /// System pages (home, resume, contact, resources) are seeded at startup
    /// and cannot be deleted through the admin API.
    #[serde(default)]
    pub is_system: bool,
    /// Ordered curated feed: post ids in editorial order. Order is
    /// caller-controlled and never re-sorted.
    #[serde(default)]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hint_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Page {
    pub fn without_secret(&self) -> Page {
        let mut p = self.clone();
        p.password = None;
        p
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialProfile {
    pub network: String,
    pub username: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    pub global_title: String,
    pub global_description: String,
    /// Markdown intro rendered on the home page above the feed.
    pub home_intro_content: String,
    #[serde(default)]
    pub social_links: Vec<SocialProfile>,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub profile_label: String,
    #[serde(default)]
    pub newsletter_title: String,
    #[serde(default)]
    pub newsletter_description: String,
    #[serde(default)]
    pub contact_intro: String,
    #[serde(default)]
    pub contact_email: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            global_title: "Atelier".to_string(),
            global_description: "Personal portfolio and blog.".to_string(),
            home_intro_content: "## Welcome".to_string(),
            social_links: Vec::new(),
            profile_name: String::new(),
            profile_label: String::new(),
            newsletter_title: "Newsletter".to_string(),
            newsletter_description: String::new(),
            contact_intro: String::new(),
            contact_email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

// --- Resume document (JSON-resume-like, stored as one document) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeLocation {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeBasics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub location: ResumeLocation,
    #[serde(default)]
    pub profiles: Vec<SocialProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkExperience {
    pub id: String,
    pub company: String,
    pub position: String,
    pub start_date: String,
    /// "Present" for a current role, otherwise YYYY-MM-DD.
    pub end_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationEntry {
    pub id: String,
    pub institution: String,
    pub area: String,
    pub study_type: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub name: String,
    pub publisher: String,
    pub release_date: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub id: String,
    pub name: String,
    pub issuer: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resume {
    #[serde(default)]
    pub basics: ResumeBasics,
    #[serde(default)]
    pub work: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: Vec<SkillCategory>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
}

/// One registered push device. Tokens are refreshed in place on
/// re-registration and pruned when the transport reports them invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRegistration {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(status: PostStatus, is_listed: bool) -> Post {
        Post {
            id: "p1".into(),
            slug: "p1".into(),
            title: "P1".into(),
            excerpt: String::new(),
            content: String::new(),
            status,
            date: Utc::now(),
            tags: vec![],
            pinned: false,
            is_listed,
            is_protected: false,
            password: None,
            password_hint_link: None,
        }
    }

    #[test]
    fn listing_requires_published_and_listed() {
        assert!(post(PostStatus::Published, true).is_publicly_listed());
        assert!(!post(PostStatus::Draft, true).is_publicly_listed());
        assert!(!post(PostStatus::Published, false).is_publicly_listed());
    }

    #[test]
    fn is_listed_defaults_to_true_when_absent() {
        // Stored documents from older versions omit the field entirely.
        let p: Post = serde_json::from_value(serde_json::json!({
            "id": "x", "slug": "x", "title": "X", "content": "",
            "status": "published", "date": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(p.is_listed);
        assert!(p.is_publicly_listed());
    }

    #[test]
    fn without_secret_strips_password_only() {
        let mut p = post(PostStatus::Published, true);
        p.is_protected = true;
        p.password = Some("s3cret".into());
        p.password_hint_link = Some("https://example.com/hint".into());
        let pub_view = p.without_secret();
        assert!(pub_view.password.is_none());
        assert!(pub_view.is_protected);
        assert_eq!(pub_view.password_hint_link.as_deref(), Some("https://example.com/hint"));
    }
}
