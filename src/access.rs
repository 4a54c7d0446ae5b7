//!
//! atelier access resolution
//! -------------------------
//! Decides whether a visitor may view a post or page right now, given the
//! unlock grants presented with the request, and composes the curated post
//! feed attached to a page.
//!
//! Protection rules:
//! - A page gates itself: its own grant unlocks it.
//! - A page also gates every post in its curated feed. Holding the page grant
//!   unlocks all of them, including posts that carry their own password.
//! - A post curated by several protected pages unlocks when ANY of those
//!   pages is unlocked (union policy).
//!
//! Resolution is a pure computation over one snapshot of the entities and the
//! visitor's grant set; nothing here touches storage or cookies.

use std::collections::HashSet;

use crate::content::{Page, Post};

/// Cookie name prefix for post-scoped grants: `access_granted_<post_id>`.
pub const POST_GRANT_PREFIX: &str = "access_granted_";
/// Cookie name prefix for page-scoped grants: `access_granted_page_<page_id>`.
pub const PAGE_GRANT_PREFIX: &str = "access_granted_page_";
/// Grants expire one week after issuance.
pub const GRANT_TTL_SECS: i64 = 60 * 60 * 24 * 7;

/// A capability grant scoped to exactly one protected entity. The cookie
/// value is an opaque marker; only the name (scope) matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grant {
    Post(String),
    Page(String),
}

impl Grant {
    pub fn cookie_name(&self) -> String {
        match self {
            Grant::Post(id) => format!("{}{}", POST_GRANT_PREFIX, id),
            Grant::Page(id) => format!("{}{}", PAGE_GRANT_PREFIX, id),
        }
    }

    /// Parse a cookie name back into a grant scope. The page prefix extends
    /// the post prefix, so it must be tried first.
    pub fn parse(cookie_name: &str) -> Option<Grant> {
        if let Some(id) = cookie_name.strip_prefix(PAGE_GRANT_PREFIX) {
            if !id.is_empty() {
                return Some(Grant::Page(id.to_string()));
            }
        }
        if let Some(id) = cookie_name.strip_prefix(POST_GRANT_PREFIX) {
            if !id.is_empty() {
                return Some(Grant::Post(id.to_string()));
            }
        }
        None
    }
}

/// The set of grants a visitor currently holds, derived from their cookies.
#[derive(Debug, Clone, Default)]
pub struct GrantSet {
    posts: HashSet<String>,
    pages: HashSet<String>,
}

impl GrantSet {
    pub fn new() -> Self {
        GrantSet::default()
    }

    /// Build a grant set from cookie names, ignoring unrelated cookies.
    pub fn from_cookie_names<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        let mut set = GrantSet::new();
        for name in names {
            if let Some(grant) = Grant::parse(name) {
                set.insert(grant);
            }
        }
        set
    }

    pub fn insert(&mut self, grant: Grant) {
        match grant {
            Grant::Post(id) => {
                self.posts.insert(id);
            }
            Grant::Page(id) => {
                self.pages.insert(id);
            }
        }
    }

    pub fn has_post(&self, post_id: &str) -> bool {
        self.posts.contains(post_id)
    }

    pub fn has_page(&self, page_id: &str) -> bool {
        self.pages.contains(page_id)
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.pages.is_empty()
    }
}

/// Outcome of an access resolution. Deny carries the hint link to show on the
/// password challenge, when one is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny { hint_link: Option<String> },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Resolve visibility of a page for a visitor holding `grants`.
pub fn resolve_page_access(page: &Page, grants: &GrantSet) -> AccessDecision {
    if !page.is_protected {
        return AccessDecision::Allow;
    }
    if grants.has_page(&page.id) {
        return AccessDecision::Allow;
    }
    AccessDecision::Deny { hint_link: page.password_hint_link.clone() }
}

/// All protected pages curating the given post, in the order the caller
/// provided (the store lists pages by their sidebar `order`, which makes the
/// deny-hint below deterministic).
pub fn protecting_parents<'a>(post_id: &str, pages: &'a [Page]) -> Vec<&'a Page> {
    pages
        .iter()
        .filter(|p| p.is_protected && p.post_ids.iter().any(|id| id == post_id))
        .collect()
}

/// Resolve visibility of a post for a visitor holding `grants`.
///
/// A held grant for any protected page curating the post overrides the post's
/// own lock; conversely an unprotected post inherits the lock of its curating
/// protected pages when none of them is unlocked.
pub fn resolve_post_access(post: &Post, all_pages: &[Page], grants: &GrantSet) -> AccessDecision {
    let mut locked = post.is_protected && !grants.has_post(&post.id);

    let parents = protecting_parents(&post.id, all_pages);
    if !parents.is_empty() {
        if parents.iter().any(|p| grants.has_page(&p.id)) {
            // Page access unlocks the whole curated collection.
            locked = false;
        } else if !post.is_protected {
            // The page's protection extends to its curated posts.
            locked = true;
        }
    }

    if !locked {
        return AccessDecision::Allow;
    }

    // Prefer the post's own hint; fall back to the first protecting parent's
    // hint when the post carries none (always the case for inherited locks).
    let hint_link = post
        .password_hint_link
        .clone()
        .or_else(|| parents.iter().find_map(|p| p.password_hint_link.clone()));
    AccessDecision::Deny { hint_link }
}

/// Compose the curated feed for a page: its `post_ids` mapped to posts, in
/// the stored editorial order. Drafts, unlisted posts and ids with no
/// matching post are dropped silently.
pub fn compose_curated_feed(page: &Page, all_posts: &[Post]) -> Vec<Post> {
    if page.post_ids.is_empty() {
        return Vec::new();
    }
    page.post_ids
        .iter()
        .filter_map(|id| all_posts.iter().find(|p| &p.id == id))
        .filter(|p| p.is_publicly_listed())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PageKind, PostStatus};
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            slug: id.to_string(),
            title: id.to_uppercase(),
            excerpt: String::new(),
            content: "body".to_string(),
            status: PostStatus::Published,
            date: Utc::now(),
            tags: vec![],
            pinned: false,
            is_listed: true,
            is_protected: false,
            password: None,
            password_hint_link: None,
        }
    }

    fn protected_post(id: &str, password: &str, hint: Option<&str>) -> Post {
        let mut p = post(id);
        p.is_protected = true;
        p.password = Some(password.to_string());
        p.password_hint_link = hint.map(|h| h.to_string());
        p
    }

    fn page(id: &str, post_ids: &[&str]) -> Page {
        Page {
            id: id.to_string(),
            slug: id.to_string(),
            title: id.to_uppercase(),
            content: String::new(),
            kind: PageKind::Page,
            external_url: None,
            in_sidebar: true,
            order: 0,
            is_system: false,
            post_ids: post_ids.iter().map(|s| s.to_string()).collect(),
            is_protected: false,
            password: None,
            password_hint_link: None,
            last_updated: None,
        }
    }

    fn protected_page(id: &str, post_ids: &[&str], hint: Option<&str>) -> Page {
        let mut p = page(id, post_ids);
        p.is_protected = true;
        p.password = Some("pw".to_string());
        p.password_hint_link = hint.map(|h| h.to_string());
        p
    }

    fn grants(grants: &[Grant]) -> GrantSet {
        let mut set = GrantSet::new();
        for g in grants {
            set.insert(g.clone());
        }
        set
    }

    #[test]
    fn unprotected_page_always_allowed() {
        let p = page("about", &[]);
        assert!(resolve_page_access(&p, &GrantSet::new()).is_allowed());
        assert!(resolve_page_access(&p, &grants(&[Grant::Post("x".into())])).is_allowed());
    }

    #[test]
    fn protected_page_requires_its_own_grant() {
        let p = protected_page("vault", &[], Some("https://hint"));
        assert_eq!(
            resolve_page_access(&p, &GrantSet::new()),
            AccessDecision::Deny { hint_link: Some("https://hint".into()) }
        );
        // A post grant for an unrelated id does not help.
        assert!(!resolve_page_access(&p, &grants(&[Grant::Post("vault".into())])).is_allowed());
        assert!(resolve_page_access(&p, &grants(&[Grant::Page("vault".into())])).is_allowed());
    }

    #[test]
    fn plain_post_allowed_regardless_of_grants() {
        let n = post("n");
        let pages = vec![page("open", &["n"])];
        assert!(resolve_post_access(&n, &pages, &GrantSet::new()).is_allowed());
        assert!(resolve_post_access(&n, &pages, &grants(&[Grant::Page("other".into())])).is_allowed());
    }

    #[test]
    fn protected_post_gated_by_own_grant() {
        let n = protected_post("n", "pw", Some("https://post-hint"));
        assert_eq!(
            resolve_post_access(&n, &[], &GrantSet::new()),
            AccessDecision::Deny { hint_link: Some("https://post-hint".into()) }
        );
        assert!(resolve_post_access(&n, &[], &grants(&[Grant::Post("n".into())])).is_allowed());
    }

    #[test]
    fn unprotected_post_inherits_parent_lock() {
        let n = post("n");
        let pages = vec![protected_page("p1", &["n"], Some("https://page-hint"))];
        assert_eq!(
            resolve_post_access(&n, &pages, &GrantSet::new()),
            AccessDecision::Deny { hint_link: Some("https://page-hint".into()) }
        );
        assert!(resolve_post_access(&n, &pages, &grants(&[Grant::Page("p1".into())])).is_allowed());
    }

    #[test]
    fn page_grant_overrides_post_lock() {
        // Post independently protected AND curated by a protected page: the
        // page grant alone unlocks it.
        let n = protected_post("n", "pw", None);
        let pages = vec![protected_page("p1", &["n"], None)];
        assert!(resolve_post_access(&n, &pages, &grants(&[Grant::Page("p1".into())]))
            .is_allowed());
    }

    #[test]
    fn any_protecting_parent_unlocks() {
        let n = post("n");
        let pages = vec![
            protected_page("p1", &["n"], None),
            protected_page("p2", &["n"], None),
        ];
        assert!(!resolve_post_access(&n, &pages, &GrantSet::new()).is_allowed());
        // Either parent grant suffices, not just the first.
        assert!(resolve_post_access(&n, &pages, &grants(&[Grant::Page("p2".into())])).is_allowed());
        assert!(resolve_post_access(&n, &pages, &grants(&[Grant::Page("p1".into())])).is_allowed());
    }

    #[test]
    fn deny_hint_prefers_post_hint_then_first_parent() {
        let own = protected_post("n", "pw", Some("https://own"));
        let pages = vec![
            protected_page("p1", &["n"], Some("https://p1")),
            protected_page("p2", &["n"], Some("https://p2")),
        ];
        match resolve_post_access(&own, &pages, &GrantSet::new()) {
            AccessDecision::Deny { hint_link } => assert_eq!(hint_link.as_deref(), Some("https://own")),
            other => panic!("expected deny, got {:?}", other),
        }

        // Protected post without its own hint falls back to the first parent
        // that has one.
        let hintless = protected_post("n", "pw", None);
        match resolve_post_access(&hintless, &pages, &GrantSet::new()) {
            AccessDecision::Deny { hint_link } => assert_eq!(hint_link.as_deref(), Some("https://p1")),
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[test]
    fn unlisted_posts_still_resolve() {
        // Listing and protection are independent: a draft or unlisted post is
        // absent from feeds but direct access resolution still applies.
        let mut n = post("n");
        n.is_listed = false;
        assert!(resolve_post_access(&n, &[], &GrantSet::new()).is_allowed());
    }

    #[test]
    fn curated_feed_preserves_editorial_order() {
        let posts = vec![post("a"), post("b"), post("c")];
        let p = page("list", &["c", "a", "b"]);
        let feed = compose_curated_feed(&p, &posts);
        let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn curated_feed_drops_drafts_unlisted_and_missing() {
        let mut draft = post("b");
        draft.status = PostStatus::Draft;
        let mut hidden = post("d");
        hidden.is_listed = false;
        let posts = vec![post("a"), draft, post("c"), hidden];

        let p = page("list", &["a", "b", "c", "d", "gone"]);
        let feed = compose_curated_feed(&p, &posts);
        let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn curated_feed_empty_without_post_ids() {
        let posts = vec![post("a")];
        assert!(compose_curated_feed(&page("empty", &[]), &posts).is_empty());
    }

    #[test]
    fn grant_cookie_names_round_trip() {
        let g = Grant::Post("abc-123".into());
        assert_eq!(g.cookie_name(), "access_granted_abc-123");
        assert_eq!(Grant::parse("access_granted_abc-123"), Some(g));

        let g = Grant::Page("p9".into());
        assert_eq!(g.cookie_name(), "access_granted_page_p9");
        assert_eq!(Grant::parse("access_granted_page_p9"), Some(g));

        assert_eq!(Grant::parse("session"), None);
        assert_eq!(Grant::parse("access_granted_"), None);
    }

    #[test]
    fn page_prefix_wins_over_post_prefix() {
        // "access_granted_page_x" must parse as a page grant for "x", not a
        // post grant for "page_x".
        assert_eq!(Grant::parse("access_granted_page_x"), Some(Grant::Page("x".into())));
    }

    #[test]
    fn grant_set_from_cookie_names_ignores_noise() {
        let set = GrantSet::from_cookie_names(vec![
            "atelier_session",
            "access_granted_n1",
            "access_granted_page_p1",
            "theme",
        ]);
        assert!(set.has_post("n1"));
        assert!(set.has_page("p1"));
        assert!(!set.has_post("p1"));
    }
}
