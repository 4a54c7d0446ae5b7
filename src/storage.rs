//!
//! atelier content store
//! ---------------------
//! On-disk persistence for all CMS entities using a flat document layout:
//! `<root>/<collection>/<id>.json` for collections (posts, pages,
//! subscribers, messages, push registrations) and `<root>/site/<name>.json`
//! for the settings and resume singletons. Documents are pretty-printed JSON
//! so a site backup diffs cleanly under version control.
//!
//! Key responsibilities:
//! - Generic read/write/delete/list of typed documents.
//! - Entity-specific accessors with the orderings the site relies on
//!   (posts newest-first, pages by sidebar order).
//! - Listing is fail-open: a document that no longer parses is logged and
//!   omitted rather than failing the whole listing.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<Mutex<Store>>`) by the server. The mutex
//! serializes file I/O only; every request computes over its own snapshot.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};
use base64::Engine;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::content::{
    ContactMessage, Page, Post, PushRegistration, Resume, SiteSettings, Subscriber,
};

const POSTS: &str = "posts";
const PAGES: &str = "pages";
const SUBSCRIBERS: &str = "subscribers";
const MESSAGES: &str = "messages";
const PUSH_TOKENS: &str = "push_tokens";
const SITE: &str = "site";

/// Core on-disk storage handle for an atelier content tree.
#[derive(Clone)]
pub struct Store {
    /// Root folder for all collections.
    root: PathBuf,
}

/// Thread-safe handle shared across request handlers.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(SharedStore(Arc::new(Mutex::new(Store::new(root)?))))
    }
}

/// Document ids become file names; anything that could escape the collection
/// directory is rejected outright.
fn valid_doc_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && !id.contains('/')
        && !id.contains('\\')
        && !id.contains("..")
        && !id.starts_with('.')
}

impl Store {
    /// Create a new Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store root {}", root.display()))?;
        Ok(Self { root })
    }

    /// Return the configured root folder for this Store.
    pub fn root_path(&self) -> &PathBuf {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn doc_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        if !valid_doc_id(id) {
            bail!("invalid document id: {:?}", id);
        }
        Ok(self.collection_dir(collection).join(format!("{}.json", id)))
    }

    fn read_doc<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let path = self.doc_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let doc = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(doc))
    }

    fn write_doc<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<()> {
        let path = self.doc_path(collection, id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        debug!(target: "atelier::storage", "write_doc: collection='{}' id='{}'", collection, id);
        let raw = serde_json::to_string_pretty(doc)?;
        fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn delete_doc(&self, collection: &str, id: &str) -> Result<bool> {
        let path = self.doc_path(collection, id)?;
        if !path.exists() {
            return Ok(false);
        }
        debug!(target: "atelier::storage", "delete_doc: collection='{}' id='{}'", collection, id);
        fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))?;
        Ok(true)
    }

    /// Read every document in a collection. Unparseable documents are logged
    /// and skipped so one corrupt file cannot take down a listing.
    fn list_docs<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else { continue };
            if !name.ends_with(".json") {
                continue;
            }
            let raw = match fs::read_to_string(&path) {
                Ok(r) => r,
                Err(e) => {
                    warn!(target: "atelier::storage", "skipping unreadable {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<T>(&raw) {
                Ok(doc) => out.push(doc),
                Err(e) => {
                    warn!(target: "atelier::storage", "skipping unparseable {}: {}", path.display(), e);
                }
            }
        }
        Ok(out)
    }

    // --- Posts ---

    /// All posts, drafts included, newest first. Callers filter for the
    /// public feed; the admin listing uses this ordering directly.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.list_docs(POSTS)?;
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        self.read_doc(POSTS, id)
    }

    pub fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        Ok(self.list_posts()?.into_iter().find(|p| p.slug == slug))
    }

    pub fn save_post(&self, post: &Post) -> Result<()> {
        self.write_doc(POSTS, &post.id, post)
    }

    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.delete_doc(POSTS, id)
    }

    // --- Pages ---

    /// All pages sorted by sidebar `order`. This ordering also makes parent
    /// searches over the page set deterministic.
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        let mut pages: Vec<Page> = self.list_docs(PAGES)?;
        pages.sort_by_key(|p| p.order);
        Ok(pages)
    }

    pub fn get_page(&self, id: &str) -> Result<Option<Page>> {
        self.read_doc(PAGES, id)
    }

    pub fn get_page_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        Ok(self.list_pages()?.into_iter().find(|p| p.slug == slug))
    }

    pub fn save_page(&self, page: &Page) -> Result<()> {
        self.write_doc(PAGES, &page.id, page)
    }

    pub fn delete_page(&self, id: &str) -> Result<bool> {
        self.delete_doc(PAGES, id)
    }

    // --- Site singletons ---

    pub fn get_settings(&self) -> Result<SiteSettings> {
        Ok(self.read_doc(SITE, "settings")?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &SiteSettings) -> Result<()> {
        self.write_doc(SITE, "settings", settings)
    }

    pub fn get_resume(&self) -> Result<Resume> {
        Ok(self.read_doc(SITE, "resume")?.unwrap_or_default())
    }

    pub fn save_resume(&self, resume: &Resume) -> Result<()> {
        self.write_doc(SITE, "resume", resume)
    }

    // --- Subscribers ---

    pub fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let mut subs: Vec<Subscriber> = self.list_docs(SUBSCRIBERS)?;
        subs.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
        Ok(subs)
    }

    pub fn find_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let needle = email.trim().to_lowercase();
        Ok(self
            .list_subscribers()?
            .into_iter()
            .find(|s| s.email.trim().to_lowercase() == needle))
    }

    pub fn save_subscriber(&self, sub: &Subscriber) -> Result<()> {
        self.write_doc(SUBSCRIBERS, &sub.id, sub)
    }

    pub fn delete_subscriber(&self, id: &str) -> Result<bool> {
        self.delete_doc(SUBSCRIBERS, id)
    }

    // --- Contact messages ---

    pub fn list_messages(&self) -> Result<Vec<ContactMessage>> {
        let mut msgs: Vec<ContactMessage> = self.list_docs(MESSAGES)?;
        msgs.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(msgs)
    }

    pub fn save_message(&self, msg: &ContactMessage) -> Result<()> {
        self.write_doc(MESSAGES, &msg.id, msg)
    }

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.delete_doc(MESSAGES, id)
    }

    // --- Push registrations ---

    /// Device tokens are arbitrary transport strings; the file stem is the
    /// URL-safe base64 of the token so re-registration overwrites in place.
    fn push_doc_id(token: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token.as_bytes())
    }

    pub fn list_push_registrations(&self) -> Result<Vec<PushRegistration>> {
        self.list_docs(PUSH_TOKENS)
    }

    pub fn save_push_registration(&self, reg: &PushRegistration) -> Result<()> {
        self.write_doc(PUSH_TOKENS, &Self::push_doc_id(&reg.token), reg)
    }

    pub fn delete_push_registration(&self, token: &str) -> Result<bool> {
        self.delete_doc(PUSH_TOKENS, &Self::push_doc_id(token))
    }

    /// Most recently refreshed token registered for a user, if any.
    pub fn latest_token_for_user(&self, user_id: &str) -> Result<Option<String>> {
        let mut regs: Vec<PushRegistration> = self
            .list_push_registrations()?
            .into_iter()
            .filter(|r| r.user_id.as_deref() == Some(user_id))
            .collect();
        regs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(regs.into_iter().next().map(|r| r.token))
    }

    /// True when no posts exist yet; used to decide first-run seeding.
    pub fn has_no_posts(&self) -> Result<bool> {
        Ok(self.list_docs::<Post>(POSTS)?.is_empty())
    }
}
