//!
//! atelier HTTP server
//! -------------------
//! This module defines the Axum-based JSON API for the site: the public
//! surface (home feed, posts, pages with curated feeds, tags, resume,
//! contact form, newsletter signup, password unlock) and admin
//! authentication. Admin CRUD handlers live in `server::admin`.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model for admins.
//! - Login/logout endpoints backed by the `security` module.
//! - Visitor unlock-grant cookies (`access_granted_*`) feeding the access
//!   resolver; grants are HttpOnly with a one-week Max-Age.
//! - First-run provisioning: default admin, system pages, welcome post.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::access::{
    compose_curated_feed, resolve_page_access, resolve_post_access, AccessDecision, Grant,
    GrantSet, GRANT_TTL_SECS,
};
use crate::content::{ContactMessage, Page, PageKind, Post, PushRegistration, Subscriber};
use crate::error::AppError;
use crate::identity::{verify_password, EntityKind, SessionManager, UnlockOutcome};
use crate::notify::PushTransport;
use crate::storage::SharedStore;
use crate::{security, slug};

pub mod admin;

const SESSION_COOKIE: &str = "atelier_session";
/// Admin session cookie lifetime: five days, matching the session TTL.
const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 5;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub db_root: String,
    pub sessions: Arc<SessionManager>,
    pub push: PushTransport,
    /// Mark cookies Secure; switched off for local development.
    pub secure_cookies: bool,
}

/// Start the atelier HTTP server bound to the given port.
///
/// Ensures the data root and default admin exist, seeds the system pages and
/// a welcome post on first run, and mounts all routes.
pub async fn run_with_config(
    http_port: u16,
    db_root: &str,
    push_endpoint: Option<String>,
    secure_cookies: bool,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(db_root)
        .with_context(|| format!("Failed to create or access data root: {}", db_root))?;
    security::ensure_default_admin(db_root)
        .with_context(|| format!("While ensuring default admin under db_root: {}", db_root))?;
    let store = SharedStore::new(db_root)
        .with_context(|| format!("While creating SharedStore with root: {}", db_root))?;

    {
        let guard = store.0.lock();
        ensure_system_pages(&guard)?;
        if guard.has_no_posts()? {
            if let Err(e) = create_welcome_post(&guard) {
                tracing::warn!("Failed to create welcome post: {}", e);
            }
        }
    }

    let app_state = AppState {
        store: store.clone(),
        db_root: db_root.to_string(),
        sessions: Arc::new(SessionManager::default()),
        push: PushTransport::from_endpoint(push_endpoint),
        secure_cookies,
    };

    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let http_port: u16 = std::env::var("ATELIER_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(7880);
    let db_root = std::env::var("ATELIER_DB_FOLDER").unwrap_or_else(|_| "site-data".to_string());
    let push_endpoint = std::env::var("ATELIER_PUSH_ENDPOINT").ok();
    let dev = std::env::var("ATELIER_DEV").map(|v| v == "1" || v == "true").unwrap_or(false);
    run_with_config(http_port, &db_root, push_endpoint, !dev).await
}

/// Mount all public and admin routes onto the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/posts/{slug}", get(post_view))
        .route("/pages/{slug}", get(page_view))
        .route("/tags", get(tag_index))
        .route("/tags/{tag}", get(tag_feed))
        .route("/resume", get(resume_view))
        .route("/contact", post(contact_submit))
        .route("/subscribe", post(subscribe))
        .route("/unlock/post/{id}", post(unlock_post))
        .route("/unlock/page/{id}", post(unlock_page))
        .route("/push/register", post(push_register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/admin/posts", get(admin::list_posts).post(admin::create_post))
        .route(
            "/admin/posts/{id}",
            get(admin::get_post).put(admin::update_post).delete(admin::delete_post),
        )
        .route("/admin/pages", get(admin::list_pages).post(admin::save_page))
        .route("/admin/pages/{id}", get(admin::get_page).delete(admin::delete_page))
        .route("/admin/settings", get(admin::get_settings).put(admin::update_settings))
        .route("/admin/resume", get(admin::get_resume).put(admin::update_resume))
        .route("/admin/subscribers", get(admin::list_subscribers))
        .route("/admin/subscribers/delete", post(admin::delete_subscribers))
        .route("/admin/messages", get(admin::list_messages))
        .route("/admin/messages/delete", post(admin::delete_messages))
        .route("/admin/notifications/send", post(admin::send_notification))
        .with_state(state)
}

// --- First-run provisioning ---

/// Seed the well-known system pages when missing. Ids are stable so admin
/// edits to their content survive restarts.
pub fn ensure_system_pages(store: &crate::storage::Store) -> anyhow::Result<()> {
    let existing = store.list_pages()?;
    let system = [
        ("home", "", "Home", 0, ""),
        ("resume", "resume", "Resume", 1, ""),
        ("contact", "contact", "Contact", 2, ""),
        (
            "resources",
            "resources",
            "Resources",
            3,
            "# Resources\n\nExplore the latest articles and resources.",
        ),
    ];
    for (id, slug, title, order, content) in system {
        if existing.iter().any(|p| p.id == id) {
            continue;
        }
        info!("Seeding system page: {}", title);
        store.save_page(&Page {
            id: id.to_string(),
            slug: slug.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            kind: PageKind::Page,
            external_url: None,
            in_sidebar: true,
            order,
            is_system: true,
            post_ids: Vec::new(),
            is_protected: false,
            password: None,
            password_hint_link: None,
            last_updated: Some(Utc::now()),
        })?;
    }
    Ok(())
}

/// Publish a short welcome post so a fresh install renders a non-empty feed.
fn create_welcome_post(store: &crate::storage::Store) -> anyhow::Result<()> {
    info!("Empty startup detected, creating welcome post");
    let title = "Welcome to your new site";
    store.save_post(&Post {
        id: uuid::Uuid::new_v4().to_string(),
        slug: slug::slugify(title),
        title: title.to_string(),
        excerpt: "Your site is up and running.".to_string(),
        content: "## Hello\n\nLog in to the admin dashboard to write your first post."
            .to_string(),
        status: crate::content::PostStatus::Published,
        date: Utc::now(),
        tags: vec!["meta".to_string()],
        pinned: false,
        is_listed: true,
        is_protected: false,
        password: None,
        password_hint_link: None,
    })?;
    Ok(())
}

// --- Cookie helpers ---

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

/// Collect the visitor's unlock grants from their cookie names. Only
/// presence matters; values are opaque markers.
fn grant_set_from_headers(headers: &HeaderMap) -> GrantSet {
    let mut set = GrantSet::new();
    if let Some(cookie) = headers.get("cookie").or_else(|| headers.get("Cookie")) {
        if let Ok(s) = cookie.to_str() {
            for part in s.split(';') {
                let p = part.trim();
                if let Some(eq) = p.find('=') {
                    let (name, _) = p.split_at(eq);
                    if let Some(grant) = Grant::parse(name) {
                        set.insert(grant);
                    }
                }
            }
        }
    }
    set
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

fn set_session_cookie(sid: &str, secure: bool) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        SESSION_COOKIE,
        sid,
        SESSION_MAX_AGE_SECS,
        secure_suffix(secure)
    ))
    .unwrap()
}

fn clear_session_cookie(secure: bool) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/{}",
        SESSION_COOKIE,
        secure_suffix(secure)
    ))
    .unwrap()
}

/// Grant cookies are SameSite=Lax so a hint link back into the site still
/// carries the unlock.
fn set_grant_cookie(grant: &Grant, secure: bool) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=granted; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        grant.cookie_name(),
        GRANT_TTL_SECS,
        secure_suffix(secure)
    ))
    .unwrap()
}

pub(crate) fn get_sid_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

pub(crate) fn app_error_response(err: &AppError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({"status":"error","code": err.code_str(), "message": err.message()})),
    )
}

fn internal_error(e: anyhow::Error) -> (StatusCode, Json<serde_json::Value>) {
    error!("request failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status":"error","code":"internal_error","message":"internal server error"})),
    )
}

// --- Public content handlers ---

/// Feed entry view: enough to render a card, never the body or the secret.
fn feed_item(post: &Post) -> serde_json::Value {
    json!({
        "id": post.id,
        "slug": post.slug,
        "title": post.title,
        "excerpt": post.excerpt,
        "date": post.date,
        "tags": post.tags,
        "pinned": post.pinned,
        "is_protected": post.is_protected,
    })
}

async fn home(State(state): State<AppState>) -> impl IntoResponse {
    let guard = state.store.0.lock();
    let settings = match guard.get_settings() {
        Ok(s) => s,
        Err(e) => return internal_error(e),
    };
    let posts = match guard.list_posts() {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    drop(guard);

    // Published and listed only; pinned entries first, newest-first within
    // each group (list_posts is already newest-first).
    let mut visible: Vec<&Post> = posts.iter().filter(|p| p.is_publicly_listed()).collect();
    visible.sort_by_key(|p| !p.pinned);
    let feed: Vec<serde_json::Value> = visible.iter().map(|p| feed_item(p)).collect();

    (StatusCode::OK, Json(json!({"status":"ok","settings": settings, "posts": feed})))
}

async fn post_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let guard = state.store.0.lock();
    let post = match guard.get_post_by_slug(&slug) {
        Ok(Some(p)) => p,
        Ok(None) => return app_error_response(&AppError::not_found("post_not_found", "no such post")),
        Err(e) => return internal_error(e),
    };
    // A vanished page between this read and resolution is simply absent from
    // the snapshot: resolution proceeds with the post's own lock only.
    let pages = guard.list_pages().unwrap_or_default();
    drop(guard);

    let grants = grant_set_from_headers(&headers);
    match resolve_post_access(&post, &pages, &grants) {
        AccessDecision::Allow => (
            StatusCode::OK,
            Json(json!({"status":"ok","locked": false, "post": post.without_secret()})),
        ),
        AccessDecision::Deny { hint_link } => (
            StatusCode::OK,
            Json(json!({
                "status":"ok",
                "locked": true,
                "id": post.id,
                "slug": post.slug,
                "title": post.title,
                "hint_link": hint_link,
            })),
        ),
    }
}

async fn page_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let guard = state.store.0.lock();
    let page = match guard.get_page_by_slug(&slug) {
        Ok(Some(p)) => p,
        Ok(None) => return app_error_response(&AppError::not_found("page_not_found", "no such page")),
        Err(e) => return internal_error(e),
    };
    let posts = match guard.list_posts() {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    drop(guard);

    let grants = grant_set_from_headers(&headers);
    match resolve_page_access(&page, &grants) {
        AccessDecision::Allow => {
            let feed: Vec<serde_json::Value> =
                compose_curated_feed(&page, &posts).iter().map(feed_item).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "status":"ok",
                    "locked": false,
                    "page": page.without_secret(),
                    "feed": feed,
                })),
            )
        }
        AccessDecision::Deny { hint_link } => (
            StatusCode::OK,
            Json(json!({
                "status":"ok",
                "locked": true,
                "id": page.id,
                "slug": page.slug,
                "title": page.title,
                "hint_link": hint_link,
            })),
        ),
    }
}

async fn tag_index(State(state): State<AppState>) -> impl IntoResponse {
    let guard = state.store.0.lock();
    let posts = match guard.list_posts() {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    drop(guard);

    let mut tags: Vec<String> = posts
        .iter()
        .filter(|p| p.is_publicly_listed())
        .flat_map(|p| p.tags.iter())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    (StatusCode::OK, Json(json!({"status":"ok","tags": tags})))
}

async fn tag_feed(State(state): State<AppState>, Path(tag): Path<String>) -> impl IntoResponse {
    let guard = state.store.0.lock();
    let posts = match guard.list_posts() {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    drop(guard);

    let feed: Vec<serde_json::Value> = posts
        .iter()
        .filter(|p| p.is_publicly_listed())
        .filter(|p| p.tags.iter().any(|t| t.trim() == tag))
        .map(feed_item)
        .collect();
    (StatusCode::OK, Json(json!({"status":"ok","tag": tag, "posts": feed})))
}

async fn resume_view(State(state): State<AppState>) -> impl IntoResponse {
    let guard = state.store.0.lock();
    match guard.get_resume() {
        Ok(resume) => (StatusCode::OK, Json(json!({"status":"ok","resume": resume}))),
        Err(e) => internal_error(e),
    }
}

// --- Forms ---

#[derive(Debug, Deserialize)]
struct ContactPayload {
    first_name: String,
    last_name: String,
    email: String,
    message: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

async fn contact_submit(
    State(state): State<AppState>,
    Json(payload): Json<ContactPayload>,
) -> impl IntoResponse {
    if payload.first_name.trim().is_empty()
        || payload.last_name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.message.trim().is_empty()
    {
        return app_error_response(&AppError::user("missing_fields", "missing required fields"));
    }
    let msg = ContactMessage {
        id: uuid::Uuid::new_v4().to_string(),
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone: payload.phone.filter(|p| !p.is_empty()),
        category: payload.category.filter(|c| !c.is_empty()),
        message: payload.message,
        submitted_at: Utc::now(),
    };
    let guard = state.store.0.lock();
    match guard.save_message(&msg) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","id": msg.id}))),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct SubscribePayload {
    email: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribePayload>,
) -> impl IntoResponse {
    let email = payload.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return app_error_response(&AppError::user("invalid_email", "invalid email"));
    }
    if payload.name.trim().is_empty() {
        return app_error_response(&AppError::user("missing_name", "name is required"));
    }

    let guard = state.store.0.lock();
    match guard.find_subscriber_by_email(&email) {
        Ok(Some(_)) => {
            return app_error_response(&AppError::conflict("already_subscribed", "already subscribed"))
        }
        Ok(None) => {}
        Err(e) => return internal_error(e),
    }
    let sub = Subscriber {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name: payload.name,
        phone: payload.phone.filter(|p| !p.is_empty()),
        subscribed_at: Utc::now(),
    };
    match guard.save_subscriber(&sub) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","id": sub.id}))),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct PushRegisterPayload {
    token: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn push_register(
    State(state): State<AppState>,
    Json(payload): Json<PushRegisterPayload>,
) -> impl IntoResponse {
    if payload.token.trim().is_empty() {
        return app_error_response(&AppError::user("missing_token", "token is required"));
    }
    let reg = PushRegistration {
        token: payload.token,
        user_id: payload.user_id.filter(|u| !u.is_empty()),
        updated_at: Utc::now(),
    };
    let guard = state.store.0.lock();
    match guard.save_push_registration(&reg) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(e) => internal_error(e),
    }
}

// --- Unlock ---

#[derive(Debug, Deserialize)]
struct UnlockPayload {
    password: String,
}

fn unlock_response(
    state: &AppState,
    outcome: Result<UnlockOutcome, AppError>,
) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    match outcome {
        Ok(UnlockOutcome::Unlocked { grant }) => {
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_grant_cookie(&grant, state.secure_cookies));
            (
                StatusCode::OK,
                headers,
                Json(json!({"status":"ok","granted": grant.cookie_name()})),
            )
        }
        // NotProtected deliberately mirrors IncorrectPassword so protection
        // state cannot be probed.
        Ok(UnlockOutcome::IncorrectPassword) | Ok(UnlockOutcome::NotProtected) => (
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Json(json!({"status":"error","code":"incorrect_password","message":"incorrect password"})),
        ),
        Err(e) => {
            let (status, body) = app_error_response(&e);
            (status, HeaderMap::new(), body)
        }
    }
}

async fn unlock_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UnlockPayload>,
) -> impl IntoResponse {
    let outcome = {
        let guard = state.store.0.lock();
        verify_password(&guard, EntityKind::Post, &id, &payload.password)
    };
    unlock_response(&state, outcome)
}

async fn unlock_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UnlockPayload>,
) -> impl IntoResponse {
    let outcome = {
        let guard = state.store.0.lock();
        verify_password(&guard, EntityKind::Page, &id, &payload.password)
    };
    unlock_response(&state, outcome)
}

// --- Admin authentication ---

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match security::authenticate(&state.db_root, &payload.username, &payload.password) {
        Ok(true) => {
            let sess = state.sessions.issue(&payload.username);
            let mut headers = HeaderMap::new();
            headers.insert(
                "Set-Cookie",
                set_session_cookie(&sess.session_id, state.secure_cookies),
            );
            (StatusCode::OK, headers, Json(json!({"status":"ok"})))
        }
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Json(json!({"status":"unauthorized"})),
        ),
        Err(e) => {
            error!("login error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HeaderMap::new(),
                Json(json!({"status":"error","error": e.to_string()})),
            )
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !validate_csrf(&state, &headers) {
        return (
            StatusCode::FORBIDDEN,
            HeaderMap::new(),
            Json(json!({"status":"forbidden","error":"invalid csrf"})),
        );
    }
    if let Some(sid) = get_sid_from_headers(&headers) {
        state.sessions.logout(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie(state.secure_cookies));
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(sess) = get_session(&state, &headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})));
    };
    (StatusCode::OK, Json(json!({"status":"ok","csrf": sess.csrf_token})))
}

pub(crate) fn get_session(state: &AppState, headers: &HeaderMap) -> Option<crate::identity::Session> {
    let sid = get_sid_from_headers(headers)?;
    state.sessions.validate(&sid)
}

pub(crate) fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(sid) = get_sid_from_headers(headers) else { return false };
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    state.sessions.csrf_matches(&sid, provided)
}
