//! Admin CRUD handlers: posts, pages, settings, resume, subscribers,
//! messages and the push-notification sender. Every handler requires a valid
//! admin session; mutating handlers additionally require the session's CSRF
//! token in `x-csrf-token`.

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::content::{Page, PageKind, Post, PostStatus, Resume, SiteSettings};
use crate::error::AppError;
use crate::server::{app_error_response, get_session, validate_csrf, AppState};
use crate::slug::slugify;

fn default_true() -> bool { true }

type Reject = (StatusCode, Json<serde_json::Value>);

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Reject> {
    match get_session(state, headers) {
        Some(_) => Ok(()),
        None => Err((StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})))),
    }
}

fn require_admin_mutation(state: &AppState, headers: &HeaderMap) -> Result<(), Reject> {
    require_admin(state, headers)?;
    if !validate_csrf(state, headers) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"status":"forbidden","error":"invalid csrf"})),
        ));
    }
    Ok(())
}

fn store_error(e: anyhow::Error) -> Reject {
    error!("admin store error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status":"error","code":"internal_error","message":"internal server error"})),
    )
}

// --- Posts ---

#[derive(Debug, Deserialize)]
pub struct PostPayload {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    pub status: PostStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "default_true")]
    pub is_listed: bool,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hint_link: Option<String>,
    /// Optional explicit slug; derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub async fn list_posts(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.list_posts() {
        Ok(posts) => (StatusCode::OK, Json(json!({"status":"ok","posts": posts}))),
        Err(e) => store_error(e),
    }
}

pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.get_post(&id) {
        Ok(Some(post)) => (StatusCode::OK, Json(json!({"status":"ok","post": post}))),
        Ok(None) => app_error_response(&AppError::not_found("post_not_found", "no such post")),
        Err(e) => store_error(e),
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PostPayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    if payload.title.trim().is_empty() {
        return app_error_response(&AppError::user("missing_title", "title is required"));
    }
    let slug = payload
        .slug
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| slugify(&payload.title));
    let post = Post {
        id: uuid::Uuid::new_v4().to_string(),
        slug,
        title: payload.title,
        excerpt: payload.excerpt,
        content: payload.content,
        status: payload.status,
        date: Utc::now(),
        tags: clean_tags(payload.tags),
        pinned: payload.pinned,
        is_listed: payload.is_listed,
        is_protected: payload.is_protected,
        password: payload.password.filter(|p| !p.is_empty()),
        password_hint_link: payload.password_hint_link.filter(|h| !h.is_empty()),
    };
    let guard = state.store.0.lock();
    match guard.save_post(&post) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","post": post}))),
        Err(e) => store_error(e),
    }
}

pub async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<PostPayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    if payload.title.trim().is_empty() {
        return app_error_response(&AppError::user("missing_title", "title is required"));
    }
    let guard = state.store.0.lock();
    let existing = match guard.get_post(&id) {
        Ok(Some(p)) => p,
        Ok(None) => return app_error_response(&AppError::not_found("post_not_found", "no such post")),
        Err(e) => return store_error(e),
    };
    // The original publication date survives edits.
    let post = Post {
        id: existing.id,
        slug: payload
            .slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or(existing.slug),
        title: payload.title,
        excerpt: payload.excerpt,
        content: payload.content,
        status: payload.status,
        date: existing.date,
        tags: clean_tags(payload.tags),
        pinned: payload.pinned,
        is_listed: payload.is_listed,
        is_protected: payload.is_protected,
        password: payload.password.filter(|p| !p.is_empty()),
        password_hint_link: payload.password_hint_link.filter(|h| !h.is_empty()),
    };
    match guard.save_post(&post) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","post": post}))),
        Err(e) => store_error(e),
    }
}

pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.delete_post(&id) {
        Ok(true) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Ok(false) => app_error_response(&AppError::not_found("post_not_found", "no such post")),
        Err(e) => store_error(e),
    }
}

// --- Pages ---

#[derive(Debug, Deserialize)]
pub struct PagePayload {
    /// Absent for new pages.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: PageKind,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub in_sidebar: bool,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hint_link: Option<String>,
}

pub async fn list_pages(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.list_pages() {
        Ok(pages) => (StatusCode::OK, Json(json!({"status":"ok","pages": pages}))),
        Err(e) => store_error(e),
    }
}

pub async fn get_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.get_page(&id) {
        Ok(Some(page)) => (StatusCode::OK, Json(json!({"status":"ok","page": page}))),
        Ok(None) => app_error_response(&AppError::not_found("page_not_found", "no such page")),
        Err(e) => store_error(e),
    }
}

/// Create or replace a page. System pages keep their flag regardless of the
/// payload so they cannot be demoted by an edit.
pub async fn save_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PagePayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    if payload.title.trim().is_empty() {
        return app_error_response(&AppError::user("missing_title", "title is required"));
    }
    let guard = state.store.0.lock();
    let (id, is_system) = match payload.id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => match guard.get_page(id) {
            Ok(Some(existing)) => (existing.id, existing.is_system),
            Ok(None) => (id.to_string(), false),
            Err(e) => return store_error(e),
        },
        None => (uuid::Uuid::new_v4().to_string(), false),
    };
    // Non-system pages need a routable slug; the system home page keeps "".
    if payload.slug.trim().is_empty() && !is_system {
        return app_error_response(&AppError::user("missing_slug", "slug is required"));
    }
    let page = Page {
        id,
        slug: payload.slug,
        title: payload.title,
        content: payload.content,
        kind: payload.kind,
        external_url: payload.external_url.filter(|u| !u.is_empty()),
        in_sidebar: payload.in_sidebar,
        order: payload.order,
        is_system,
        post_ids: payload.post_ids,
        is_protected: payload.is_protected,
        password: payload.password.filter(|p| !p.is_empty()),
        password_hint_link: payload.password_hint_link.filter(|h| !h.is_empty()),
        last_updated: Some(Utc::now()),
    };
    match guard.save_page(&page) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","page": page}))),
        Err(e) => store_error(e),
    }
}

pub async fn delete_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.get_page(&id) {
        Ok(Some(page)) if page.is_system => {
            app_error_response(&AppError::conflict("system_page", "system pages cannot be deleted"))
        }
        Ok(Some(_)) => match guard.delete_page(&id) {
            Ok(_) => (StatusCode::OK, Json(json!({"status":"ok"}))),
            Err(e) => store_error(e),
        },
        Ok(None) => app_error_response(&AppError::not_found("page_not_found", "no such page")),
        Err(e) => store_error(e),
    }
}

// --- Settings & resume ---

pub async fn get_settings(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.get_settings() {
        Ok(settings) => (StatusCode::OK, Json(json!({"status":"ok","settings": settings}))),
        Err(e) => store_error(e),
    }
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<SiteSettings>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    if settings.global_title.trim().is_empty() || settings.global_description.trim().is_empty() {
        return app_error_response(&AppError::user(
            "missing_fields",
            "title and description are required",
        ));
    }
    let guard = state.store.0.lock();
    match guard.save_settings(&settings) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(e) => store_error(e),
    }
}

pub async fn get_resume(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.get_resume() {
        Ok(resume) => (StatusCode::OK, Json(json!({"status":"ok","resume": resume}))),
        Err(e) => store_error(e),
    }
}

pub async fn update_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(resume): Json<Resume>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.save_resume(&resume) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(e) => store_error(e),
    }
}

// --- Subscribers & messages ---

#[derive(Debug, Deserialize)]
pub struct BulkDeletePayload {
    pub ids: Vec<String>,
}

pub async fn list_subscribers(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.list_subscribers() {
        Ok(subs) => (StatusCode::OK, Json(json!({"status":"ok","subscribers": subs}))),
        Err(e) => store_error(e),
    }
}

pub async fn delete_subscribers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BulkDeletePayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    let mut deleted = 0usize;
    for id in &payload.ids {
        match guard.delete_subscriber(id) {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => return store_error(e),
        }
    }
    (StatusCode::OK, Json(json!({"status":"ok","deleted": deleted})))
}

pub async fn list_messages(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(r) = require_admin(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    match guard.list_messages() {
        Ok(msgs) => (StatusCode::OK, Json(json!({"status":"ok","messages": msgs}))),
        Err(e) => store_error(e),
    }
}

pub async fn delete_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BulkDeletePayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    let guard = state.store.0.lock();
    let mut deleted = 0usize;
    for id in &payload.ids {
        match guard.delete_message(id) {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => return store_error(e),
        }
    }
    (StatusCode::OK, Json(json!({"status":"ok","deleted": deleted})))
}

// --- Push notifications ---

#[derive(Debug, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default)]
    pub target_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn send_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NotificationPayload>,
) -> impl IntoResponse {
    if let Err(r) = require_admin_mutation(&state, &headers) {
        return r;
    }
    if payload.title.trim().is_empty() || payload.body.trim().is_empty() {
        return app_error_response(&AppError::user("missing_fields", "title and body are required"));
    }
    if !state.push.is_enabled() {
        return app_error_response(&AppError::io("push_disabled", "push transport not configured"));
    }

    // Resolve targets under the lock, then release it before the send.
    let tokens: Vec<String> = {
        let guard = state.store.0.lock();
        if payload.broadcast {
            let regs = match guard.list_push_registrations() {
                Ok(r) => r,
                Err(e) => return store_error(e),
            };
            let mut seen = HashSet::new();
            regs.into_iter()
                .map(|r| r.token)
                .filter(|t| !t.is_empty() && seen.insert(t.clone()))
                .collect()
        } else if let Some(token) = payload.target_token.as_deref().filter(|t| !t.is_empty()) {
            vec![token.to_string()]
        } else if let Some(user) = payload.user_id.as_deref().filter(|u| !u.is_empty()) {
            match guard.latest_token_for_user(user) {
                Ok(Some(token)) => vec![token],
                Ok(None) => Vec::new(),
                Err(e) => return store_error(e),
            }
        } else {
            return app_error_response(&AppError::user(
                "missing_target",
                "target token or user id not provided",
            ));
        }
    };
    if tokens.is_empty() {
        return app_error_response(&AppError::not_found(
            "no_devices",
            "no registered devices found",
        ));
    }

    let report = match state.push.send(&payload.title, &payload.body, &tokens).await {
        Ok(r) => r,
        Err(e) => {
            error!("push send failed: {e}");
            return app_error_response(&AppError::io("push_failed", e.to_string()));
        }
    };

    // Registrations the endpoint declared dead are pruned immediately.
    if !report.invalid_tokens.is_empty() {
        let guard = state.store.0.lock();
        for token in &report.invalid_tokens {
            if let Err(e) = guard.delete_push_registration(token) {
                error!("failed to prune push token: {e}");
            }
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status":"ok",
            "message": format!("Sent to {} devices. Failed: {}", report.success, report.failure),
            "report": report,
        })),
    )
}
