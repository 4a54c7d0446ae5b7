//! Password verification for protected posts and pages.
//!
//! A successful verification mints a `Grant` scoped to the matched entity.
//! For posts there is a second path: when the post's own password does not
//! match, every protected page curating the post is tried, and a page match
//! issues the page grant instead, transitively unlocking the whole curated
//! collection.
//!
//! Content passwords are stored as plain strings for compatibility with the
//! site's existing data; the comparison itself is constant-time. See
//! DESIGN.md for the upgrade notes.

use tracing::warn;

use crate::access::{protecting_parents, Grant};
use crate::error::{AppError, AppResult};
use crate::storage::Store;
use crate::tprintln;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Post,
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked { grant: Grant },
    IncorrectPassword,
    /// No password is configured anywhere for the target. Callers present
    /// this exactly like IncorrectPassword so protection state cannot be
    /// probed.
    NotProtected,
}

/// Comparison whose timing does not depend on where the strings first differ.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut diff = a.len() ^ b.len();
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= (x ^ y) as usize;
    }
    diff == 0
}

/// Validate a submitted password against the target entity and mint the
/// matching grant. Repeated successful calls return an equivalent grant; the
/// caller refreshes the cookie expiry on each issue.
pub fn verify_password(
    store: &Store,
    kind: EntityKind,
    id: &str,
    submitted: &str,
) -> AppResult<UnlockOutcome> {
    match kind {
        EntityKind::Page => {
            let page = store
                .get_page(id)
                .map_err(|e| AppError::internal("store_error", e.to_string()))?
                .ok_or_else(|| AppError::not_found("page_not_found", "no such page"))?;
            match page.password.as_deref() {
                None | Some("") => Ok(UnlockOutcome::NotProtected),
                Some(pw) if constant_time_eq(pw, submitted) => {
                    tprintln!("unlock.page id={}", page.id);
                    Ok(UnlockOutcome::Unlocked { grant: Grant::Page(page.id) })
                }
                Some(_) => Ok(UnlockOutcome::IncorrectPassword),
            }
        }
        EntityKind::Post => {
            let post = store
                .get_post(id)
                .map_err(|e| AppError::internal("store_error", e.to_string()))?
                .ok_or_else(|| AppError::not_found("post_not_found", "no such post"))?;

            // Direct path: the post's own password.
            let own_secret = post
                .password
                .as_deref()
                .filter(|pw| post.is_protected && !pw.is_empty());
            if let Some(pw) = own_secret {
                if constant_time_eq(pw, submitted) {
                    tprintln!("unlock.post id={}", post.id);
                    return Ok(UnlockOutcome::Unlocked { grant: Grant::Post(post.id) });
                }
            }

            // Inherited path: protected pages curating this post. A listing
            // failure degrades to "no parents" rather than failing the
            // request.
            let pages = store.list_pages().unwrap_or_else(|e| {
                warn!(target: "atelier::unlock", "page listing failed during verify: {}", e);
                Vec::new()
            });
            let parents = protecting_parents(&post.id, &pages);
            for parent in &parents {
                if let Some(pw) = parent.password.as_deref().filter(|pw| !pw.is_empty()) {
                    if constant_time_eq(pw, submitted) {
                        tprintln!("unlock.post id={} via page={}", post.id, parent.id);
                        return Ok(UnlockOutcome::Unlocked { grant: Grant::Page(parent.id.clone()) });
                    }
                }
            }

            let any_secret = own_secret.is_some()
                || parents
                    .iter()
                    .any(|p| p.password.as_deref().is_some_and(|pw| !pw.is_empty()));
            if any_secret {
                Ok(UnlockOutcome::IncorrectPassword)
            } else {
                Ok(UnlockOutcome::NotProtected)
            }
        }
    }
}
