//! Admin credential store: a single JSON file under the data root holding
//! argon2 password hashes. Content passwords (posts/pages) are a separate
//! mechanism and never pass through here.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "atelier";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub username: String,
    pub password_hash: String,
}

fn admins_path(db_root: &str) -> PathBuf {
    Path::new(db_root).join("admins.json")
}

fn read_admins(path: &Path) -> Result<Vec<AdminUser>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_admins(path: &Path, admins: &[AdminUser]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    std::fs::write(path, serde_json::to_string_pretty(admins)?)?;
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Provision the default admin account on first run. A no-op once the
/// credential file exists, so a changed password is never reset.
pub fn ensure_default_admin(db_root: &str) -> Result<()> {
    let p = admins_path(db_root);
    if p.exists() {
        return Ok(());
    }
    let hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;
    write_admins(
        &p,
        &[AdminUser { username: DEFAULT_ADMIN_USERNAME.to_string(), password_hash: hash }],
    )
}

/// Add or replace an admin account.
pub fn add_admin(db_root: &str, username: &str, password: &str) -> Result<()> {
    let p = admins_path(db_root);
    let mut admins = read_admins(&p)?;
    admins.retain(|a| a.username != username);
    admins.push(AdminUser {
        username: username.to_string(),
        password_hash: hash_password(password)?,
    });
    write_admins(&p, &admins)
}

pub fn authenticate(db_root: &str, username: &str, password: &str) -> Result<bool> {
    let admins = read_admins(&admins_path(db_root))?;
    match admins.iter().find(|a| a.username == username) {
        Some(a) => Ok(verify_password(&a.password_hash, password)),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_admin_provisioned_once() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_str().unwrap();
        ensure_default_admin(root)?;
        assert!(authenticate(root, DEFAULT_ADMIN_USERNAME, "atelier")?);
        assert!(!authenticate(root, DEFAULT_ADMIN_USERNAME, "wrong")?);
        assert!(!authenticate(root, "nobody", "atelier")?);

        // Changing the password must survive a second ensure call.
        add_admin(root, DEFAULT_ADMIN_USERNAME, "rotated")?;
        ensure_default_admin(root)?;
        assert!(authenticate(root, DEFAULT_ADMIN_USERNAME, "rotated")?);
        assert!(!authenticate(root, DEFAULT_ADMIN_USERNAME, "atelier")?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let a = hash_password("same")?;
        let b = hash_password("same")?;
        assert_ne!(a, b);
        assert!(verify_password(&a, "same"));
        assert!(verify_password(&b, "same"));
        assert!(!verify_password(&a, "other"));
        Ok(())
    }
}
