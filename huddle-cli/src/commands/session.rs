use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Args;
use directories::BaseDirs;
use uuid::Uuid;

use super::client::{ApiClient, ConnectArgs};

#[derive(Args, Debug)]
pub struct UseArgs {
    /// User id sent with every request made by this CLI.
    pub user: Uuid,
}

/// Remembers `args.user` as the default identity.
pub fn use_identity(args: &UseArgs) -> Result<()> {
    let path = session_path();
    save_identity(&path, args.user)?;
    println!("Acting as {} (saved to {})", args.user, path.display());
    Ok(())
}

pub async fn whoami(args: &ConnectArgs) -> Result<()> {
    let client = ApiClient::connect(args)?;
    let profile = client.me().await?;
    println!("{} ({})", profile.display_name, profile.id);
    if let Some(avatar) = profile.avatar_url {
        println!("avatar: {avatar}");
    }
    Ok(())
}

pub fn clear() -> Result<()> {
    let path = session_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove identity file {}", path.display()))?;
        println!("Removed saved identity at {}", path.display());
    } else {
        println!("No saved identity at {}", path.display());
    }
    Ok(())
}

pub fn session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("huddle").join("identity"))
        .unwrap_or_else(|| PathBuf::from("./huddle.identity"))
}

/// Explicit `--user` wins over the saved identity.
pub fn resolve_identity(explicit: Option<Uuid>) -> Result<Uuid> {
    if let Some(user) = explicit {
        return Ok(user);
    }
    let path = session_path();
    load_identity(&path).with_context(|| {
        format!(
            "no identity given; pass --user or run `huddle session use <user-id>` (looked in {})",
            path.display()
        )
    })
}

fn save_identity(path: &Path, user: Uuid) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, user.to_string())
        .with_context(|| format!("failed to write identity file {}", path.display()))
}

fn load_identity(path: &Path) -> Result<Uuid> {
    if !path.exists() {
        bail!("identity file not found at {}", path.display());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read identity file {}", path.display()))?;
    contents
        .trim()
        .parse()
        .with_context(|| format!("identity file {} does not hold a user id", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identity");
        let user = Uuid::new_v4();

        save_identity(&path, user).unwrap();
        assert_eq!(load_identity(&path).unwrap(), user);
    }

    #[test]
    fn garbage_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity");
        fs::write(&path, "someone").unwrap();

        let err = load_identity(&path).unwrap_err();
        assert!(err.to_string().contains("does not hold a user id"));
        assert!(load_identity(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn explicit_user_wins() {
        let user = Uuid::new_v4();
        assert_eq!(resolve_identity(Some(user)).unwrap(), user);
    }
}
