//! Applies the SQL under `scripts/pg` at startup: `schema`, then `indexes`, then optional `seed`.
//!
//! Every script is idempotent, so the whole set runs on each boot.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use shared::config::server::DatabaseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Schema,
    Indexes,
    /// Development fixtures such as directory profiles.
    Seed,
}

impl Stage {
    const ORDER: [Stage; 3] = [Stage::Schema, Stage::Indexes, Stage::Seed];

    const fn dir(self) -> &'static str {
        match self {
            Stage::Schema => "schema",
            Stage::Indexes => "indexes",
            Stage::Seed => "seed",
        }
    }

    const fn optional(self) -> bool {
        matches!(self, Stage::Seed)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database bootstrap directory does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("required bootstrap stage '{stage}' missing at {path}")]
    MissingStage { stage: &'static str, path: PathBuf },
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bootstrap script {path} failed: {source}")]
    Sql {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
}

/// Scripts to run, in execution order.
#[derive(Debug, Default)]
struct Plan {
    scripts: Vec<(Stage, PathBuf)>,
}

impl Plan {
    /// Resolves every script before the database is touched, so layout errors fail fast.
    fn discover(root: &Path) -> Result<Self, BootstrapError> {
        if !root.is_dir() {
            return Err(BootstrapError::MissingRoot(root.to_path_buf()));
        }

        let mut plan = Self::default();
        for stage in Stage::ORDER {
            let dir = root.join(stage.dir());
            if !dir.is_dir() {
                if stage.optional() {
                    debug!(stage = stage.dir(), "optional bootstrap stage absent");
                    continue;
                }
                return Err(BootstrapError::MissingStage {
                    stage: stage.dir(),
                    path: dir,
                });
            }
            plan.scripts
                .extend(sql_files(&dir)?.into_iter().map(|path| (stage, path)));
        }
        Ok(plan)
    }

    async fn apply(&self, pool: &PgPool) -> Result<usize, BootstrapError> {
        let mut applied = 0;
        for (stage, path) in &self.scripts {
            let sql = fs::read_to_string(path).map_err(|source| BootstrapError::Io {
                path: path.clone(),
                source,
            })?;
            let sql = sql.trim();
            if sql.is_empty() {
                warn!(path = %path.display(), "skipping empty bootstrap script");
                continue;
            }

            debug!(stage = stage.dir(), script = %path.display(), "executing bootstrap script");
            let sql_error = |source| BootstrapError::Sql {
                path: path.clone(),
                source,
            };
            let mut tx = pool.begin().await.map_err(sql_error)?;
            // Multi-statement scripts need the simple query protocol.
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(sql_error)?;
            tx.commit().await.map_err(sql_error)?;
            applied += 1;
        }
        Ok(applied)
    }
}

fn sql_files(dir: &Path) -> Result<Vec<PathBuf>, BootstrapError> {
    let io_error = |source| BootstrapError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_sql = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if is_sql {
            files.push(path);
        }
    }
    // Numeric prefixes (001_, 010_) define the order within a stage.
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs every bootstrap script found under the configured directory.
pub async fn run(pool: &PgPool, config: &DatabaseConfig) -> Result<(), BootstrapError> {
    let root = &config.bootstrap_path;
    let plan = Plan::discover(root)?;
    info!(path = %root.display(), scripts = plan.scripts.len(), "running database bootstrap");
    let applied = plan.apply(pool).await?;
    info!(applied, "database bootstrap complete");
    Ok(())
}

/// Simple liveness check used during startup.
pub async fn ensure_liveness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Readiness check: the chat tables must exist and answer.
pub async fn ensure_readiness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM huddle.conversations LIMIT 1")
        .execute(pool)
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(plan: &Plan) -> Vec<String> {
        plan.scripts
            .iter()
            .map(|(_, path)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn plan_orders_stages_then_file_names() {
        let dir = tempdir().unwrap();
        for stage in ["schema", "indexes"] {
            fs::create_dir(dir.path().join(stage)).unwrap();
        }
        fs::write(dir.path().join("schema/010_b.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("schema/001_a.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("schema/README.txt"), "ignored").unwrap();
        fs::write(dir.path().join("indexes/001_idx.SQL"), "SELECT 1;").unwrap();

        let plan = Plan::discover(dir.path()).unwrap();
        assert_eq!(names(&plan), ["001_a.sql", "010_b.sql", "001_idx.SQL"]);
        assert_eq!(plan.scripts[2].0, Stage::Indexes);
    }

    #[test]
    fn missing_root_and_required_stage_are_reported() {
        assert!(matches!(
            Plan::discover(Path::new("/definitely/not/here")),
            Err(BootstrapError::MissingRoot(_))
        ));

        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("schema")).unwrap();
        match Plan::discover(dir.path()) {
            Err(BootstrapError::MissingStage { stage, .. }) => assert_eq!(stage, "indexes"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn shipped_scripts_cover_required_stages() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../scripts/pg");
        let plan = Plan::discover(&root).unwrap();
        for stage in Stage::ORDER.into_iter().filter(|stage| !stage.optional()) {
            assert!(
                plan.scripts.iter().any(|(s, _)| *s == stage),
                "no scripts for {}",
                stage.dir()
            );
        }
    }
}
