//! Configuration loading and resolution.

use std::path::PathBuf;

/// Environment variable naming the database file.
pub const DB_ENV: &str = "FORENSIC_DB";

/// Database file looked for in the working directory.
pub const LOCAL_DB: &str = "forensic_data.db";

/// Resolve the database path: explicit flag, then `FORENSIC_DB`, then
/// `./forensic_data.db` if it exists, then the per-user default.
pub fn resolve_database_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(DB_ENV) {
        if !env_path.trim().is_empty() {
            return env_path;
        }
    }

    let cwd_db = PathBuf::from(LOCAL_DB);
    if cwd_db.exists() {
        return cwd_db.display().to_string();
    }

    resolve_default_database_path()
}

fn resolve_default_database_path() -> String {
    format!("{}/.forensic-query/{LOCAL_DB}", home_dir())
}

/// `$HOME`, `%USERPROFILE%`, or `.` as a last resort.
pub fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(resolve_database_path(Some("/tmp/case.db")), "/tmp/case.db");
    }

    #[test]
    fn test_default_path_is_under_home() {
        assert!(resolve_default_database_path().ends_with("/.forensic-query/forensic_data.db"));
    }
}
