//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::credentials::{CredentialError, Credentials, NewUser};
use crate::db::{Database, UserRole};
use crate::rate_limit::DEFAULT_LOGIN_PER_MINUTE;
use crate::validation::{validate_email, validate_password, validate_username};
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Quillgate",
    about = "Token authentication and role-based access control service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "QUILLGATE_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "QUILLGATE_DATABASE", default_value = "quillgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on token cookies (enable when served over HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub login_rate_per_minute: u32,

    /// bcrypt work factor for new password hashes
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Create an admin from ADMIN_USERNAME / ADMIN_PASSWORD (and optional ADMIN_EMAIL) on startup
    #[arg(long)]
    pub create_admin: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: called during startup before any task is spawned, and
        // nothing else reads this variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Result of a `--create-admin` run.
#[derive(Debug, PartialEq, Eq)]
pub enum CreateAdminOutcome {
    /// A new admin was created with this UUID
    Created(String),
    /// The username is already taken; nothing was changed
    AlreadyExists,
}

/// Create an admin account unless the username already exists.
pub async fn create_admin(
    credentials: &Credentials,
    db: &Database,
    username: &str,
    email: &str,
    password: &str,
) -> Result<CreateAdminOutcome, String> {
    let problems: Vec<String> = validate_username(username)
        .into_iter()
        .chain(validate_email(email))
        .chain(validate_password(password))
        .collect();
    if !problems.is_empty() {
        return Err(problems.join(" "));
    }

    let taken = db
        .users()
        .is_username_taken(username)
        .await
        .map_err(|e| format!("Failed to check for existing admin: {}", e))?;
    if taken {
        return Ok(CreateAdminOutcome::AlreadyExists);
    }

    let uuid = Uuid::new_v4().to_string();
    match credentials
        .register(
            NewUser {
                uuid: &uuid,
                username,
                email,
                role: UserRole::Admin,
            },
            password,
        )
        .await
    {
        Ok(_) => Ok(CreateAdminOutcome::Created(uuid)),
        Err(CredentialError::Duplicate) => Ok(CreateAdminOutcome::AlreadyExists),
        Err(e) => Err(format!("Failed to create admin user: {}", e)),
    }
}

/// Handle the --create-admin flag using credentials from the environment.
/// Exits the process if the admin cannot be created.
pub async fn handle_create_admin(credentials: &Credentials, db: &Database) {
    let (Ok(username), Ok(password)) = (
        std::env::var("ADMIN_USERNAME"),
        std::env::var("ADMIN_PASSWORD"),
    ) else {
        error!("--create-admin requires ADMIN_USERNAME and ADMIN_PASSWORD");
        std::process::exit(1);
    };
    let email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| format!("{}@admin.invalid", username));

    match create_admin(credentials, db, &username, &email, &password).await {
        Ok(CreateAdminOutcome::Created(uuid)) => {
            info!(username = %username, user = %uuid, "Admin user created");
        }
        Ok(CreateAdminOutcome::AlreadyExists) => {
            info!(username = %username, "Admin user already exists, skipping");
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies: args.secure_cookies,
        trust_proxy: args.trust_proxy,
        login_rate_per_minute: args.login_rate_per_minute,
        bcrypt_cost: args.bcrypt_cost,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["quillgate"]).unwrap();
        assert_eq!(args.port, 7291);
        assert_eq!(args.login_rate_per_minute, DEFAULT_LOGIN_PER_MINUTE);
        assert_eq!(args.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(!args.secure_cookies);
        assert!(!args.create_admin);
    }

    #[test]
    fn test_args_reject_bad_cost() {
        assert!(Args::try_parse_from(["quillgate", "--bcrypt-cost", "3"]).is_err());
        assert!(Args::try_parse_from(["quillgate", "--bcrypt-cost", "32"]).is_err());
        assert!(Args::try_parse_from(["quillgate", "--login-rate-per-minute", "0"]).is_err());
    }

    #[tokio::test]
    async fn test_build_config() {
        let args = Args::try_parse_from([
            "quillgate",
            "--secure-cookies",
            "--trust-proxy",
            "--bcrypt-cost",
            "10",
        ])
        .unwrap();
        let db = Database::open(":memory:").await.unwrap();

        let config = build_config(&args, db, "s".repeat(32));
        assert!(config.secure_cookies);
        assert!(config.trust_proxy);
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.jwt_secret.len(), 32);
    }

    #[tokio::test]
    async fn test_create_admin_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let credentials = Credentials::new(db.clone(), 4);

        let first = create_admin(&credentials, &db, "admin", "admin@example.com", "Secret123!")
            .await
            .unwrap();
        let CreateAdminOutcome::Created(uuid) = first else {
            panic!("expected a new admin");
        };
        let user = db.users().get_by_uuid(&uuid).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Admin);

        let second = create_admin(&credentials, &db, "admin", "other@example.com", "Secret123!")
            .await
            .unwrap();
        assert_eq!(second, CreateAdminOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_create_admin_enforces_password_policy() {
        let db = Database::open(":memory:").await.unwrap();
        let credentials = Credentials::new(db.clone(), 4);

        let err = create_admin(&credentials, &db, "admin", "admin@example.com", "weak")
            .await
            .unwrap_err();
        assert!(err.contains("at least 8 characters"));
        assert!(db.users().get_by_username("admin").await.unwrap().is_none());
    }
}
