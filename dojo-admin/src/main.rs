use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dojo_server::config::Settings;
use dojo_server::db::repositories::{NewUser, UserRepository};
use dojo_server::db::Database;
use dojo_server::jobs;
use dojo_server::password::{hash_password, MIN_PASSWORD_LEN};
use dojo_server::session::SessionManager;
use dojo_server::validation::is_valid_email;
use dojo_types::{ExpiredOrder, Role, User, UserStatus};

/// Dojo operations utility
///
/// Runs maintenance tasks against the same database the server uses.
#[derive(Parser, Debug)]
#[command(name = "dojo-admin")]
#[command(about = "Maintenance tasks for the Dojo academy database", long_about = None)]
struct Args {
    /// Path to the SQLite database file (defaults to the configured one)
    #[arg(short, long, env = "DATABASE_PATH")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cancel pending orders older than the expiration window
    CancelExpiredOrders {
        /// Age in days after which a pending order expires
        #[arg(long)]
        days: Option<i64>,
    },
    /// Create an active administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Delete expired sessions
    CleanupSessions,
}

/// Open the database and make sure the schema exists
fn open_database(path: &str) -> Result<Database> {
    let db = Database::new(path).with_context(|| format!("Failed to open database {}", path))?;
    db.initialize().context("Failed to initialize database schema")?;
    tracing::info!("Using database {}", path);
    Ok(db)
}

fn cancel_expired_orders(db: &Database, days: i64) -> Result<Vec<ExpiredOrder>> {
    if days < 0 {
        anyhow::bail!("--days cannot be negative");
    }
    let expired = jobs::expire_pending_orders(db, days)?;
    for order in &expired {
        tracing::info!(
            "Order #{} for \"{}\" cancelled. {} unit(s) returned to stock.",
            order.order_id,
            order.item_name,
            order.quantity_returned
        );
    }
    Ok(expired)
}

fn create_admin(
    db: &Database,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<User> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        anyhow::bail!("Invalid email address: {}", email);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        anyhow::bail!("Password must have at least {} characters", MIN_PASSWORD_LEN);
    }
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        anyhow::bail!("First and last name are required");
    }

    let repo = UserRepository::new(db.pool.clone());
    if repo.get_by_email(&email)?.is_some() {
        anyhow::bail!("An account with email {} already exists", email);
    }

    repo.create(&NewUser {
        email,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        birthday: None,
        whatsapp: None,
        role: Role::Admin,
        status: UserStatus::Active,
        password_hash: Some(hash_password(password)),
        responsible_id: None,
    })
    .context("Failed to create admin account")
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dojo_admin=info,dojo_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new().context("Failed to load settings")?;
    let path = args.database.unwrap_or_else(|| settings.database.path.clone());
    let db = open_database(&path)?;

    match args.command {
        Command::CancelExpiredOrders { days } => {
            let days = days.unwrap_or(settings.orders.expiration_days);
            let expired = cancel_expired_orders(&db, days)?;
            println!("{} expired order(s) cancelled.", expired.len());
        }
        Command::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            let admin = create_admin(&db, &email, &password, &first_name, &last_name)?;
            tracing::info!(user_id = %admin.id, "Admin account created");
            println!("Admin {} created with id {}", admin.email, admin.id);
        }
        Command::CleanupSessions => {
            let removed = SessionManager::new(db, settings.session.ttl_days).cleanup_expired_sessions()?;
            println!("{} expired session(s) removed.", removed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_db() -> Database {
        let db = Database::in_memory().expect("database");
        db.initialize().expect("schema");
        db.seed_demo_data().expect("demo data");
        db
    }

    #[test]
    fn test_create_admin() {
        let db = demo_db();
        let admin = create_admin(&db, "Owner@Dojo.Local", "s3cret!", "Ana", "Souza").unwrap();
        assert_eq!(admin.email, "owner@dojo.local");
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.status, UserStatus::Active);

        assert!(create_admin(&db, "owner@dojo.local", "s3cret!", "Ana", "Souza").is_err());
        assert!(create_admin(&db, "new@dojo.local", "123", "Ana", "Souza").is_err());
        assert!(create_admin(&db, "not-an-email", "s3cret!", "Ana", "Souza").is_err());
    }

    #[test]
    fn test_cancel_expired_orders() {
        let db = demo_db();
        db.connection()
            .unwrap()
            .execute(
                "INSERT INTO orders (id, student_id, item_id, quantity, status, requested_at) VALUES
                 ('60000000-0000-4000-8000-000000000001', '00000000-0000-4000-8000-000000000003',
                  '50000000-0000-4000-8000-000000000002', 2, 'PENDING',
                  strftime('%Y-%m-%d %H:%M:%S+00:00', 'now', '-20 days'))",
                [],
            )
            .unwrap();

        assert!(cancel_expired_orders(&db, 30).unwrap().is_empty());

        let expired = cancel_expired_orders(&db, 15).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].item_name, "Purple Belt");
        assert_eq!(expired[0].quantity_returned, 2);

        assert!(cancel_expired_orders(&db, -1).is_err());
    }
}
