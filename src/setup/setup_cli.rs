use agency_backend::config::Config;
use agency_backend::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::{params, Connection};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
        },
        Commands::Admin { action } => match action {
            AdminAction::Create {
                username,
                email,
                password,
            } => create_admin_user(&config, username, email, password),
            AdminAction::List => list_admin_users(&config),
            AdminAction::ChangePassword {
                email,
                new_password,
            } => change_admin_password(&config, email, new_password),
        },
    }
}

fn setup_database(config: &Config) {
    let db_path = config.agency_db_path();
    println!("\nSetting up agency database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create database file.");
    match db_setup::setup_agency_db(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.agency_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    Connection::open(&db_path).ok()
}

fn create_admin_user(config: &Config, username: &str, email: &str, password: &str) {
    let Some(conn) = open_existing(config) else {
        return;
    };
    let hashed_password =
        bcrypt::hash(password, bcrypt::DEFAULT_COST).expect("Failed to hash password");

    match conn.execute(
        "INSERT INTO users (username, email, password_hash, role) VALUES (?1, ?2, ?3, 'admin')",
        params![username, email, hashed_password],
    ) {
        Ok(_) => println!("✅ Admin user '{}' created successfully.", username),
        Err(e) => eprintln!(
            "❌ Error creating admin user: {}. The username or email might already exist.",
            e
        ),
    }
}

fn list_admin_users(config: &Config) {
    let Some(conn) = open_existing(config) else {
        return;
    };
    let mut stmt = match conn
        .prepare("SELECT username, email FROM users WHERE role = 'admin' ORDER BY username")
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Error preparing database query: {}", e);
            return;
        }
    };
    let user_iter = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    });

    println!("Listing Admin Users:");
    match user_iter {
        Ok(users) => {
            for user in users.flatten() {
                println!("- {} <{}>", user.0, user.1);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn change_admin_password(config: &Config, email: &str, new_password: &str) {
    let Some(conn) = open_existing(config) else {
        return;
    };
    let hashed_password =
        bcrypt::hash(new_password, bcrypt::DEFAULT_COST).expect("Failed to hash new password");
    match conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE email = ?2 AND role = 'admin'",
        params![hashed_password, email],
    ) {
        Ok(0) => eprintln!("❌ Error: No admin user with email '{}' found.", email),
        Ok(_) => println!("✅ Password for admin '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
