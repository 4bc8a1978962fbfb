//! `appstash login` command: store registry credentials.
//!
//! Credentials are keyed by registry host and used both for the artifact
//! registry and for pushes to mirror registries.

use appstash_runtime::CredentialStore;
use clap::Args;

#[derive(Args)]
pub struct LoginArgs {
    /// Registry host, e.g. the host of $STORAGE_BASEURI
    pub server: String,

    /// Username
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Read password from stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Remove stored credentials for the host instead
    #[arg(long, conflicts_with_all = ["username", "password", "password_stdin"])]
    pub remove: bool,
}

fn prompt(label: &str) -> std::io::Result<String> {
    if !label.is_empty() {
        eprint!("{label}: ");
    }
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub async fn execute(args: LoginArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::default_path()?;

    if args.remove {
        if store.remove(&args.server)? {
            println!("Removed credentials for {}", args.server);
        } else {
            println!("No credentials stored for {}", args.server);
        }
        return Ok(());
    }

    let username = match args.username {
        Some(u) => u,
        None => prompt("Username")?,
    };

    let password = if args.password_stdin {
        prompt("")?
    } else {
        match args.password {
            Some(p) => p,
            None => prompt("Password")?,
        }
    };

    if username.is_empty() || password.is_empty() {
        return Err("Username and password are required".into());
    }

    store.store(&args.server, &username, &password)?;

    println!("Login Succeeded");
    Ok(())
}
