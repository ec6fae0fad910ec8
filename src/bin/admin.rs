//! Operator commands against the invite database.

use clap::{Parser, Subcommand};

use idclaim::db::{self, invites};
use idclaim::error::AppError;

#[derive(Parser)]
#[command(name = "idclaim-admin")]
#[command(about = "Inspect and clean up pending account invites")]
struct Cli {
    /// Database URL (sqlite:path/to/idclaim.db)
    #[arg(long, global = true, env = "DATABASE_URL", default_value = "sqlite:idclaim.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List live invites
    List,
    /// Delete the live invite for an email, if any
    Delete {
        /// Invitee email address
        email: String,
    },
}

fn describe(e: AppError) -> String {
    format!("{e:?}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let pool = db::create_pool(&cli.database_url).await?;

    match cli.command {
        Command::List => {
            let live = invites::list_live(&pool).await.map_err(describe)?;
            if live.is_empty() {
                println!("No live invites.");
            }
            for invite in live {
                println!(
                    "{}  {:<32}  {} {}  invited by {} at {}",
                    invite.id,
                    invite.email,
                    invite.first_name,
                    invite.last_name,
                    invite.inviter,
                    invite.created_at
                );
            }
        }
        Command::Delete { email } => {
            let email = email.trim().to_lowercase();
            let deleted = invites::delete_by_email(&pool, &email)
                .await
                .map_err(describe)?;
            if deleted == 0 {
                println!("No live invite for {email}.");
            } else {
                println!("Deleted invite for {email}.");
            }
        }
    }

    Ok(())
}
