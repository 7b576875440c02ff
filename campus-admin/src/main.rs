use campus_admin::config::get_configuration;
use campus_admin::models::{InvitationFilter, InvitationStatus, RoleName};
use campus_admin::observability::init_tracing;
use campus_admin::services::permissions::{can_invite, invitable_roles};
use campus_admin::Console;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "campus-admin",
    about = "Session, tenant and invitation tooling for the campus admin console"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and persist the session.
    Login { email: String, password: String },

    /// Validate the stored session and print the identity behind it.
    Whoami,

    /// Revoke the stored session and clear it locally.
    Logout,

    /// List invitations of the active organization.
    Invitations {
        /// pending, accepted, expired or revoked.
        #[arg(long, value_parser = parse_status)]
        status: Option<InvitationStatus>,

        /// Role the invitation assigns.
        #[arg(long)]
        role: Option<RoleName>,
    },

    /// Check whether `role` may invite `target`.
    CanInvite { role: RoleName, target: RoleName },
}

fn parse_status(raw: &str) -> Result<InvitationStatus, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| format!("unknown invitation status '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "campus-admin",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    if let Command::CanInvite { role, target } = cli.command {
        return print_json(&serde_json::json!({
            "role": role,
            "target": target,
            "allowed": can_invite(role, target),
            "invitableRoles": invitable_roles(role),
        }));
    }

    let console = Console::build(&configuration)
        .map_err(|e| anyhow::anyhow!("Failed to initialize console: {}", e))?;

    match cli.command {
        Command::Login { email, password } => {
            print_json(&console.login(&email, &password).await)?;
        }
        Command::Whoami => match console.start().await {
            Some(user) => {
                let organization = console.organizations.current();
                print_json(&serde_json::json!({
                    "user": user,
                    "organization": organization.as_deref(),
                }))?;
            }
            None => anyhow::bail!("Not logged in"),
        },
        Command::Logout => {
            console.start().await;
            print_json(&console.logout().await)?;
        }
        Command::Invitations { status, role } => {
            if console.start().await.is_none() {
                anyhow::bail!("Not logged in");
            }
            let filter = InvitationFilter {
                status,
                role_to_assign: role,
            };
            print_json(&console.invitations.list(filter).await)?;
        }
        Command::CanInvite { .. } => {}
    }

    Ok(())
}
