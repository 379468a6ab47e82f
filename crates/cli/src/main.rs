// crates/cli/src/main.rs
//! Ticketflow command-line client.
//!
//! Thin shell over the view-model layer: `list` prints a page of tickets,
//! `watch` opens a detail session and streams live updates until Ctrl-C,
//! `comment` posts a comment. Connection settings come from flags or the
//! TICKETFLOW_* environment variables.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ticketflow_api::TicketsClient;
use ticketflow_core::{TicketList, TicketSession, Viewer};
use ticketflow_live::LiveChannel;
use ticketflow_types::{Role, TicketQuery, TicketStatus, TokenStore};

#[derive(Parser)]
#[command(name = "ticketflow", version, about = "Support ticket client")]
struct Cli {
    /// Base URL of the ticket backend.
    #[arg(long, env = "TICKETFLOW_API_URL", default_value = "http://localhost:5000/api")]
    api_url: String,

    /// URL of the live update hub.
    #[arg(long, env = "TICKETFLOW_WS_URL", default_value = "ws://localhost:5000/hubs/tickets")]
    ws_url: String,

    /// Bearer token. Without one, live updates are disabled and most
    /// endpoints will answer 401.
    #[arg(long, env = "TICKETFLOW_TOKEN")]
    token: Option<String>,

    /// Acting role: manager, employee or client.
    #[arg(long, env = "TICKETFLOW_ROLE", default_value = "client")]
    role: Role,

    /// Id of the signed-in user, used for attachment ownership.
    #[arg(long, env = "TICKETFLOW_USER_ID", default_value_t = 0)]
    user_id: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one page of the role-scoped ticket list.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        /// Filter by status: new, in-progress, waiting-client or closed.
        #[arg(long)]
        status: Option<TicketStatus>,
    },
    /// Open a ticket and stream its comments and attachments live.
    Watch { ticket_id: i64 },
    /// Add a comment to a ticket.
    Comment { ticket_id: i64, text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,ticketflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let tokens = TokenStore::new(cli.token.clone());
    let client = Arc::new(TicketsClient::new(cli.api_url.clone(), tokens.clone()));
    let live = LiveChannel::new(cli.ws_url.clone(), tokens);
    let viewer = Viewer {
        user_id: cli.user_id,
        role: cli.role,
    };

    match cli.command {
        Command::List {
            page,
            search,
            status,
        } => run_list(client, cli.role, page, search, status).await,
        Command::Watch { ticket_id } => run_watch(client, live, viewer, ticket_id).await,
        Command::Comment { ticket_id, text } => {
            run_comment(client, live, viewer, ticket_id, text).await
        }
    }
}

async fn run_list(
    client: Arc<TicketsClient>,
    role: Role,
    page: u32,
    search: Option<String>,
    status: Option<TicketStatus>,
) -> Result<()> {
    let list = TicketList::new(client, role);
    let query = TicketQuery {
        page_number: page,
        search_term: search,
        status,
        ..TicketQuery::default()
    };
    list.query(query).await;

    let state = list.snapshot();
    if let Some(error) = state.error {
        bail!(error);
    }

    for ticket in &state.tickets {
        let assignee = ticket.assigned_employee_name.as_deref().unwrap_or("-");
        println!(
            "#{:<6} {:<16} {:<20} {}",
            ticket.id, ticket.status, assignee, ticket.title
        );
    }
    println!(
        "page {} of {} tickets",
        state.query.page_number, state.total_count
    );
    Ok(())
}

async fn run_watch(
    client: Arc<TicketsClient>,
    live: LiveChannel,
    viewer: Viewer,
    ticket_id: i64,
) -> Result<()> {
    let session = TicketSession::open(client, live, viewer, ticket_id).await;
    let mut updates = session.subscribe();

    let state = updates.borrow_and_update().clone();
    if let Some(error) = state.error {
        bail!(error);
    }

    // Seed the printed-id sets from the initial load, then re-print whatever
    // the live channel adds until interrupted. The watch channel coalesces
    // bursts; diffing by id keeps the output stable.
    let mut seen_comments: Vec<i64> = Vec::new();
    let mut seen_attachments: Vec<i64> = Vec::new();
    if let Some(ticket) = &state.ticket {
        println!("#{} [{}] {}", ticket.id, ticket.status, ticket.title);
        println!("{}", ticket.description);
        for comment in &ticket.comments {
            seen_comments.push(comment.id);
            print_comment(comment);
        }
    }
    for attachment in &state.attachments {
        seen_attachments.push(attachment.id);
        println!(
            "  [file] {} ({} bytes)",
            attachment.file_name, attachment.file_size_in_bytes
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if let Some(ticket) = &state.ticket {
                    for comment in &ticket.comments {
                        if !seen_comments.contains(&comment.id) {
                            seen_comments.push(comment.id);
                            print_comment(comment);
                        }
                    }
                }
                for attachment in &state.attachments {
                    if !seen_attachments.contains(&attachment.id) {
                        seen_attachments.push(attachment.id);
                        println!(
                            "  [file] {} ({} bytes)",
                            attachment.file_name, attachment.file_size_in_bytes
                        );
                    }
                }
            }
        }
    }

    debug!(ticket_id, "closing watch session");
    session.close();
    Ok(())
}

async fn run_comment(
    client: Arc<TicketsClient>,
    live: LiveChannel,
    viewer: Viewer,
    ticket_id: i64,
    text: String,
) -> Result<()> {
    let session = TicketSession::open(client, live, viewer, ticket_id).await;
    {
        let state = session.snapshot();
        if let Some(error) = state.error {
            bail!(error);
        }
    }

    session.add_comment(&text).await;
    let state = session.snapshot();
    session.close();

    if let Some(error) = state.comment_error {
        bail!(error);
    }
    println!("comment added to #{ticket_id}");
    Ok(())
}

fn print_comment(comment: &ticketflow_types::Comment) {
    let author = comment.author_name.as_deref().unwrap_or("anonymous");
    println!("  [{}] {}: {}", comment.created_at.format("%Y-%m-%d %H:%M"), author, comment.text);
}
