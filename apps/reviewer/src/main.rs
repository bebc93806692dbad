use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    render::render_dialog, ClientEvent, EventStream, HttpReviewClient, ReviewApi, ReviewWorkflow,
    ToastKind,
};
use shared::domain::{ReviewId, ReviewRecord};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long)]
    email: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pending and signed documents.
    List,
    /// Whether anything is still waiting for a signature.
    Pending,
    /// Show a document and record that it was read.
    Open { review_id: i64 },
    /// Sign a document that has already been opened.
    Sign {
        review_id: i64,
        /// JSON strokes: `[[[x, y], ...], ...]`.
        #[arg(long)]
        strokes: PathBuf,
    },
    /// Print company events until the server closes the stream.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let (client, employee) = HttpReviewClient::login(&cli.server_url, &cli.email)
        .await
        .context("login failed")?;
    println!("Signed in as {} ({})", employee.name, employee.role.as_str());

    if let Command::Watch = cli.command {
        return watch(&client).await;
    }

    let mut workflow = ReviewWorkflow::new(client);
    let mut events = workflow.subscribe_events();
    let result = run(&mut workflow, cli.command).await;
    print_toasts(&mut events);
    result
}

async fn run(workflow: &mut ReviewWorkflow<HttpReviewClient>, command: Command) -> Result<()> {
    workflow.load_reviews().await?;
    match command {
        Command::List => {
            let listing = workflow.listing();
            println!("Pending ({})", listing.pending_count());
            for review in &listing.pending {
                print_review(review);
            }
            println!("Signed ({})", listing.signed_count());
            for review in &listing.signed {
                print_review(review);
            }
        }
        Command::Pending => {
            let check = workflow.api().pending_check().await?;
            if check.has_pending {
                println!("{} document(s) awaiting signature", check.pending_count);
            } else {
                println!("All documents signed");
            }
        }
        Command::Open { review_id } => {
            workflow.open_review(ReviewId(review_id)).await?;
            if let Some(text) = render_dialog(workflow.dialog()) {
                println!("{text}");
            }
            workflow.cancel();
        }
        Command::Sign { review_id, strokes } => {
            let raw = std::fs::read_to_string(&strokes)
                .with_context(|| format!("failed to read strokes from {}", strokes.display()))?;
            let strokes: Vec<Vec<[f32; 2]>> =
                serde_json::from_str(&raw).context("strokes must be [[[x, y], ...], ...]")?;

            workflow.open_sign_dialog(ReviewId(review_id))?;
            for stroke in strokes {
                workflow
                    .pad_mut()
                    .add_stroke(stroke.into_iter().map(|[x, y]| (x, y)));
            }
            let review = workflow.submit_signature().await?;
            if let Some(signed_at) = review.signed_at {
                println!("Signed '{}' at {}", review.document_name, signed_at.to_rfc3339());
            }
        }
        Command::Watch => {}
    }
    Ok(())
}

async fn watch(client: &HttpReviewClient) -> Result<()> {
    let mut stream = EventStream::connect(client.server_url(), client.token()).await?;
    while let Some(event) = stream.next().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn print_review(review: &ReviewRecord) {
    let viewed = if review.has_been_viewed() { "viewed" } else { "unread" };
    println!(
        "  #{:<5} {:<22} {} [{viewed}]",
        review.id.0,
        review.document_type.as_str(),
        review.document_name
    );
}

fn print_toasts(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Toast(toast) = event {
            let marker = match toast.kind {
                ToastKind::Success => "ok",
                ToastKind::Destructive => "error",
            };
            eprintln!("[{marker}] {}: {}", toast.title, toast.message);
        }
    }
}
