use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use idealog::mention::MentionCandidate;
use idealog::notify::NotificationDispatcher;
use idealog::render::RenderOptions;
use idealog::utils::{ensure_database_directory, parse_list};
use idealog::{
    Config, ContactId, Database, IdeaId, NewNote, NoteBody, NoteError, NoteId, NoteIntent,
    NoteService, UserId, error::is_user_error,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// idealog - ideas, contacts and notes with @mentions
#[derive(Parser)]
#[command(name = "idealog")]
#[command(about = "Personal CRM for ideas, contacts and call notes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage contacts
    #[command(subcommand)]
    Contact(ContactCommand),
    /// Manage ideas, collaborators and todos
    #[command(subcommand)]
    Idea(IdeaCommand),
    /// Write, show and delete notes
    #[command(subcommand)]
    Note(NoteCommand),
    /// Suggest people for an @mention
    Mentions(MentionsArgs),
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        name: String,
        email: String,
    },
}

#[derive(Subcommand)]
enum ContactCommand {
    /// Add a contact to a user's address book
    Add {
        /// Owning user ID
        #[arg(long)]
        owner: i64,
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum IdeaCommand {
    /// Create an idea
    Add {
        #[arg(long)]
        owner: i64,
        title: String,
    },
    /// Add a collaborator to an idea
    Collaborator { idea: i64, user: i64 },
    /// List an idea's todos, optionally importing a legacy JSON list first
    Todos {
        idea: i64,
        /// Legacy JSON todo list to import
        #[arg(long, value_name = "FILE")]
        import: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Add a note
    Add(NoteAddArgs),
    /// Print a note as HTML
    Show {
        id: i64,
    },
    /// Delete a note
    Delete {
        /// Acting user ID
        #[arg(long)]
        actor: i64,
        id: i64,
    },
}

/// Add a note from text or from a file (call-minute JSON, HTML or plain)
#[derive(Args)]
struct NoteAddArgs {
    /// Author user ID
    #[arg(long)]
    author: i64,

    /// Idea the note belongs to
    #[arg(long)]
    idea: Option<i64>,

    /// Contact the note is about
    #[arg(long)]
    contact: Option<i64>,

    /// Comma-separated categories
    #[arg(short, long, value_name = "CATEGORIES")]
    categories: Option<String>,

    /// follow_up, acted_upon, reflection or memoir
    #[arg(long, default_value = "reflection")]
    intent: String,

    /// Read the body from a file
    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// The note text
    #[arg(value_name = "TEXT", required_unless_present = "file")]
    text: Option<String>,
}

#[derive(Args)]
struct MentionsArgs {
    /// Acting user ID
    #[arg(long)]
    actor: i64,

    #[arg(long)]
    idea: Option<i64>,

    /// Text typed after the @
    #[arg(default_value = "")]
    query: String,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr; `IDEALOG_LOG` sets the filter and
/// `IDEALOG_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env("IDEALOG_LOG").unwrap_or_else(|_| EnvFilter::new("idealog=info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if std::env::var("IDEALOG_LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).context("Failed to open database")?;

    let service = NoteService::new(db).with_notifier(
        NotificationDispatcher::default().with_excerpt_chars(config.excerpt_chars),
    );

    execute(&service, &config, cli.command)
}

/// Runs one command against a service.
///
/// Separated from `run` to allow testing with in-memory databases.
fn execute(service: &NoteService, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::User(UserCommand::Add { name, email }) => {
            let user = service.create_user(&name, &email)?;
            println!("User created (id: {})", user.id);
        }
        Commands::Contact(ContactCommand::Add { owner, name, email }) => {
            let contact = service.create_contact(UserId::new(owner), &name, email.as_deref())?;
            println!("Contact created (id: {})", contact.id);
        }
        Commands::Idea(IdeaCommand::Add { owner, title }) => {
            let idea = service.create_idea(UserId::new(owner), &title)?;
            println!("Idea created (id: {})", idea.id);
        }
        Commands::Idea(IdeaCommand::Collaborator { idea, user }) => {
            let idea = service.add_collaborator(IdeaId::new(idea), UserId::new(user))?;
            println!(
                "Idea {} now has {} collaborator(s)",
                idea.id,
                idea.collaborator_ids.len()
            );
        }
        Commands::Idea(IdeaCommand::Todos { idea, import }) => {
            let idea = IdeaId::new(idea);
            if let Some(path) = import {
                let raw = read_input(&path)?;
                let imported = service.import_legacy_todos(idea, &raw)?;
                println!("Imported {} todo(s)", imported.len());
            }
            for todo in service.list_todos(idea)? {
                let urgent = if todo.is_urgent() { " !" } else { "" };
                println!("[{}] {} {}{}", todo.id(), todo.status(), todo.text(), urgent);
            }
        }
        Commands::Note(NoteCommand::Add(args)) => {
            let note = service.create_note(UserId::new(args.author), new_note(&args)?)?;

            print!("Note created (id: {})", note.id());
            let tagged = note.tagged();
            if !tagged.is_empty() {
                print!(
                    " tagging {} contact(s) and {} user(s)",
                    tagged.contacts.len(),
                    tagged.users.len()
                );
            }
            println!();
        }
        Commands::Note(NoteCommand::Show { id }) => {
            let options = RenderOptions::from(config);
            let rendered = service.render_note(NoteId::new(id), &options)?;
            println!("{}", rendered.to_html(&options));
        }
        Commands::Note(NoteCommand::Delete { actor, id }) => {
            service.delete_note(UserId::new(actor), NoteId::new(id))?;
            println!("Note {id} deleted");
        }
        Commands::Mentions(args) => {
            let candidates = service.mention_candidates(
                UserId::new(args.actor),
                args.idea.map(IdeaId::new),
                &args.query,
                config.mention_limit,
            )?;
            for candidate in &candidates {
                println!("{}", format_candidate(candidate));
            }
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        NoteError::InvalidInput(format!("cannot read {}: {e}", path.display())).into()
    })
}

/// Builds the note input. File contents are classified by shape.
fn new_note(args: &NoteAddArgs) -> Result<NewNote> {
    let body = match (&args.file, &args.text) {
        (Some(path), _) => NoteBody::sniff(&read_input(path)?),
        (None, Some(text)) => NoteBody::sniff(text),
        (None, None) => return Err(NoteError::EmptyBody.into()),
    };
    let intent: NoteIntent = args.intent.parse().map_err(NoteError::InvalidInput)?;

    let mut note = NewNote::new(body);
    note.idea_id = args.idea.map(IdeaId::new);
    note.contact_id = args.contact.map(ContactId::new);
    note.categories = args.categories.as_deref().map(parse_list).unwrap_or_default();
    note.intent = intent;
    Ok(note)
}

fn format_candidate(candidate: &MentionCandidate) -> String {
    match &candidate.detail {
        Some(detail) => format!("@{} <{}>", candidate.name, detail),
        None => format!("@{}", candidate.name),
    }
}
