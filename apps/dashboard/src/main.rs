use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use client_core::{forms::FormKind, Filters, Tab};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod shell;
mod terminal;

use commands::{App, ListRequest};
use config::load_settings;

/// Fest administration dashboard.
#[derive(Parser, Debug)]
#[command(name = "fest-dashboard", version)]
struct Cli {
    /// Backend base URL; overrides the config file and environment.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// TOML config file. Defaults to ./dashboard.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session locally.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "FEST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the signed-in user.
    Whoami,
    Participants {
        #[arg(long)]
        college_name: Option<String>,
        #[arg(long)]
        club_id: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        event_id: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Colleges {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Clubs {
        #[arg(long)]
        club_type: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Events {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        date: Option<String>,
        /// Show the teams of this event.
        #[arg(long)]
        event: Option<i64>,
        /// Show the members of this team.
        #[arg(long, requires = "event")]
        team: Option<i64>,
        /// Group the list into category cards.
        #[arg(long, conflicts_with = "event")]
        cards: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Accommodation rooms.
    Rooms {
        /// Show the participants staying in this room.
        #[arg(long)]
        room: Option<i64>,
        #[command(flatten)]
        page: PageArgs,
    },
    Users {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a record.
    #[command(subcommand)]
    Add(AddCommand),
    /// Interactive dashboard.
    Shell,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// One-based page of the table to print.
    #[arg(long)]
    page: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum AddCommand {
    College {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
    },
    Club {
        #[arg(long)]
        club_name: Option<String>,
        #[arg(long)]
        college_id: Option<String>,
        #[arg(long)]
        club_type: Option<String>,
        #[arg(long)]
        poc: Option<String>,
        #[arg(long)]
        poc_contact: Option<String>,
        #[arg(long)]
        poc_position: Option<String>,
    },
    Event {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        fest_id: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// HH:MM or HH:MM:SS
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        max_team_size: Option<String>,
    },
    Room {
        #[arg(long)]
        building_name: Option<String>,
        #[arg(long)]
        room_no: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        max_capacity: Option<String>,
    },
    Team {
        #[arg(long)]
        team_name: Option<String>,
        #[arg(long)]
        event_id: Option<String>,
        /// name,email,phone,gender,size,college[,club]; repeat per member.
        #[arg(long = "member")]
        members: Vec<String>,
    },
    User {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
}

fn fields<const N: usize>(raw: [(&str, Option<String>); N]) -> Vec<(String, String)> {
    raw.into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
}

fn filters<const N: usize>(raw: [(&str, Option<String>); N]) -> Filters {
    fields(raw).into_iter().collect()
}

impl AddCommand {
    fn into_parts(self) -> (FormKind, Vec<(String, String)>) {
        match self {
            AddCommand::College { name, city, state } => (
                FormKind::College,
                fields([("name", name), ("city", city), ("state", state)]),
            ),
            AddCommand::Club {
                club_name,
                college_id,
                club_type,
                poc,
                poc_contact,
                poc_position,
            } => (
                FormKind::Club,
                fields([
                    ("club_name", club_name),
                    ("college_id", college_id),
                    ("club_type", club_type),
                    ("poc", poc),
                    ("poc_contact", poc_contact),
                    ("poc_position", poc_position),
                ]),
            ),
            AddCommand::Event {
                name,
                fest_id,
                category,
                venue,
                date,
                time,
                max_team_size,
            } => (
                FormKind::Event,
                fields([
                    ("name", name),
                    ("fest_id", fest_id),
                    ("category", category),
                    ("venue", venue),
                    ("date", date),
                    ("time", time),
                    ("max_team_size", max_team_size),
                ]),
            ),
            AddCommand::Room {
                building_name,
                room_no,
                gender,
                max_capacity,
            } => (
                FormKind::Room,
                fields([
                    ("building_name", building_name),
                    ("room_no", room_no),
                    ("gender", gender),
                    ("max_capacity", max_capacity),
                ]),
            ),
            AddCommand::Team {
                team_name,
                event_id,
                members,
            } => {
                let mut parts = fields([("team_name", team_name), ("event_id", event_id)]);
                parts.extend(members.into_iter().map(|member| ("member".to_string(), member)));
                (FormKind::Team, parts)
            }
            AddCommand::User {
                username,
                password,
                name,
                email,
                phone,
                role,
            } => (
                FormKind::User,
                fields([
                    ("username", username),
                    ("password", password),
                    ("name", name),
                    ("email", email),
                    ("phone", phone),
                    ("role", role),
                ]),
            ),
        }
    }
}

impl Command {
    /// Listing for table commands, `None` for everything else.
    fn list_request(&self) -> Option<ListRequest> {
        let (mut request, page) = match self {
            Command::Participants {
                college_name,
                club_id,
                gender,
                state,
                city,
                event_id,
                page,
            } => {
                let mut request = ListRequest::new(Tab::Participants);
                request.filters = filters([
                    ("college_name", college_name.clone()),
                    ("club_id", club_id.clone()),
                    ("gender", gender.clone()),
                    ("state", state.clone()),
                    ("city", city.clone()),
                    ("event_id", event_id.clone()),
                ]);
                (request, page)
            }
            Command::Colleges { city, state, page } => {
                let mut request = ListRequest::new(Tab::Colleges);
                request.filters = filters([("city", city.clone()), ("state", state.clone())]);
                (request, page)
            }
            Command::Clubs { club_type, page } => {
                let mut request = ListRequest::new(Tab::Clubs);
                request.filters = filters([("club_type", club_type.clone())]);
                (request, page)
            }
            Command::Events {
                category,
                venue,
                date,
                event,
                team,
                cards,
                page,
            } => {
                let mut request = ListRequest::new(Tab::Events);
                request.filters = filters([
                    ("category", category.clone()),
                    ("venue", venue.clone()),
                    ("date", date.clone()),
                ]);
                request.open = event.iter().chain(team.iter()).copied().collect();
                request.cards = *cards;
                (request, page)
            }
            Command::Rooms { room, page } => {
                let mut request = ListRequest::new(Tab::Accommodation);
                request.open = room.iter().copied().collect();
                (request, page)
            }
            Command::Users { page } => (ListRequest::new(Tab::Users), page),
            _ => return None,
        };
        request.page = page.page;
        Some(request)
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    debug!(?settings, "dashboard: settings loaded");
    let app = App::new(settings)?;

    match cli.command {
        Command::Login { username, password } => commands::login(&app, username, password).await,
        Command::Logout => commands::logout(&app),
        Command::Whoami => commands::whoami(&app),
        Command::Add(add) => {
            let user = app.guard()?;
            let (kind, fields) = add.into_parts();
            commands::add(&app, &user, kind, fields).await
        }
        Command::Shell => {
            let user = app.guard()?;
            shell::run(&app, user).await?;
            Ok(ExitCode::SUCCESS)
        }
        listing => match listing.list_request() {
            Some(request) => {
                let user = app.guard()?;
                commands::list(&app, &user, request).await
            }
            None => Ok(ExitCode::SUCCESS),
        },
    }
}
