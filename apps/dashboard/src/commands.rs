//! One-shot command handlers shared by the CLI and the shell.

use std::{process::ExitCode, sync::Arc};

use anyhow::{bail, Context};
use client_core::{
    forms::{
        ClubForm, CollegeForm, CreateForm, EventForm, FormKind, Modal, RoomForm, SubmitOutcome,
        TeamForm, UserForm, ValidationError,
    },
    session::{self, welcome, LoginError, SessionStore},
    ActiveView, ApiClient, DataFetcher, Filters, Notifier, Outcome, Table, Tab, TabConfig,
    ViewController,
};
use shared::protocol::{Credentials, SessionUser};
use tracing::info;

use crate::{
    config::Settings,
    terminal::{cards_text, table_text, TerminalNotifier},
};

pub struct App {
    pub settings: Settings,
    pub fetcher: Arc<dyn DataFetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub store: SessionStore,
}

impl App {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = ApiClient::new(settings.api_url.clone(), settings.request_timeout())
            .context("failed to build API client")?;
        info!(api_url = %client.base_url(), "dashboard: api client ready");
        Ok(Self {
            fetcher: Arc::new(client),
            notifier: Arc::new(TerminalNotifier),
            store: SessionStore::new(settings.session_path.clone()),
            settings,
        })
    }

    pub fn controller(&self, tab: Tab) -> ViewController<Table> {
        ViewController::new(
            TabConfig::for_tab(tab),
            self.fetcher.clone(),
            self.notifier.clone(),
            Table::new(self.settings.page_length),
        )
    }

    /// Session of the current user, or an error that stops the command.
    pub fn guard(&self) -> anyhow::Result<SessionUser> {
        Ok(self.store.guard()?)
    }
}

pub fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

pub async fn login(app: &App, username: String, password: String) -> anyhow::Result<ExitCode> {
    let credentials = Credentials { username, password };
    match session::login(app.fetcher.as_ref(), &app.store, &credentials).await {
        Ok(user) => {
            println!("{}", welcome(&user));
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ LoginError::AlreadyLoggedIn { .. }) => {
            println!("{err}");
            Ok(ExitCode::SUCCESS)
        }
        Err(LoginError::Storage(err)) => {
            Err(anyhow::Error::new(err).context("failed to store session"))
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

pub fn logout(app: &App) -> anyhow::Result<ExitCode> {
    let removed = session::logout(&app.store).context("failed to remove session")?;
    if removed {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    Ok(ExitCode::SUCCESS)
}

pub fn whoami(app: &App) -> anyhow::Result<ExitCode> {
    let user = app.guard()?;
    println!("{}", welcome(&user));
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub tab: Tab,
    pub filters: Filters,
    /// Ids to drill into, outermost first.
    pub open: Vec<i64>,
    /// One-based.
    pub page: Option<usize>,
    pub cards: bool,
}

impl ListRequest {
    pub fn new(tab: Tab) -> Self {
        Self {
            tab,
            filters: Filters::new(),
            open: Vec::new(),
            page: None,
            cards: false,
        }
    }
}

pub fn ensure_tab_visible(tab: Tab, user: &SessionUser) -> anyhow::Result<()> {
    if !tab.visible_to(user.role) {
        bail!("The {} tab is only available to admins.", tab.title());
    }
    Ok(())
}

pub async fn list(app: &App, user: &SessionUser, request: ListRequest) -> anyhow::Result<ExitCode> {
    ensure_tab_visible(request.tab, user)?;
    let controller = app.controller(request.tab);

    let mut outcome = if request.filters.is_blank() {
        controller.init().await
    } else {
        controller.load(request.filters).await
    };
    if outcome == Outcome::Failed {
        return Ok(ExitCode::FAILURE);
    }

    for id in request.open {
        outcome = controller.open(id).await;
        if !matches!(outcome, Outcome::Rendered { .. }) {
            return Ok(exit_code(outcome));
        }
    }

    if let Some(page) = request.page {
        controller.with_table_mut(|table| table.set_page(page.saturating_sub(1)));
    }

    if request.cards && controller.view_state().active_view() == ActiveView::List {
        println!("{}", cards_text(&controller.list_rows()));
    } else {
        controller.with_table(|table| println!("{}", table_text(table)));
    }
    Ok(exit_code(outcome))
}

pub fn ensure_form_allowed(kind: FormKind, user: &SessionUser) -> anyhow::Result<()> {
    if !kind.allowed_for(user.role) {
        bail!("Your role ({}) cannot add {kind}s.", user.role);
    }
    Ok(())
}

pub fn apply_fields<F: CreateForm>(
    form: &mut F,
    fields: &[(String, String)],
) -> Result<(), ValidationError> {
    for (key, value) in fields {
        form.set_field(key, value)?;
    }
    Ok(())
}

pub async fn add(
    app: &App,
    user: &SessionUser,
    kind: FormKind,
    fields: Vec<(String, String)>,
) -> anyhow::Result<ExitCode> {
    ensure_form_allowed(kind, user)?;
    match kind {
        FormKind::College => add_with::<CollegeForm>(app, &fields).await,
        FormKind::Club => add_with::<ClubForm>(app, &fields).await,
        FormKind::Event => add_with::<EventForm>(app, &fields).await,
        FormKind::Room => add_with::<RoomForm>(app, &fields).await,
        FormKind::Team => add_with::<TeamForm>(app, &fields).await,
        FormKind::User => add_with::<UserForm>(app, &fields).await,
    }
}

async fn add_with<F: CreateForm>(
    app: &App,
    fields: &[(String, String)],
) -> anyhow::Result<ExitCode> {
    let mut modal: Modal<F> = Modal::new();
    modal.open();
    apply_fields(modal.form_mut(), fields)?;

    let owner = app.controller(F::KIND.owner());
    match modal.submit(&owner).await {
        SubmitOutcome::Created(_) => {
            owner.with_table(|table| println!("{}", table_text(table)));
            Ok(ExitCode::SUCCESS)
        }
        SubmitOutcome::Invalid(_) | SubmitOutcome::Rejected(_) => Ok(ExitCode::FAILURE),
    }
}
