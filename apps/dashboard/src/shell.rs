//! Interactive dashboard: one controller per tab, kept for the whole session.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use anyhow::Context;
use client_core::{
    forms::{
        ClubForm, CollegeForm, CreateForm, EventForm, FormKind, Modal, RoomForm, SubmitOutcome,
        TeamForm, UserForm,
    },
    session::welcome,
    tabs::filter_choices,
    ActiveView, Outcome, SortOrder, Table, Tab, ViewController,
};
use shared::protocol::SessionUser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{
    commands::{apply_fields, ensure_form_allowed, ensure_tab_visible, App},
    terminal::{cards_text, choices_text, table_text},
};

const HELP: &str = "\
tabs                     list tabs
tab <name>               switch tab
filter key=value ...     filter the list (values may contain spaces)
clear                    drop all filters
choices                  show dropdown options for the filters
open <id>                drill into a row
back                     return to the parent view
reload                   fetch the current view again
page <n> | next | prev   move between pages
sort <column> [desc]     sort by a column
search [text]            search the loaded rows; no text clears
cards                    events grouped by category
add <form> key=value ... create a college, club, event, room, team or user
                         team members: member=name,email,phone,gender,size,college[,club]
                         remove_member=<position> drops a member from the draft
help                     this text
quit                     leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    Tabs,
    Tab(String),
    Filter(Vec<(String, String)>),
    Clear,
    Choices,
    Open(i64),
    Back,
    Reload,
    Page(usize),
    Next,
    Prev,
    Sort { column: String, descending: bool },
    Search(Option<String>),
    Cards,
    Add {
        kind: FormKind,
        fields: Vec<(String, String)>,
    },
    Help,
    Quit,
}

/// `a=1 b=two words c=3` -> `[(a, 1), (b, two words), (c, 3)]`.
pub fn parse_pairs(tokens: &[&str]) -> Result<Vec<(String, String)>, String> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                pairs.push((key.to_string(), value.to_string()));
            }
            _ => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(token);
                }
                None => return Err(format!("expected key=value, got `{token}`")),
            },
        }
    }
    Ok(pairs)
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((head, rest)) = tokens.split_first() else {
            return Ok(ShellCommand::Empty);
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "tabs" => ShellCommand::Tabs,
            "tab" => match rest {
                [name] => ShellCommand::Tab(name.to_string()),
                _ => return Err("usage: tab <name>".into()),
            },
            "filter" => ShellCommand::Filter(parse_pairs(rest)?),
            "clear" => ShellCommand::Clear,
            "choices" => ShellCommand::Choices,
            "open" => match rest {
                [id] => ShellCommand::Open(
                    id.parse()
                        .map_err(|_| format!("`{id}` is not a row id"))?,
                ),
                _ => return Err("usage: open <id>".into()),
            },
            "back" => ShellCommand::Back,
            "reload" => ShellCommand::Reload,
            "page" => match rest {
                [n] => match n.parse::<usize>() {
                    Ok(n) if n >= 1 => ShellCommand::Page(n),
                    _ => return Err(format!("`{n}` is not a page number")),
                },
                _ => return Err("usage: page <n>".into()),
            },
            "next" => ShellCommand::Next,
            "prev" => ShellCommand::Prev,
            "sort" => {
                let (column, descending) = match rest {
                    [] => return Err("usage: sort <column> [desc]".into()),
                    [column @ .., last] if last.eq_ignore_ascii_case("desc") => (column, true),
                    [column @ .., last] if last.eq_ignore_ascii_case("asc") => (column, false),
                    column => (column, false),
                };
                if column.is_empty() {
                    return Err("usage: sort <column> [desc]".into());
                }
                ShellCommand::Sort {
                    column: column.join(" "),
                    descending,
                }
            }
            "search" => {
                ShellCommand::Search((!rest.is_empty()).then(|| rest.join(" ")))
            }
            "cards" => ShellCommand::Cards,
            "add" => match rest.split_first() {
                Some((kind, fields)) => ShellCommand::Add {
                    kind: kind.parse()?,
                    fields: parse_pairs(fields)?,
                },
                None => return Err("usage: add <form> key=value ...".into()),
            },
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command `{other}`; try `help`")),
        };
        Ok(command)
    }
}

/// Unsubmitted form values, kept across commands until a create succeeds.
#[derive(Default)]
struct Drafts {
    college: Modal<CollegeForm>,
    club: Modal<ClubForm>,
    event: Modal<EventForm>,
    room: Modal<RoomForm>,
    team: Modal<TeamForm>,
    user: Modal<UserForm>,
}

pub struct Shell<'a> {
    app: &'a App,
    user: SessionUser,
    controllers: HashMap<Tab, ViewController<Table>>,
    current: Tab,
    drafts: Drafts,
}

impl<'a> Shell<'a> {
    pub fn new(app: &'a App, user: SessionUser) -> Self {
        Self {
            app,
            user,
            controllers: HashMap::new(),
            current: Tab::Participants,
            drafts: Drafts::default(),
        }
    }

    fn controller(&mut self, tab: Tab) -> &ViewController<Table> {
        let app = self.app;
        self.controllers
            .entry(tab)
            .or_insert_with(|| app.controller(tab))
    }

    fn print_current(&mut self) {
        let tab = self.current;
        self.controller(tab)
            .with_table(|table| println!("{}", table_text(table)));
    }

    async fn switch(&mut self, tab: Tab) {
        if let Some(previous) = self.controllers.get(&self.current) {
            previous.reset();
        }
        self.current = tab;
        println!("[{}]", tab.title());
        let outcome = self.controller(tab).init().await;
        if outcome != Outcome::Failed {
            self.print_current();
        }
    }

    /// Returns false when the shell should exit.
    pub async fn execute(&mut self, command: ShellCommand) -> bool {
        let tab = self.current;
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Quit => return false,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Tabs => {
                for candidate in Tab::ALL {
                    if candidate.visible_to(self.user.role) {
                        let marker = if candidate == tab { "*" } else { " " };
                        println!("{marker} {}", candidate.name());
                    }
                }
            }
            ShellCommand::Tab(name) => match name.parse::<Tab>() {
                Ok(next) => match ensure_tab_visible(next, &self.user) {
                    Ok(()) => self.switch(next).await,
                    Err(err) => eprintln!("error: {err}"),
                },
                Err(err) => eprintln!("error: {err}"),
            },
            ShellCommand::Filter(pairs) => {
                let controller = self.controller(tab);
                if let Some((key, _)) = pairs
                    .iter()
                    .find(|(key, _)| !controller.config().accepts_filter(key))
                {
                    let known = controller.config().list.filter_keys.join(", ");
                    eprintln!("error: `{key}` is not a filter here; available: {known}");
                    return true;
                }
                let mut filters = controller.view_state().filters;
                for (key, value) in pairs {
                    filters.set(key, value);
                }
                controller.reset();
                if controller.load(filters).await != Outcome::Failed {
                    self.print_current();
                }
            }
            ShellCommand::Clear => {
                let controller = self.controller(tab);
                controller.reset();
                if controller.load(Default::default()).await != Outcome::Failed {
                    self.print_current();
                }
            }
            ShellCommand::Choices => {
                let choices = filter_choices(self.app.fetcher.as_ref(), tab).await;
                println!("{}", choices_text(&choices));
            }
            ShellCommand::Open(id) => {
                if let Outcome::Rendered { .. } = self.controller(tab).open(id).await {
                    self.print_current();
                } else {
                    debug!(%tab, id, "shell: open did not render");
                }
            }
            ShellCommand::Back => match self.controller(tab).back() {
                Outcome::Rendered { .. } => self.print_current(),
                _ => println!("Already at the list."),
            },
            ShellCommand::Reload => {
                let controller = self.controller(tab);
                let outcome = match controller.view_state().active_view() {
                    ActiveView::List => controller.reload().await,
                    _ => controller.refresh_detail().await,
                };
                if let Outcome::Rendered { .. } = outcome {
                    self.print_current();
                }
            }
            ShellCommand::Page(page) => {
                self.controller(tab)
                    .with_table_mut(|table| table.set_page(page - 1));
                self.print_current();
            }
            ShellCommand::Next => {
                if self.controller(tab).with_table_mut(Table::next_page) {
                    self.print_current();
                } else {
                    println!("Already on the last page.");
                }
            }
            ShellCommand::Prev => {
                if self.controller(tab).with_table_mut(Table::previous_page) {
                    self.print_current();
                } else {
                    println!("Already on the first page.");
                }
            }
            ShellCommand::Sort { column, descending } => {
                let order = if descending {
                    SortOrder::Descending
                } else {
                    SortOrder::Ascending
                };
                let sorted = self.controller(tab).with_table_mut(|table| {
                    match table.column_index(&column) {
                        Some(index) => table.sort_by(index, order),
                        None => false,
                    }
                });
                if sorted {
                    self.print_current();
                } else {
                    eprintln!("error: no column named `{column}`");
                }
            }
            ShellCommand::Search(term) => {
                self.controller(tab)
                    .with_table_mut(|table| table.search(term));
                self.print_current();
            }
            ShellCommand::Cards => {
                let controller = self.controller(tab);
                if tab != Tab::Events || controller.view_state().active_view() != ActiveView::List
                {
                    eprintln!("error: cards are only available on the events list");
                } else {
                    println!("{}", cards_text(&controller.list_rows()));
                }
            }
            ShellCommand::Add { kind, fields } => self.add(kind, fields).await,
        }
        true
    }

    async fn add(&mut self, kind: FormKind, fields: Vec<(String, String)>) {
        if let Err(err) = ensure_form_allowed(kind, &self.user) {
            eprintln!("error: {err}");
            return;
        }
        let owner_tab = kind.owner();
        let app = self.app;
        let owner = self
            .controllers
            .entry(owner_tab)
            .or_insert_with(|| app.controller(owner_tab));
        let drafts = &mut self.drafts;
        if kind == FormKind::Team {
            drafts
                .team
                .form_mut()
                .prefill_event(owner.view_state().detail_id());
        }
        let outcome = match kind {
            FormKind::College => submit_draft(&mut drafts.college, owner, &fields).await,
            FormKind::Club => submit_draft(&mut drafts.club, owner, &fields).await,
            FormKind::Event => submit_draft(&mut drafts.event, owner, &fields).await,
            FormKind::Room => submit_draft(&mut drafts.room, owner, &fields).await,
            FormKind::Team => submit_draft(&mut drafts.team, owner, &fields).await,
            FormKind::User => submit_draft(&mut drafts.user, owner, &fields).await,
        };

        match outcome {
            Some(SubmitOutcome::Created(_)) if owner_tab == self.current => self.print_current(),
            Some(SubmitOutcome::Created(_)) => {}
            _ => println!("Draft kept. Fix it with `add {kind} key=value ...`."),
        }
    }
}

/// Applies `fields` to the draft then submits it. `None` when a field was
/// rejected before submitting.
async fn submit_draft<F: CreateForm>(
    modal: &mut Modal<F>,
    owner: &ViewController<Table>,
    fields: &[(String, String)],
) -> Option<SubmitOutcome> {
    if !modal.is_open() {
        modal.open();
    }
    if let Err(err) = apply_fields(modal.form_mut(), fields) {
        eprintln!("error: {err}");
        return None;
    }
    Some(modal.submit(owner).await)
}

pub async fn run(app: &App, user: SessionUser) -> anyhow::Result<()> {
    println!("{}", welcome(&user));
    println!("Type `help` for commands.");
    let mut shell = Shell::new(app, user);
    shell.switch(Tab::Participants).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", shell.current.name());
        io::stdout().flush().context("failed to write prompt")?;

        let Some(line) = lines.next_line().await.context("failed to read command")? else {
            break;
        };
        if let Err(err) = app.store.guard() {
            eprintln!("{err}");
            break;
        }
        match ShellCommand::parse(&line) {
            Ok(command) => {
                if !shell.execute(command).await {
                    break;
                }
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
