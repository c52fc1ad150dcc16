//! Per-tab configuration: endpoints, columns, renderers and drill-downs.
//!
//! Every dashboard tab is the same [`ViewController`](crate::ViewController)
//! driven by one of these tables.

use std::{fmt, str::FromStr};

use shared::{
    domain::{Category, Entity, Gender, UserRole},
    protocol::EventStats,
};
use tracing::warn;

use crate::{
    render::{badge_cell, display_field, format_event_date, member_label, NOT_AVAILABLE},
    DataFetcher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Participants,
    Colleges,
    Events,
    Accommodation,
    Clubs,
    Users,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Participants,
        Tab::Colleges,
        Tab::Events,
        Tab::Accommodation,
        Tab::Clubs,
        Tab::Users,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tab::Participants => "participants",
            Tab::Colleges => "colleges",
            Tab::Events => "events",
            Tab::Accommodation => "accommodation",
            Tab::Clubs => "clubs",
            Tab::Users => "users",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Participants => "Participants",
            Tab::Colleges => "Colleges",
            Tab::Events => "Events",
            Tab::Accommodation => "Accommodation",
            Tab::Clubs => "Clubs",
            Tab::Users => "Users",
        }
    }

    /// The users tab is reserved for admins.
    pub fn visible_to(self, role: UserRole) -> bool {
        match self {
            Tab::Users => role == UserRole::Admin,
            _ => true,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "rooms" | "room" => return Ok(Tab::Accommodation),
            _ => {}
        }
        Tab::ALL
            .into_iter()
            .find(|tab| tab.name() == lowered)
            .ok_or_else(|| format!("unknown tab `{raw}`"))
    }
}

pub type CellFn = fn(&Entity) -> String;

#[derive(Clone, Copy)]
pub enum Cell {
    Field(&'static str),
    Badge {
        occupancy: &'static str,
        capacity: &'static str,
    },
    Computed(CellFn),
}

impl Cell {
    pub fn render(&self, entity: &Entity) -> String {
        match self {
            Cell::Field(key) => display_field(entity, key),
            Cell::Badge {
                occupancy,
                capacity,
            } => badge_cell(entity, occupancy, capacity),
            Cell::Computed(render) => render(entity),
        }
    }
}

#[derive(Clone, Copy)]
pub struct ColumnSpec {
    pub title: &'static str,
    pub cell: Cell,
}

const fn field(title: &'static str, key: &'static str) -> ColumnSpec {
    ColumnSpec {
        title,
        cell: Cell::Field(key),
    }
}

const fn computed(title: &'static str, render: CellFn) -> ColumnSpec {
    ColumnSpec {
        title,
        cell: Cell::Computed(render),
    }
}

pub fn column_titles(columns: &[ColumnSpec]) -> Vec<String> {
    columns.iter().map(|column| column.title.to_string()).collect()
}

pub fn render_rows(columns: &[ColumnSpec], rows: &[Entity]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| columns.iter().map(|column| column.cell.render(row)).collect())
        .collect()
}

/// API path with a single `{id}` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTemplate(pub &'static str);

impl PathTemplate {
    pub fn render(self, id: i64) -> String {
        self.0.replace("{id}", &id.to_string())
    }
}

/// Extra record fetched per listed row and merged into it.
#[derive(Clone, Copy)]
pub struct Enrichment {
    pub endpoint: PathTemplate,
    /// Merged instead when the per-row fetch fails.
    pub fallback: fn() -> Entity,
}

#[derive(Clone)]
pub struct ListSpec {
    pub endpoint: &'static str,
    pub id_field: &'static str,
    pub filter_keys: &'static [&'static str],
    pub columns: Vec<ColumnSpec>,
    pub enrichment: Option<Enrichment>,
    pub failure_notice: &'static str,
}

#[derive(Clone)]
pub struct DrillDownSpec {
    pub title: &'static str,
    pub endpoint: PathTemplate,
    pub row_id_field: &'static str,
    pub columns: Vec<ColumnSpec>,
    pub header: fn(&Entity) -> String,
    pub not_found_notice: &'static str,
    pub failure_notice: &'static str,
}

#[derive(Clone)]
pub struct TabConfig {
    pub tab: Tab,
    pub list: ListSpec,
    pub detail: Option<DrillDownSpec>,
    pub sub_detail: Option<DrillDownSpec>,
}

impl TabConfig {
    pub fn for_tab(tab: Tab) -> Self {
        match tab {
            Tab::Participants => Self::participants(),
            Tab::Colleges => Self::colleges(),
            Tab::Events => Self::events(),
            Tab::Accommodation => Self::accommodation(),
            Tab::Clubs => Self::clubs(),
            Tab::Users => Self::users(),
        }
    }

    pub fn accepts_filter(&self, key: &str) -> bool {
        self.list.filter_keys.contains(&key)
    }

    fn participants() -> Self {
        Self {
            tab: Tab::Participants,
            list: ListSpec {
                endpoint: "/participants/query/",
                id_field: "participant_id",
                filter_keys: &[
                    "college_name",
                    "club_id",
                    "gender",
                    "state",
                    "city",
                    "event_id",
                ],
                columns: participant_columns(),
                enrichment: None,
                failure_notice: "Failed to load participants. Please try again.",
            },
            detail: None,
            sub_detail: None,
        }
    }

    fn colleges() -> Self {
        Self {
            tab: Tab::Colleges,
            list: ListSpec {
                endpoint: "/colleges/query/",
                id_field: "college_id",
                filter_keys: &["city", "state"],
                columns: vec![
                    field("ID", "college_id"),
                    field("Name", "name"),
                    field("City", "city"),
                    field("State", "state"),
                ],
                enrichment: None,
                failure_notice: "Failed to load colleges. Please try again.",
            },
            detail: None,
            sub_detail: None,
        }
    }

    fn clubs() -> Self {
        Self {
            tab: Tab::Clubs,
            list: ListSpec {
                endpoint: "/clubs/query/",
                id_field: "club_id",
                filter_keys: &["club_type"],
                columns: vec![
                    field("ID", "club_id"),
                    field("Name", "club_name"),
                    field("College ID", "college_id"),
                    field("Type", "club_type"),
                    field("POC", "poc"),
                    field("POC Contact", "poc_contact"),
                    field("POC Position", "poc_position"),
                ],
                enrichment: None,
                failure_notice: "Failed to load clubs. Please try again.",
            },
            detail: None,
            sub_detail: None,
        }
    }

    fn events() -> Self {
        Self {
            tab: Tab::Events,
            list: ListSpec {
                endpoint: "/events/query/",
                id_field: "event_id",
                filter_keys: &["category", "venue", "date"],
                columns: vec![
                    field("ID", "event_id"),
                    field("Name", "name"),
                    computed("Category", category_cell),
                    computed("Date", date_cell),
                    field("Time", "time"),
                    field("Venue", "venue"),
                    field("Teams", "team_count"),
                    field("Participants", "participant_count"),
                ],
                enrichment: Some(Enrichment {
                    endpoint: PathTemplate("/events/{id}/stats/"),
                    fallback: zero_stats,
                }),
                failure_notice: "Failed to load events. Please try again.",
            },
            detail: Some(DrillDownSpec {
                title: "Event",
                endpoint: PathTemplate("/events/{id}/teams/"),
                row_id_field: "team_id",
                columns: vec![
                    field("ID", "team_id"),
                    field("Team", "team_name"),
                    computed("Members", members_cell),
                ],
                header: event_header,
                not_found_notice: "No teams found for this event.",
                failure_notice: "Failed to load event details. Please try again.",
            }),
            sub_detail: Some(DrillDownSpec {
                title: "Team",
                endpoint: PathTemplate("/teams/{id}/participants/"),
                row_id_field: "participant_id",
                columns: participant_columns(),
                header: team_header,
                not_found_notice: "No members found for this team.",
                failure_notice: "Failed to load team members. Please try again.",
            }),
        }
    }

    fn accommodation() -> Self {
        Self {
            tab: Tab::Accommodation,
            list: ListSpec {
                endpoint: "/rooms/occupancy/",
                id_field: "room_id",
                filter_keys: &[],
                columns: vec![
                    field("ID", "room_id"),
                    field("Building", "building_name"),
                    field("Room No", "room_no"),
                    field("Gender", "gender"),
                    field("Capacity", "max_capacity"),
                    field("Occupancy", "current_occupancy"),
                    ColumnSpec {
                        title: "Occupancy %",
                        cell: Cell::Badge {
                            occupancy: "current_occupancy",
                            capacity: "max_capacity",
                        },
                    },
                ],
                enrichment: None,
                failure_notice: "Failed to load rooms. Please try again.",
            },
            detail: Some(DrillDownSpec {
                title: "Room",
                endpoint: PathTemplate("/rooms/{id}/participants/"),
                row_id_field: "participant_id",
                columns: participant_columns(),
                header: room_header,
                not_found_notice: "No participants found in this room.",
                failure_notice: "Failed to load room participants. Please try again.",
            }),
            sub_detail: None,
        }
    }

    fn users() -> Self {
        Self {
            tab: Tab::Users,
            list: ListSpec {
                endpoint: "/users/",
                id_field: "user_id",
                filter_keys: &[],
                columns: vec![
                    field("ID", "user_id"),
                    field("Username", "username"),
                    field("Name", "name"),
                    field("Email", "email"),
                    field("Phone", "phone"),
                    field("Role", "role"),
                ],
                enrichment: None,
                failure_notice: "Failed to load users. Please try again.",
            },
            detail: None,
            sub_detail: None,
        }
    }
}

fn participant_columns() -> Vec<ColumnSpec> {
    vec![
        field("ID", "participant_id"),
        field("Name", "name"),
        field("Email", "email"),
        field("Phone", "phone"),
        field("Gender", "gender"),
        field("Merch Size", "merch_size"),
        field("College ID", "college_id"),
        field("Club ID", "club_id"),
    ]
}

fn zero_stats() -> Entity {
    EventStats::default().into_entity()
}

fn category_cell(event: &Entity) -> String {
    match event.text("category") {
        Some(raw) => raw
            .parse::<Category>()
            .map(Category::label)
            .unwrap_or(raw),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn date_cell(event: &Entity) -> String {
    event
        .text("date")
        .map(|raw| format_event_date(&raw))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn members_cell(team: &Entity) -> String {
    member_label(team.int("participant_count").unwrap_or(0).max(0) as u64)
}

pub fn room_header(room: &Entity) -> String {
    format!(
        "Room: {} - {} [{}] Occupancy: {} / {}",
        display_field(room, "building_name"),
        display_field(room, "room_no"),
        display_field(room, "gender"),
        display_field(room, "current_occupancy"),
        display_field(room, "max_capacity"),
    )
}

pub fn event_header(event: &Entity) -> String {
    format!(
        "{} | Category: {} | Date: {} | Time: {} | Venue: {} | Max Team Size: {} | Event ID: {}",
        display_field(event, "name"),
        category_cell(event),
        date_cell(event),
        display_field(event, "time"),
        event.text("venue").unwrap_or_else(|| "TBA".to_string()),
        display_field(event, "max_team_size"),
        display_field(event, "event_id"),
    )
}

pub fn team_header(team: &Entity) -> String {
    format!("{} ({})", display_field(team, "team_name"), members_cell(team))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChoice {
    pub key: &'static str,
    /// `(value, label)` pairs.
    pub options: Vec<(String, String)>,
}

/// Dropdown options for a tab's filter form.
///
/// Lookup failures leave that dropdown empty; the filter still accepts typed
/// values.
pub async fn filter_choices(fetcher: &dyn DataFetcher, tab: Tab) -> Vec<FilterChoice> {
    match tab {
        Tab::Participants => {
            let (colleges, clubs, events) = futures::join!(
                fetcher.get_collection("/colleges/query/", &[]),
                fetcher.get_collection("/clubs/query/", &[]),
                fetcher.get_collection("/events/query/", &[]),
            );
            vec![
                FilterChoice {
                    key: "college_name",
                    options: options_from(colleges, "name", "name"),
                },
                FilterChoice {
                    key: "club_id",
                    options: options_from(clubs, "club_id", "club_name"),
                },
                FilterChoice {
                    key: "gender",
                    options: Gender::ALL
                        .iter()
                        .map(|gender| (gender.as_str().to_string(), gender.as_str().to_string()))
                        .collect(),
                },
                FilterChoice {
                    key: "event_id",
                    options: options_from(events, "event_id", "name"),
                },
            ]
        }
        Tab::Events => vec![FilterChoice {
            key: "category",
            options: Category::ALL
                .iter()
                .map(|category| (category.as_str().to_string(), category.label()))
                .collect(),
        }],
        _ => Vec::new(),
    }
}

fn options_from(
    rows: Result<Vec<Entity>, crate::FetchError>,
    value_key: &str,
    label_key: &str,
) -> Vec<(String, String)> {
    match rows {
        Ok(rows) => {
            let mut options: Vec<(String, String)> = rows
                .iter()
                .filter_map(|row| Some((row.text(value_key)?, display_field(row, label_key))))
                .collect();
            options.dedup();
            options
        }
        Err(err) => {
            warn!(error = %err, "filters: dropdown lookup failed");
            Vec::new()
        }
    }
}
