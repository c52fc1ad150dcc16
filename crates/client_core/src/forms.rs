//! Create forms and the modal that submits them.
//!
//! Fields hold raw text exactly as typed. `validate` checks presence and
//! format only and builds the request payload; nothing touches the network
//! until it succeeds.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use shared::{
    domain::{
        Category, ClubId, CollegeId, Entity, EventId, FestId, Gender, MerchSize, UserRole,
    },
    protocol::{NewClub, NewCollege, NewEvent, NewParticipant, NewRoom, NewTeam, NewUser},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    notice::Notice, table::TableWidget, tabs::Tab, FetchError, Outcome,
    ViewController,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("Please add at least one team member.")]
    NoMembers,
    #[error("member {index}: {reason}")]
    Member {
        index: usize,
        reason: Box<ValidationError>,
    },
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    College,
    Club,
    Event,
    Room,
    Team,
    User,
}

impl FormKind {
    pub const ALL: [FormKind; 6] = [
        FormKind::College,
        FormKind::Club,
        FormKind::Event,
        FormKind::Room,
        FormKind::Team,
        FormKind::User,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormKind::College => "college",
            FormKind::Club => "club",
            FormKind::Event => "event",
            FormKind::Room => "room",
            FormKind::Team => "team",
            FormKind::User => "user",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            FormKind::College => "/colleges/",
            FormKind::Club => "/clubs/",
            FormKind::Event => "/events/",
            FormKind::Room => "/rooms/",
            FormKind::Team => "/teams/add_to_event/",
            FormKind::User => "/users/",
        }
    }

    /// Tab whose controller is refreshed after a successful create.
    pub fn owner(self) -> Tab {
        match self {
            FormKind::College => Tab::Colleges,
            FormKind::Club => Tab::Clubs,
            FormKind::Event | FormKind::Team => Tab::Events,
            FormKind::Room => Tab::Accommodation,
            FormKind::User => Tab::Users,
        }
    }

    /// Volunteers cannot create clubs or events; only admins manage users.
    pub fn allowed_for(self, role: UserRole) -> bool {
        match self {
            FormKind::Club | FormKind::Event => role != UserRole::Volunteer,
            FormKind::User => role == UserRole::Admin,
            _ => true,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        FormKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| format!("unknown form `{raw}`"))
    }
}

pub trait CreateForm: Default + Send {
    type Payload: Serialize + Send + Sync;

    const KIND: FormKind;

    /// Field names accepted by [`CreateForm::set_field`].
    fn fields() -> &'static [&'static str];

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError>;

    fn validate(&self) -> Result<Self::Payload, ValidationError>;

    fn confirmation(payload: &Self::Payload, created: &Entity) -> String;

    /// Id of the owning tab's detail record the payload was added under.
    fn parent_record(_payload: &Self::Payload) -> Option<i64> {
        None
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn integer(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    required(field, value)?
        .parse()
        .map_err(|_| ValidationError::Invalid {
            field,
            message: "must be a whole number".to_string(),
        })
}

fn positive(field: &'static str, value: &str) -> Result<u32, ValidationError> {
    match integer(field, value)? {
        n if n >= 1 => u32::try_from(n).map_err(|_| ValidationError::Invalid {
            field,
            message: "is too large".to_string(),
        }),
        _ => Err(ValidationError::Invalid {
            field,
            message: "must be at least 1".to_string(),
        }),
    }
}

fn phone(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = required(field, value)?;
    if value.len() != 10 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Invalid {
            field,
            message: "must be exactly 10 digits".to_string(),
        });
    }
    Ok(value)
}

fn email(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = required(field, value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(value),
        _ => Err(ValidationError::Invalid {
            field,
            message: "must be an email address".to_string(),
        }),
    }
}

fn choice<E: FromStr>(field: &'static str, value: &str) -> Result<E, ValidationError>
where
    E::Err: fmt::Display,
{
    required(field, value)?
        .parse()
        .map_err(|err: E::Err| ValidationError::Invalid {
            field,
            message: err.to_string(),
        })
}

fn unknown(key: &str) -> ValidationError {
    ValidationError::UnknownField(key.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollegeForm {
    pub name: String,
    pub city: String,
    pub state: String,
}

impl CreateForm for CollegeForm {
    type Payload = NewCollege;

    const KIND: FormKind = FormKind::College;

    fn fields() -> &'static [&'static str] {
        &["name", "city", "state"]
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match key {
            "name" => &mut self.name,
            "city" => &mut self.city,
            "state" => &mut self.state,
            _ => return Err(unknown(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<NewCollege, ValidationError> {
        Ok(NewCollege {
            name: required("name", &self.name)?,
            city: required("city", &self.city)?,
            state: required("state", &self.state)?,
        })
    }

    fn confirmation(payload: &NewCollege, _created: &Entity) -> String {
        format!("College \"{}\" added successfully!", payload.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubForm {
    pub club_name: String,
    pub college_id: String,
    pub club_type: String,
    pub poc: String,
    pub poc_contact: String,
    pub poc_position: String,
}

impl CreateForm for ClubForm {
    type Payload = NewClub;

    const KIND: FormKind = FormKind::Club;

    fn fields() -> &'static [&'static str] {
        &[
            "club_name",
            "college_id",
            "club_type",
            "poc",
            "poc_contact",
            "poc_position",
        ]
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match key {
            "club_name" => &mut self.club_name,
            "college_id" => &mut self.college_id,
            "club_type" => &mut self.club_type,
            "poc" => &mut self.poc,
            "poc_contact" => &mut self.poc_contact,
            "poc_position" => &mut self.poc_position,
            _ => return Err(unknown(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<NewClub, ValidationError> {
        Ok(NewClub {
            club_name: required("club_name", &self.club_name)?,
            college_id: CollegeId(integer("college_id", &self.college_id)?),
            club_type: optional(&self.club_type),
            poc: optional(&self.poc),
            poc_contact: phone("poc_contact", &self.poc_contact)?,
            poc_position: optional(&self.poc_position),
        })
    }

    fn confirmation(payload: &NewClub, _created: &Entity) -> String {
        format!("Club \"{}\" added successfully!", payload.club_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventForm {
    pub name: String,
    pub fest_id: String,
    pub category: String,
    pub venue: String,
    pub date: String,
    pub time: String,
    pub max_team_size: String,
}

impl CreateForm for EventForm {
    type Payload = NewEvent;

    const KIND: FormKind = FormKind::Event;

    fn fields() -> &'static [&'static str] {
        &[
            "name",
            "fest_id",
            "category",
            "venue",
            "date",
            "time",
            "max_team_size",
        ]
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match key {
            "name" => &mut self.name,
            "fest_id" => &mut self.fest_id,
            "category" => &mut self.category,
            "venue" => &mut self.venue,
            "date" => &mut self.date,
            "time" => &mut self.time,
            "max_team_size" => &mut self.max_team_size,
            _ => return Err(unknown(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<NewEvent, ValidationError> {
        let date = required("date", &self.date)?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
            ValidationError::Invalid {
                field: "date",
                message: "expected YYYY-MM-DD".to_string(),
            }
        })?;
        let time = required("time", &self.time)?;
        let time = NaiveTime::parse_from_str(&time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&time, "%H:%M"))
            .map_err(|_| ValidationError::Invalid {
                field: "time",
                message: "expected HH:MM".to_string(),
            })?;

        Ok(NewEvent {
            name: required("name", &self.name)?,
            fest_id: FestId(integer("fest_id", &self.fest_id)?),
            category: choice::<Category>("category", &self.category)?,
            venue: optional(&self.venue),
            date,
            time,
            max_team_size: positive("max_team_size", &self.max_team_size)?,
        })
    }

    fn confirmation(payload: &NewEvent, _created: &Entity) -> String {
        format!("Event \"{}\" added successfully!", payload.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomForm {
    pub building_name: String,
    pub room_no: String,
    pub gender: String,
    pub max_capacity: String,
}

impl CreateForm for RoomForm {
    type Payload = NewRoom;

    const KIND: FormKind = FormKind::Room;

    fn fields() -> &'static [&'static str] {
        &["building_name", "room_no", "gender", "max_capacity"]
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match key {
            "building_name" => &mut self.building_name,
            "room_no" => &mut self.room_no,
            "gender" => &mut self.gender,
            "max_capacity" => &mut self.max_capacity,
            _ => return Err(unknown(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<NewRoom, ValidationError> {
        Ok(NewRoom {
            building_name: required("building_name", &self.building_name)?,
            room_no: required("room_no", &self.room_no)?,
            gender: choice::<Gender>("gender", &self.gender)?,
            max_capacity: positive("max_capacity", &self.max_capacity)?,
        })
    }

    fn confirmation(payload: &NewRoom, _created: &Entity) -> String {
        format!(
            "Room {} - {} added successfully!",
            payload.building_name, payload.room_no
        )
    }
}

/// One team member row inside [`TeamForm`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub merch_size: String,
    pub college_id: String,
    pub club_id: String,
}

impl MemberForm {
    /// Parses `name,email,phone,gender,merch_size,college_id[,club_id]`.
    pub fn parse_line(line: &str) -> Result<Self, ValidationError> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if !(6..=7).contains(&parts.len()) {
            return Err(ValidationError::Invalid {
                field: "member",
                message: "expected name,email,phone,gender,merch_size,college_id[,club_id]"
                    .to_string(),
            });
        }
        Ok(Self {
            name: parts[0].to_string(),
            email: parts[1].to_string(),
            phone: parts[2].to_string(),
            gender: parts[3].to_string(),
            merch_size: parts[4].to_string(),
            college_id: parts[5].to_string(),
            club_id: parts.get(6).copied().unwrap_or_default().to_string(),
        })
    }

    pub fn validate(&self) -> Result<NewParticipant, ValidationError> {
        let club_id = match optional(&self.club_id) {
            Some(raw) => Some(ClubId(integer("club_id", &raw)?)),
            None => None,
        };
        Ok(NewParticipant {
            name: required("name", &self.name)?,
            email: email("email", &self.email)?,
            phone: phone("phone", &self.phone)?,
            gender: choice::<Gender>("gender", &self.gender)?,
            merch_size: choice::<MerchSize>("merch_size", &self.merch_size)?,
            college_id: CollegeId(integer("college_id", &self.college_id)?),
            club_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamForm {
    pub team_name: String,
    pub event_id: String,
    members: Vec<MemberForm>,
}

impl TeamForm {
    pub fn members(&self) -> &[MemberForm] {
        &self.members
    }

    pub fn add_member(&mut self, member: MemberForm) -> usize {
        self.members.push(member);
        self.members.len() - 1
    }

    /// Removes the member at `index`; later members shift up by one.
    pub fn remove_member(&mut self, index: usize) -> Option<MemberForm> {
        (index < self.members.len()).then(|| self.members.remove(index))
    }

    /// Joins the team to `open_event` unless an event id was already typed.
    pub fn prefill_event(&mut self, open_event: Option<i64>) {
        if let Some(event_id) = open_event.filter(|_| self.event_id.trim().is_empty()) {
            self.event_id = event_id.to_string();
        }
    }
}

impl CreateForm for TeamForm {
    type Payload = NewTeam;

    const KIND: FormKind = FormKind::Team;

    fn fields() -> &'static [&'static str] {
        &["team_name", "event_id", "member", "remove_member"]
    }

    /// `member` appends one member parsed with [`MemberForm::parse_line`];
    /// `remove_member` takes a one-based position.
    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        match key {
            "team_name" => self.team_name = value.to_string(),
            "event_id" => self.event_id = value.to_string(),
            "member" => {
                self.add_member(MemberForm::parse_line(value)?);
            }
            "remove_member" => {
                let removed = value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|position| position.checked_sub(1))
                    .and_then(|index| self.remove_member(index));
                if removed.is_none() {
                    return Err(ValidationError::Invalid {
                        field: "remove_member",
                        message: format!("no member at position {}", value.trim()),
                    });
                }
            }
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<NewTeam, ValidationError> {
        let team_name = required("team_name", &self.team_name)?;
        let event_id = EventId(integer("event_id", &self.event_id)?);
        if self.members.is_empty() {
            return Err(ValidationError::NoMembers);
        }
        let participants = self
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                member.validate().map_err(|err| ValidationError::Member {
                    index: index + 1,
                    reason: Box::new(err),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NewTeam {
            team_name,
            event_id,
            participants,
        })
    }

    fn confirmation(payload: &NewTeam, created: &Entity) -> String {
        let count = created
            .get("members")
            .and_then(|members| members.as_array())
            .map(Vec::len)
            .filter(|count| *count > 0)
            .unwrap_or(payload.participants.len());
        format!(
            "Team \"{}\" added successfully with {count} member(s)!",
            payload.team_name
        )
    }

    fn parent_record(payload: &NewTeam) -> Option<i64> {
        Some(payload.event_id.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

impl CreateForm for UserForm {
    type Payload = NewUser;

    const KIND: FormKind = FormKind::User;

    fn fields() -> &'static [&'static str] {
        &["username", "password", "name", "email", "phone", "role"]
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match key {
            "username" => &mut self.username,
            "password" => &mut self.password,
            "name" => &mut self.name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "role" => &mut self.role,
            _ => return Err(unknown(key)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<NewUser, ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::Missing { field: "password" });
        }
        Ok(NewUser {
            username: required("username", &self.username)?,
            password: self.password.clone(),
            name: required("name", &self.name)?,
            email: email("email", &self.email)?,
            phone: phone("phone", &self.phone)?,
            role: choice::<UserRole>("role", &self.role)?,
        })
    }

    fn confirmation(payload: &NewUser, _created: &Entity) -> String {
        format!("User \"{}\" added successfully!", payload.username)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Entity),
    /// Validation failed; nothing was sent.
    Invalid(ValidationError),
    /// The backend refused or could not be reached; the modal stays open.
    Rejected(String),
}

/// Message shown when a create request fails.
pub fn failure_message(kind: FormKind, err: &FetchError) -> String {
    if let Some(detail) = err.detail() {
        return detail.to_string();
    }
    match err.status() {
        Some(status) => format!("Failed to add {kind} (HTTP {status})"),
        None => format!("Failed to add {kind}. Please check your connection and try again."),
    }
}

/// A create form plus its open/closed state and last error.
#[derive(Debug, Default)]
pub struct Modal<F: CreateForm> {
    form: F,
    open: bool,
    error: Option<String>,
}

impl<F: CreateForm> Modal<F> {
    pub fn new() -> Self {
        Self {
            form: F::default(),
            open: false,
            error: None,
        }
    }

    pub fn open(&mut self) {
        self.open = true;
        self.error = None;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validates, posts, and on success closes the modal and refreshes
    /// `owner`.
    pub async fn submit<T: TableWidget>(&mut self, owner: &ViewController<T>) -> SubmitOutcome {
        let kind = F::KIND;
        let payload = match self.form.validate() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(form = %kind, error = %err, "forms: validation failed");
                let message = err.to_string();
                self.error = Some(message.clone());
                owner.notifier().notify(Notice::error(message));
                return SubmitOutcome::Invalid(err);
            }
        };

        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                error!(form = %kind, error = %err, "forms: payload did not serialise");
                let message = format!("Failed to add {kind}");
                self.error = Some(message.clone());
                owner.notifier().notify(Notice::error(message.clone()));
                return SubmitOutcome::Rejected(message);
            }
        };

        match owner.fetcher().post_json(kind.endpoint(), &body).await {
            Ok(created) => {
                let message = F::confirmation(&payload, &created);
                info!(form = %kind, "forms: created");
                self.open = false;
                self.error = None;
                self.form = F::default();
                owner.notifier().notify(Notice::success(message));
                refresh_owner(kind, F::parent_record(&payload), owner).await;
                SubmitOutcome::Created(created)
            }
            Err(err) => {
                error!(form = %kind, error = %err, "forms: create failed");
                let message = failure_message(kind, &err);
                self.error = Some(message.clone());
                owner.notifier().notify(Notice::error(message.clone()));
                SubmitOutcome::Rejected(message)
            }
        }
    }
}

/// Re-renders the open detail when the record was added under it, otherwise
/// reloads the owner's list.
async fn refresh_owner<T: TableWidget>(
    kind: FormKind,
    parent: Option<i64>,
    owner: &ViewController<T>,
) -> Outcome {
    if owner.tab() != kind.owner() {
        warn!(form = %kind, tab = %owner.tab(), "forms: refreshing a non-owning tab");
    }
    match parent {
        Some(id) if owner.view_state().detail_id() == Some(id) => owner.refresh_detail().await,
        _ => owner.reload().await,
    }
}
