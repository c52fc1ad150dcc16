use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    Category, ClubId, CollegeId, Entity, EventId, FestId, Gender, MerchSize, UserRole,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCollege {
    pub name: String,
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClub {
    pub club_name: String,
    pub college_id: CollegeId,
    pub club_type: Option<String>,
    pub poc: Option<String>,
    pub poc_contact: String,
    pub poc_position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub fest_id: FestId,
    pub category: Category,
    pub venue: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub max_team_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoom {
    pub building_name: String,
    pub room_no: String,
    pub gender: Gender,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub merch_size: MerchSize,
    pub college_id: CollegeId,
    pub club_id: Option<ClubId>,
}

/// Team plus its members, created by the backend in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTeam {
    pub team_name: String,
    pub event_id: EventId,
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// User record returned by `/users/validate/` and kept as the local session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    pub role: UserRole,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    #[serde(default)]
    pub team_count: u64,
    #[serde(default)]
    pub participant_count: u64,
}

impl EventStats {
    pub fn into_entity(self) -> Entity {
        let mut entity = Entity::new();
        entity.insert("team_count", self.team_count);
        entity.insert("participant_count", self.participant_count);
        entity
    }
}
