//! Cell formatting rules shared by every tab.

use std::fmt;

use chrono::NaiveDate;
use shared::domain::{Category, Entity};
use tracing::debug;

pub const NOT_AVAILABLE: &str = "N/A";

const DANGER_PERCENT: i64 = 90;
const WARNING_PERCENT: i64 = 70;

/// Field value as shown in a cell; absent values become `N/A`.
pub fn display_field(entity: &Entity, key: &str) -> String {
    entity
        .text(key)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeLevel {
    Success,
    Warning,
    Danger,
}

impl BadgeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeLevel::Success => "success",
            BadgeLevel::Warning => "warning",
            BadgeLevel::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyBadge {
    /// Rounded percentage; `None` when the room has no capacity.
    pub percent: Option<i64>,
    pub level: BadgeLevel,
}

impl fmt::Display for OccupancyBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent {
            Some(percent) => write!(f, "{percent}% [{}]", self.level.as_str()),
            None => write!(f, "{NOT_AVAILABLE} [{}]", self.level.as_str()),
        }
    }
}

/// Level thresholds compare the exact ratio; only the displayed percentage is
/// rounded.
pub fn occupancy_badge(occupancy: i64, capacity: i64) -> OccupancyBadge {
    let occupancy = occupancy.max(0);
    if capacity <= 0 {
        return OccupancyBadge {
            percent: None,
            level: if occupancy > 0 {
                BadgeLevel::Danger
            } else {
                BadgeLevel::Success
            },
        };
    }

    let scaled = i128::from(occupancy) * 100;
    let capacity_wide = i128::from(capacity);
    let level = if scaled >= i128::from(DANGER_PERCENT) * capacity_wide {
        BadgeLevel::Danger
    } else if scaled >= i128::from(WARNING_PERCENT) * capacity_wide {
        BadgeLevel::Warning
    } else {
        BadgeLevel::Success
    };
    // Half-up rounding in integer space.
    let percent =
        i64::try_from((scaled * 2 + capacity_wide) / (capacity_wide * 2)).unwrap_or(i64::MAX);

    OccupancyBadge {
        percent: Some(percent),
        level,
    }
}

/// Badge cell for a row carrying occupancy and capacity fields.
pub fn badge_cell(entity: &Entity, occupancy_key: &str, capacity_key: &str) -> String {
    match (entity.int(occupancy_key), entity.int(capacity_key)) {
        (Some(occupancy), Some(capacity)) => occupancy_badge(occupancy, capacity).to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn member_label(count: u64) -> String {
    if count == 1 {
        "1 member".to_string()
    } else {
        format!("{count} members")
    }
}

/// `2025-03-14` -> `March 14, 2025`; anything else is shown as sent.
pub fn format_event_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date.format("%B %-d, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    pub technical: Vec<Entity>,
    pub cultural: Vec<Entity>,
    pub managerial: Vec<Entity>,
}

impl CategoryBuckets {
    pub fn bucket(&self, category: Category) -> &[Entity] {
        match category {
            Category::Technical => &self.technical,
            Category::Cultural => &self.cultural,
            Category::Managerial => &self.managerial,
        }
    }

    pub fn total(&self) -> usize {
        self.technical.len() + self.cultural.len() + self.managerial.len()
    }
}

/// Splits events into the three fixed category buckets.
///
/// Events whose `category` is anything other than the exact lowercase names
/// land in no bucket.
pub fn group_by_category(events: &[Entity]) -> CategoryBuckets {
    let mut buckets = CategoryBuckets::default();
    for event in events {
        match event.text("category").as_deref() {
            Some("technical") => buckets.technical.push(event.clone()),
            Some("cultural") => buckets.cultural.push(event.clone()),
            Some("managerial") => buckets.managerial.push(event.clone()),
            other => debug!(
                event_id = event.int("event_id").unwrap_or_default(),
                category = other.unwrap_or(""),
                "events: category outside fixed buckets"
            ),
        }
    }
    buckets
}

pub fn empty_bucket_message(category: Category) -> String {
    format!("No {} events found", category.as_str())
}

/// Text lines of one event card on the grouped events view.
pub fn event_card(event: &Entity) -> Vec<String> {
    let teams = event.int("team_count").unwrap_or(0);
    let participants = event.int("participant_count").unwrap_or(0);
    vec![
        format!(
            "#{} {}",
            display_field(event, "event_id"),
            display_field(event, "name")
        ),
        format!(
            "  Date: {}",
            event
                .text("date")
                .map(|raw| format_event_date(&raw))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        ),
        format!("  Time: {}", display_field(event, "time")),
        format!(
            "  Venue: {}",
            event.text("venue").unwrap_or_else(|| "Venue TBA".to_string())
        ),
        format!("  {teams} Teams | {participants} Participants"),
    ]
}
