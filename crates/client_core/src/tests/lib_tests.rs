use super::*;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{domain::UserRole, protocol::Credentials};
use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    forms::{CollegeForm, CreateForm, MemberForm, Modal, SubmitOutcome, TeamForm, ValidationError},
    session::{login, LoginError, SessionStore},
    tabs::filter_choices,
};

fn rows(value: Value) -> Vec<Entity> {
    serde_json::from_value(value).expect("rows")
}

#[derive(Clone, Default)]
struct Backend {
    college_queries: Arc<Mutex<Vec<Option<String>>>>,
    hits: Arc<Mutex<HashMap<&'static str, usize>>>,
    team_posts: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    fn hit(&self, key: &'static str) {
        *self.hits.lock().expect("hits").entry(key).or_default() += 1;
    }

    fn hits(&self, key: &str) -> usize {
        self.hits
            .lock()
            .expect("hits")
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

type Failure = (StatusCode, Json<Value>);

async fn list_colleges(
    State(backend): State<Backend>,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    backend.hit("colleges");
    backend
        .college_queries
        .lock()
        .expect("queries")
        .push(query);
    Json(json!([
        { "college_id": 1, "name": "IIT Bombay", "city": "Mumbai", "state": "MH" }
    ]))
}

async fn create_college(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    backend.hit("create_college");
    if body["name"] == "Dup" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "College already exists" })),
        ));
    }
    let mut created = body;
    created["college_id"] = json!(2);
    Ok(Json(created))
}

async fn list_rooms(State(backend): State<Backend>) -> Json<Value> {
    backend.hit("rooms");
    Json(json!([
        {
            "room_id": 1, "building_name": "Hostel A", "room_no": "101",
            "gender": "MALE", "max_capacity": 4, "current_occupancy": 3
        },
        {
            "room_id": 2, "building_name": "Hostel B", "room_no": "7",
            "gender": "FEMALE", "max_capacity": 2, "current_occupancy": 0
        }
    ]))
}

async fn room_participants(
    State(backend): State<Backend>,
    Path(room_id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    backend.hit("room_participants");
    if room_id == 2 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "No participants in room" })),
        ));
    }
    if room_id == 3 {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))));
    }
    Ok(Json(json!([
        {
            "participant_id": 8, "name": "Ravi", "email": "ravi@fest.in",
            "phone": "9876543210", "gender": "MALE", "merch_size": "L",
            "college_id": 1, "club_id": null
        }
    ])))
}

async fn list_events(State(backend): State<Backend>) -> Json<Value> {
    backend.hit("events");
    Json(json!([
        {
            "event_id": 1, "name": "Hackathon", "category": "technical",
            "date": "2025-03-14", "time": "09:00:00", "venue": "Main Hall",
            "max_team_size": 4
        },
        {
            "event_id": 2, "name": "Quiz", "category": "managerial",
            "date": "2025-03-15", "time": "10:00:00", "venue": null,
            "max_team_size": 3
        }
    ]))
}

async fn event_stats(Path(event_id): Path<i64>) -> Result<Json<Value>, Failure> {
    if event_id == 1 {
        return Ok(Json(json!({ "team_count": 2, "participant_count": 6 })));
    }
    Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))))
}

async fn event_teams(State(backend): State<Backend>, Path(_event_id): Path<i64>) -> Json<Value> {
    backend.hit("teams");
    Json(json!([
        { "team_id": 10, "team_name": "Coders", "participant_count": 2 },
        { "team_id": 11, "team_name": "Solo", "participant_count": 1 }
    ]))
}

async fn team_members(Path(_team_id): Path<i64>) -> Json<Value> {
    Json(json!([
        {
            "participant_id": 21, "name": "Asha", "email": "asha@fest.in",
            "phone": "9876543210", "gender": "FEMALE", "merch_size": "M",
            "college_id": 1, "club_id": 4
        },
        {
            "participant_id": 22, "name": "Meera", "email": "meera@fest.in",
            "phone": "9876543211", "gender": "FEMALE", "merch_size": "S",
            "college_id": 1, "club_id": null
        }
    ]))
}

async fn add_team(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.team_posts.lock().expect("posts").push(body.clone());
    let members = body["participants"].clone();
    Json(json!({ "team_name": body["team_name"], "members": members }))
}

async fn validate_user(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    backend.hit("validate");
    if body["password"] == "secret" {
        return Ok(Json(json!({
            "user_id": 1,
            "username": body["username"],
            "name": "Asha",
            "role": "Event Head"
        })));
    }
    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Incorrect password" })),
    ))
}

async fn unprocessable() -> Failure {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "detail": [
                { "loc": ["body", "name"], "msg": "field required" },
                { "loc": ["body", "city"], "msg": "field required" }
            ]
        })),
    )
}

async fn spawn_backend() -> (String, Backend) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let backend = Backend::default();
    let app = Router::new()
        .route("/colleges/query/", get(list_colleges))
        .route("/colleges/", post(create_college))
        .route("/rooms/occupancy/", get(list_rooms))
        .route("/rooms/:id/participants/", get(room_participants))
        .route("/events/query/", get(list_events))
        .route("/events/:id/stats/", get(event_stats))
        .route("/events/:id/teams/", get(event_teams))
        .route("/teams/:id/participants/", get(team_members))
        .route("/teams/add_to_event/", post(add_team))
        .route("/users/validate/", post(validate_user))
        .route("/broken/", get(unprocessable))
        .with_state(backend.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), backend)
}

fn api(url: &str) -> Arc<dyn DataFetcher> {
    Arc::new(ApiClient::new(url, Duration::from_secs(5)).expect("client"))
}

fn controller_for(
    tab: Tab,
    fetcher: Arc<dyn DataFetcher>,
) -> (ViewController<Table>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let controller = ViewController::new(
        TabConfig::for_tab(tab),
        fetcher,
        notifier.clone(),
        Table::default(),
    );
    (controller, notifier)
}

enum Scripted {
    Rows(Vec<Entity>),
    Fail(FetchError),
    Gated(oneshot::Receiver<()>, Vec<Entity>),
}

/// In-memory fetcher answering each path from a queue of scripted replies.
#[derive(Default)]
struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn push(&self, path: &str, reply: Scripted) {
        self.replies
            .lock()
            .expect("replies")
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    fn next(&self, call: String, path: &str) -> Option<Scripted> {
        self.calls.lock().expect("calls").push(call);
        self.replies
            .lock()
            .expect("replies")
            .get_mut(path)
            .and_then(VecDeque::pop_front)
    }
}

fn unscripted(path: &str) -> FetchError {
    FetchError::Transport {
        path: path.to_string(),
        message: "unscripted".to_string(),
    }
}

#[async_trait]
impl DataFetcher for ScriptedFetcher {
    async fn get_collection(
        &self,
        path: &str,
        _query: &[(String, String)],
    ) -> Result<Vec<Entity>, FetchError> {
        match self.next(format!("GET {path}"), path) {
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Gated(gate, rows)) => {
                let _ = gate.await;
                Ok(rows)
            }
            None => Err(unscripted(path)),
        }
    }

    async fn get_record(&self, path: &str) -> Result<Entity, FetchError> {
        match self.next(format!("GET {path}"), path) {
            Some(Scripted::Rows(mut rows)) if !rows.is_empty() => Ok(rows.remove(0)),
            Some(Scripted::Fail(err)) => Err(err),
            _ => Err(unscripted(path)),
        }
    }

    async fn post_json(&self, path: &str, _body: &Value) -> Result<Entity, FetchError> {
        match self.next(format!("POST {path}"), path) {
            Some(Scripted::Rows(mut rows)) if !rows.is_empty() => Ok(rows.remove(0)),
            Some(Scripted::Fail(err)) => Err(err),
            _ => Err(unscripted(path)),
        }
    }
}

fn server_error(path: &str) -> FetchError {
    FetchError::Status {
        path: path.to_string(),
        status: 500,
        detail: None,
    }
}

#[tokio::test]
async fn empty_filters_send_no_query_string() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Colleges, api(&url));

    let outcome = controller.init().await;
    assert_eq!(
        outcome,
        Outcome::Rendered {
            view: ActiveView::List,
            rows: 1
        }
    );

    controller
        .load(Filters::new().with("city", "   ").with("state", ""))
        .await;
    controller
        .load(Filters::new().with("city", " Mumbai ").with("state", ""))
        .await;

    let queries = backend.college_queries.lock().expect("queries").clone();
    assert_eq!(queries, vec![None, None, Some("city=Mumbai".to_string())]);
    controller.with_table(|table| {
        assert_eq!(table.columns(), ["ID", "Name", "City", "State"]);
        assert_eq!(table.rows()[0], vec!["1", "IIT Bombay", "Mumbai", "MH"]);
    });
}

#[tokio::test]
async fn init_twice_fetches_once() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Colleges, api(&url));

    controller.init().await;
    assert_eq!(controller.init().await, Outcome::Unchanged);
    assert_eq!(backend.hits("colleges"), 1);
    assert!(controller.is_initialized());
}

#[tokio::test]
async fn reload_reuses_active_filters() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Colleges, api(&url));

    controller.load(Filters::new().with("state", "MH")).await;
    controller.reload().await;

    let queries = backend.college_queries.lock().expect("queries").clone();
    assert_eq!(
        queries,
        vec![Some("state=MH".to_string()), Some("state=MH".to_string())]
    );
}

#[tokio::test]
async fn failed_load_keeps_previous_rows_and_filters() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.push(
        "/colleges/query/",
        Scripted::Rows(rows(json!([{ "college_id": 1, "name": "IIT Bombay" }]))),
    );
    fetcher.push(
        "/colleges/query/",
        Scripted::Fail(server_error("/colleges/query/")),
    );
    let (controller, notifier) = controller_for(Tab::Colleges, fetcher.clone());

    controller.init().await;
    let outcome = controller.load(Filters::new().with("city", "Pune")).await;

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(controller.list_rows().len(), 1);
    assert!(controller.view_state().filters.get("city").is_none());
    controller.with_table(|table| assert_eq!(table.rows()[0][1], "IIT Bombay"));
    assert_eq!(
        notifier.last(),
        Some(Notice::error("Failed to load colleges. Please try again."))
    );
}

#[tokio::test]
async fn superseded_response_is_not_rendered() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let (release, gate) = oneshot::channel();
    fetcher.push(
        "/colleges/query/",
        Scripted::Gated(gate, rows(json!([{ "college_id": 1, "name": "Old" }]))),
    );
    fetcher.push(
        "/colleges/query/",
        Scripted::Rows(rows(json!([{ "college_id": 2, "name": "New" }]))),
    );
    let (controller, _notifier) = controller_for(Tab::Colleges, fetcher.clone());
    let controller = Arc::new(controller);

    let slow = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.load(Filters::new().with("city", "A")).await })
    };
    while fetcher.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    let fast = controller.load(Filters::new().with("city", "B")).await;
    release.send(()).expect("release slow response");
    let slow = slow.await.expect("join");

    assert_eq!(slow, Outcome::Stale);
    assert_eq!(
        fast,
        Outcome::Rendered {
            view: ActiveView::List,
            rows: 1
        }
    );
    assert_eq!(controller.view_state().filters.get("city"), Some("B"));
    controller.with_table(|table| assert_eq!(table.rows()[0][1], "New"));
}

#[tokio::test]
async fn back_invalidates_in_flight_drill_down() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.push(
        "/events/query/",
        Scripted::Rows(rows(json!([{ "event_id": 1, "name": "Hackathon" }]))),
    );
    fetcher.push(
        "/events/1/stats/",
        Scripted::Rows(rows(json!([{ "team_count": 1, "participant_count": 2 }]))),
    );
    fetcher.push(
        "/events/1/teams/",
        Scripted::Rows(rows(json!([{ "team_id": 10, "team_name": "Coders" }]))),
    );
    let (release, gate) = oneshot::channel();
    fetcher.push(
        "/teams/10/participants/",
        Scripted::Gated(gate, rows(json!([{ "participant_id": 21 }]))),
    );
    let (controller, _notifier) = controller_for(Tab::Events, fetcher.clone());
    let controller = Arc::new(controller);
    controller.init().await;
    controller.view_detail(1).await;

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.view_sub_detail(10).await })
    };
    while !fetcher
        .calls()
        .iter()
        .any(|call| call == "GET /teams/10/participants/")
    {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        controller.back(),
        Outcome::Rendered {
            view: ActiveView::List,
            rows: 1
        }
    );
    release.send(()).expect("release");

    assert_eq!(pending.await.expect("join"), Outcome::Stale);
    assert_eq!(controller.view_state().active_view(), ActiveView::List);
}

#[tokio::test]
async fn drill_down_not_found_stays_on_list() {
    let (url, _backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Accommodation, api(&url));
    controller.init().await;

    assert_eq!(controller.view_detail(2).await, Outcome::NotFound);
    assert_eq!(controller.view_state().active_view(), ActiveView::List);
    assert_eq!(
        notifier.last(),
        Some(Notice::info("No participants found in this room."))
    );

    assert_eq!(controller.view_detail(3).await, Outcome::Failed);
    assert_eq!(controller.view_state().active_view(), ActiveView::List);
    assert_eq!(
        notifier.last(),
        Some(Notice::error(
            "Failed to load room participants. Please try again."
        ))
    );
    controller.with_table(|table| assert_eq!(table.rows().len(), 2));
}

#[tokio::test]
async fn room_detail_then_back_uses_cached_list() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Accommodation, api(&url));
    controller.init().await;
    controller.with_table(|table| {
        assert_eq!(table.rows()[0][6], "75% [warning]");
        assert_eq!(table.rows()[1][6], "0% [success]");
    });

    assert_eq!(
        controller.view_detail(1).await,
        Outcome::Rendered {
            view: ActiveView::Detail,
            rows: 1
        }
    );
    controller.with_table(|table| {
        assert_eq!(
            table.caption(),
            Some("Room: Hostel A - 101 [MALE] Occupancy: 3 / 4")
        );
        assert_eq!(table.columns()[5], "Merch Size");
        assert_eq!(table.rows()[0][7], "N/A");
    });

    assert_eq!(
        controller.back(),
        Outcome::Rendered {
            view: ActiveView::List,
            rows: 2
        }
    );
    assert_eq!(backend.hits("rooms"), 1);
    controller.with_table(|table| {
        assert_eq!(table.caption(), None);
        assert_eq!(table.columns()[6], "Occupancy %");
    });
    assert_eq!(controller.back(), Outcome::Unchanged);
}

#[tokio::test]
async fn list_search_does_not_hide_drill_down_rows() {
    let (url, _backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Accommodation, api(&url));
    controller.init().await;
    controller.with_table_mut(|table| {
        table.sort_by(0, SortOrder::Descending);
        table.search(Some("Hostel".into()));
    });

    let outcome = controller.open(1).await;
    assert_eq!(
        outcome,
        Outcome::Rendered {
            view: ActiveView::Detail,
            rows: 1
        }
    );
    controller.with_table(|table| {
        assert_eq!(table.visible_rows().len(), 1);
        assert_eq!(table.visible_rows()[0][1], "Ravi");
        assert_eq!(table.sort(), None);
        assert_eq!(table.info(), "Showing 1 to 1 of 1 entries");
    });

    controller.back();
    controller.with_table(|table| {
        assert_eq!(table.sort(), Some((0, SortOrder::Descending)));
        assert_eq!(
            table.info(),
            "Showing 1 to 2 of 2 entries (filtered from 2 total entries)"
        );
        assert_eq!(table.visible_rows()[0][0], "2");
    });

    // A different room opens with fresh table settings.
    controller.with_table_mut(|table| table.search(Some("Hostel B".into())));
    controller.open(1).await;
    controller.with_table_mut(|table| table.search(Some("nobody".into())));
    controller.back();
    controller.with_table(|table| assert_eq!(table.visible_rows().len(), 1));
    controller.open(1).await;
    controller.with_table(|table| assert_eq!(table.visible_rows().len(), 1));
}

#[tokio::test]
async fn event_stats_failure_degrades_to_zero() {
    let (url, _backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Events, api(&url));
    controller.init().await;

    let events = controller.list_rows();
    assert_eq!(events[0].int("team_count"), Some(2));
    assert_eq!(events[0].int("participant_count"), Some(6));
    assert_eq!(events[1].int("team_count"), Some(0));
    assert_eq!(events[1].int("participant_count"), Some(0));
    controller.with_table(|table| {
        assert_eq!(
            table.rows()[1],
            vec!["2", "Quiz", "Managerial", "March 15, 2025", "10:00:00", "N/A", "0", "0"]
        );
    });
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn event_teams_and_members_drill_down_two_levels() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Events, api(&url));
    controller.init().await;

    controller.open(1).await;
    controller.with_table(|table| {
        assert_eq!(
            table.caption(),
            Some("Hackathon | Category: Technical | Date: March 14, 2025 | Time: 09:00:00 | Venue: Main Hall | Max Team Size: 4 | Event ID: 1")
        );
        assert_eq!(table.rows()[0], vec!["10", "Coders", "2 members"]);
        assert_eq!(table.rows()[1], vec!["11", "Solo", "1 member"]);
    });

    assert_eq!(
        controller.open(10).await,
        Outcome::Rendered {
            view: ActiveView::SubDetail,
            rows: 2
        }
    );
    assert_eq!(controller.view_state().trail(), [1, 10]);
    controller.with_table(|table| {
        assert_eq!(table.caption(), Some("Coders (2 members)"));
        assert_eq!(table.rows()[1][7], "N/A");
    });
    assert_eq!(controller.open(21).await, Outcome::Unchanged);

    controller.back();
    controller.with_table(|table| assert_eq!(table.rows().len(), 2));
    assert_eq!(controller.view_state().active_view(), ActiveView::Detail);
    assert_eq!(backend.hits("teams"), 1);

    controller.reset();
    assert_eq!(controller.view_state().active_view(), ActiveView::List);
    assert_eq!(backend.hits("events"), 1);
}

#[tokio::test]
async fn detail_is_unavailable_on_flat_tabs() {
    let (url, _backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Colleges, api(&url));
    controller.init().await;
    assert_eq!(controller.view_detail(1).await, Outcome::Unchanged);
    assert_eq!(controller.refresh_detail().await, Outcome::Unchanged);
}

#[tokio::test]
async fn rejected_create_keeps_modal_open_with_values() {
    let (url, backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Colleges, api(&url));
    controller.init().await;

    let mut modal: Modal<CollegeForm> = Modal::new();
    modal.open();
    modal.form_mut().set_field("name", "Dup").expect("field");
    modal.form_mut().set_field("city", "Pune").expect("field");
    modal.form_mut().set_field("state", "MH").expect("field");

    let outcome = modal.submit(&controller).await;

    assert_eq!(
        outcome,
        SubmitOutcome::Rejected("College already exists".into())
    );
    assert!(modal.is_open());
    assert_eq!(modal.error(), Some("College already exists"));
    assert_eq!(modal.form().name, "Dup");
    assert_eq!(modal.form().city, "Pune");
    assert_eq!(
        notifier.last(),
        Some(Notice::error("College already exists"))
    );
    assert_eq!(backend.hits("colleges"), 1);
}

#[tokio::test]
async fn successful_create_closes_and_reloads_owner() {
    let (url, backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Colleges, api(&url));
    controller.load(Filters::new().with("state", "MH")).await;

    let mut modal: Modal<CollegeForm> = Modal::new();
    modal.open();
    *modal.form_mut() = CollegeForm {
        name: "COEP".into(),
        city: "Pune".into(),
        state: "MH".into(),
    };

    let outcome = modal.submit(&controller).await;

    assert!(matches!(outcome, SubmitOutcome::Created(ref created) if created.int("college_id") == Some(2)));
    assert!(!modal.is_open());
    assert_eq!(modal.form(), &CollegeForm::default());
    assert_eq!(
        notifier.last(),
        Some(Notice::success("College \"COEP\" added successfully!"))
    );
    let queries = backend.college_queries.lock().expect("queries").clone();
    assert_eq!(queries.last(), Some(&Some("state=MH".to_string())));
    assert_eq!(backend.hits("colleges"), 2);
}

#[tokio::test]
async fn invalid_form_never_reaches_the_network() {
    let (url, backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Colleges, api(&url));

    let mut modal: Modal<CollegeForm> = Modal::new();
    modal.open();
    modal.form_mut().name = "COEP".into();

    let outcome = modal.submit(&controller).await;

    assert_eq!(
        outcome,
        SubmitOutcome::Invalid(ValidationError::Missing { field: "city" })
    );
    assert!(modal.is_open());
    assert_eq!(backend.hits("create_college"), 0);
    assert_eq!(notifier.last(), Some(Notice::error("city is required")));
}

#[tokio::test]
async fn team_without_members_is_blocked_before_posting() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let (controller, notifier) = controller_for(Tab::Events, fetcher.clone());

    let mut modal: Modal<TeamForm> = Modal::new();
    modal.open();
    modal.form_mut().team_name = "Coders".into();
    modal.form_mut().event_id = "1".into();

    let outcome = modal.submit(&controller).await;

    assert_eq!(outcome, SubmitOutcome::Invalid(ValidationError::NoMembers));
    assert!(fetcher.calls().is_empty());
    assert_eq!(
        notifier.last(),
        Some(Notice::error("Please add at least one team member."))
    );
}

#[tokio::test]
async fn created_team_refreshes_open_event() {
    let (url, backend) = spawn_backend().await;
    let (controller, notifier) = controller_for(Tab::Events, api(&url));
    controller.init().await;
    controller.view_detail(1).await;

    let mut modal: Modal<TeamForm> = Modal::new();
    modal.open();
    let form = modal.form_mut();
    form.team_name = "Night Owls".into();
    form.event_id = "1".into();
    form.add_member(
        MemberForm::parse_line("Asha,asha@fest.in,9876543210,FEMALE,M,1").expect("member"),
    );
    form.add_member(
        MemberForm::parse_line("Ravi,ravi@fest.in,9876543211,MALE,L,1,4").expect("member"),
    );

    let outcome = modal.submit(&controller).await;

    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    assert_eq!(
        notifier.last(),
        Some(Notice::success(
            "Team \"Night Owls\" added successfully with 2 member(s)!"
        ))
    );
    assert_eq!(backend.hits("teams"), 2);
    assert_eq!(controller.view_state().active_view(), ActiveView::Detail);
    let posts = backend.team_posts.lock().expect("posts").clone();
    assert_eq!(posts[0]["participants"][1]["club_id"], 4);
    assert_eq!(posts[0]["event_id"], 1);
}

#[tokio::test]
async fn team_for_another_event_reloads_the_list_instead() {
    let (url, backend) = spawn_backend().await;
    let (controller, _notifier) = controller_for(Tab::Events, api(&url));
    controller.init().await;
    controller.view_detail(1).await;

    let mut modal: Modal<TeamForm> = Modal::new();
    modal.open();
    let form = modal.form_mut();
    form.team_name = "Quizzers".into();
    form.event_id = "2".into();
    form.prefill_event(controller.view_state().detail_id());
    form.add_member(
        MemberForm::parse_line("Asha,asha@fest.in,9876543210,FEMALE,M,1").expect("member"),
    );

    assert!(matches!(
        modal.submit(&controller).await,
        SubmitOutcome::Created(_)
    ));
    assert_eq!(backend.hits("teams"), 1);
    assert_eq!(backend.hits("events"), 2);
    assert_eq!(controller.view_state().detail_id(), Some(1));
    let posts = backend.team_posts.lock().expect("posts").clone();
    assert_eq!(posts[0]["event_id"], 2);
}

#[tokio::test]
async fn login_stores_session_and_skips_network_when_present() {
    let (url, backend) = spawn_backend().await;
    let fetcher = api(&url);
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path().join("session.json"));

    let wrong = Credentials {
        username: "asha".into(),
        password: "nope".into(),
    };
    match login(fetcher.as_ref(), &store, &wrong).await {
        Err(LoginError::Rejected(message)) => assert_eq!(message, "Incorrect password"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!store.path().exists());

    let right = Credentials {
        username: "asha".into(),
        password: "secret".into(),
    };
    let user = login(fetcher.as_ref(), &store, &right)
        .await
        .expect("login");
    assert_eq!(user.role, UserRole::EventHead);
    assert_eq!(store.guard().expect("session").name, "Asha");

    match login(fetcher.as_ref(), &store, &right).await {
        Err(LoginError::AlreadyLoggedIn { name, .. }) => assert_eq!(name, "Asha"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(backend.hits("validate"), 2);
}

#[tokio::test]
async fn list_style_error_detail_is_joined() {
    let (url, _backend) = spawn_backend().await;
    let err = api(&url)
        .get_record("/broken/")
        .await
        .expect_err("422");
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.detail(), Some("field required; field required"));
    assert_eq!(
        err.status_line().as_deref(),
        Some("422 Unprocessable Entity")
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = api(&format!("http://{addr}"))
        .get_collection("/colleges/query/", &[])
        .await
        .expect_err("connection refused");
    assert!(err.is_transport());
    assert!(!err.is_not_found());
}

#[test]
fn invalid_base_url_is_rejected() {
    assert!(matches!(
        ApiClient::new("not a url", DEFAULT_REQUEST_TIMEOUT),
        Err(FetchError::InvalidUrl { .. })
    ));
}

#[tokio::test]
async fn filter_choices_tolerate_failed_lookups() {
    let fetcher = ScriptedFetcher::default();
    fetcher.push(
        "/colleges/query/",
        Scripted::Rows(rows(json!([
            { "college_id": 1, "name": "IIT Bombay" },
            { "college_id": 2, "name": "COEP" }
        ]))),
    );
    fetcher.push(
        "/clubs/query/",
        Scripted::Fail(server_error("/clubs/query/")),
    );
    fetcher.push(
        "/events/query/",
        Scripted::Rows(rows(json!([{ "event_id": 5, "name": "Quiz" }]))),
    );

    let choices = filter_choices(&fetcher, Tab::Participants).await;

    let by_key: HashMap<&str, &Vec<(String, String)>> = choices
        .iter()
        .map(|choice| (choice.key, &choice.options))
        .collect();
    assert_eq!(
        by_key["college_name"],
        &vec![
            ("IIT Bombay".to_string(), "IIT Bombay".to_string()),
            ("COEP".to_string(), "COEP".to_string())
        ]
    );
    assert!(by_key["club_id"].is_empty());
    assert_eq!(by_key["gender"].len(), 2);
    assert_eq!(by_key["event_id"], &vec![("5".to_string(), "Quiz".to_string())]);
}
