#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use sqlx::types::Json;
use tokio::sync::oneshot;
use uuid::Uuid;

use sheetapi::auth::jwt::{self, Claims};
use sheetapi::config::{CachePolicy, Config, DEFAULT_SHEETS_BASE_URL};
use sheetapi::models::{Endpoint, EndpointMethods, Project, User};
use sheetapi::sheets::{
    CellRow, Credentials, GatewayError, GatewayErrorKind, SheetRange, SheetsConnector,
    SpreadsheetGateway,
};
use sheetapi::state::SharedState;
use sheetapi::store::Store;

pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";
pub const SPREADSHEET_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz_0123456789-ab";

// ── In-memory store ─────────────────────────────────────────────

/// `Store` over two maps. Mirrors the Postgres queries closely enough for the
/// engine: charges never go below zero and resets only touch due users.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    projects: Mutex<HashMap<Uuid, Project>>,
    fail_charges: AtomicBool,
}

impl MemoryStore {
    pub fn insert_user(&self, name: &str, quota: i32) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email: Some(format!("{}@test.com", name.to_lowercase())),
            google_id: format!("google-{}", Uuid::now_v7()),
            access_token: format!("access-{name}"),
            refresh_token: Some(format!("refresh-{name}")),
            daily_request_quota: quota,
            remaining_requests: quota,
            last_reset: now,
            created_at: now,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn user(&self, id: Uuid) -> User {
        self.users.lock().unwrap()[&id].clone()
    }

    pub fn project(&self, id: Uuid) -> Project {
        self.projects.lock().unwrap()[&id].clone()
    }

    pub fn set_remaining(&self, id: Uuid, remaining: i32) {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.remaining_requests = remaining;
        }
    }

    pub fn set_last_reset(&self, id: Uuid, last_reset: DateTime<Utc>) {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.last_reset = last_reset;
        }
    }

    pub fn remove_user(&self, id: Uuid) {
        self.users.lock().unwrap().remove(&id);
    }

    /// Make every following charge fail with a database error.
    pub fn fail_charges(&self) {
        self.fail_charges.store(true, Ordering::SeqCst);
    }

    fn update_project(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Project),
    ) -> Result<Project, sqlx::Error> {
        let mut projects = self.projects.lock().unwrap();
        let project = projects.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
        apply(project);
        project.updated_at = Utc::now();
        Ok(project.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
        Ok(self.projects.lock().unwrap().get(&id).cloned())
    }

    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .get(&id)
            .filter(|p| p.owner_id == owner_id)
            .cloned())
    }

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        let mut projects: Vec<Project> = self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn create_project(
        &self,
        owner_id: Uuid,
        name: &str,
        spreadsheet_id: &str,
    ) -> Result<Project, sqlx::Error> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::now_v7(),
            owner_id,
            name: name.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            is_protected: false,
            protection_token: String::new(),
            endpoints: Json(Vec::new()),
            created_at: now,
            updated_at: now,
        };
        self.projects
            .lock()
            .unwrap()
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut projects = self.projects.lock().unwrap();
        if projects.get(&id).is_some_and(|p| p.owner_id == owner_id) {
            projects.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn replace_endpoints(
        &self,
        id: Uuid,
        endpoints: &[Endpoint],
    ) -> Result<Project, sqlx::Error> {
        self.update_project(id, |p| p.endpoints = Json(endpoints.to_vec()))
    }

    async fn set_protection(
        &self,
        id: Uuid,
        is_protected: bool,
        protection_token: &str,
    ) -> Result<Project, sqlx::Error> {
        self.update_project(id, |p| {
            p.is_protected = is_protected;
            p.protection_token = protection_token.to_string();
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn charge_user(&self, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&id) {
            Some(user) if user.remaining_requests > 0 => {
                user.remaining_requests -= 1;
                Ok(Some(user.remaining_requests))
            }
            _ => Ok(None),
        }
    }

    async fn reset_quotas(
        &self,
        _due_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let mut reset = 0;
        for user in self.users.lock().unwrap().values_mut() {
            if user.reset_if_due(now) {
                reset += 1;
            }
        }
        Ok(reset)
    }
}

// ── In-memory spreadsheets ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ListTabs,
    Read(SheetRange),
    Append { sheet: String, row: Vec<String> },
    Update { range: SheetRange, row: Vec<Option<String>> },
    Clear(SheetRange),
}

#[derive(Default)]
struct SheetsData {
    /// spreadsheet id -> tabs in sheet order
    spreadsheets: HashMap<String, Vec<(String, Vec<CellRow>)>>,
    calls: Vec<GatewayCall>,
    failure: Option<GatewayErrorKind>,
    connections: Vec<Credentials>,
    held_read: Option<HeldRead>,
}

/// Gateway side of a [`ReadGate`].
struct HeldRead {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Pauses the next open-ended read after its rows were taken, until released.
pub struct ReadGate {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl ReadGate {
    /// Wait until the held read has captured its rows.
    pub async fn reached(&mut self) {
        let _ = (&mut self.reached).await;
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// Spreadsheet fake that behaves like the values API: reads drop trailing
/// empty rows, updates skip `None` cells, appends land after the last
/// non-blank row. Doubles as the connector handing out gateways.
#[derive(Clone, Default)]
pub struct MemorySheets {
    data: Arc<Mutex<SheetsData>>,
}

impl MemorySheets {
    pub fn add_tab(&self, spreadsheet_id: &str, tab: &str, rows: &[&[&str]]) {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.data
            .lock()
            .unwrap()
            .spreadsheets
            .entry(spreadsheet_id.to_string())
            .or_default()
            .push((tab.to_string(), rows));
    }

    pub fn rename_tab(&self, spreadsheet_id: &str, from: &str, to: &str) {
        let mut data = self.data.lock().unwrap();
        if let Some(tabs) = data.spreadsheets.get_mut(spreadsheet_id) {
            for (name, _) in tabs.iter_mut().filter(|(name, _)| name == from) {
                *name = to.to_string();
            }
        }
    }

    /// All rows of a tab, header included.
    pub fn rows(&self, spreadsheet_id: &str, tab: &str) -> Vec<CellRow> {
        let data = self.data.lock().unwrap();
        data.spreadsheets
            .get(spreadsheet_id)
            .and_then(|tabs| tabs.iter().find(|(name, _)| name == tab))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.data.lock().unwrap().calls.clone()
    }

    pub fn read_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Read(_)))
            .count()
    }

    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    GatewayCall::Append { .. } | GatewayCall::Update { .. } | GatewayCall::Clear(_)
                )
            })
            .count()
    }

    pub fn clear_calls(&self) {
        self.data.lock().unwrap().calls.clear();
    }

    /// Fail every following gateway call with `kind`.
    pub fn fail_with(&self, kind: GatewayErrorKind) {
        self.data.lock().unwrap().failure = Some(kind);
    }

    pub fn recover(&self) {
        self.data.lock().unwrap().failure = None;
    }

    pub fn connections(&self) -> Vec<Credentials> {
        self.data.lock().unwrap().connections.clone()
    }

    /// Hold the next read of a whole tab (`last_row` unset) once its rows are
    /// captured. Single-row reads pass through.
    pub fn hold_next_read(&self) -> ReadGate {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.data.lock().unwrap().held_read = Some(HeldRead {
            reached: reached_tx,
            release: release_rx,
        });
        ReadGate {
            reached: reached_rx,
            release: release_tx,
        }
    }

    fn take_held_read(&self, range: &SheetRange) -> Option<HeldRead> {
        if range.last_row.is_some() {
            return None;
        }
        self.data.lock().unwrap().held_read.take()
    }

    fn with_tab<T>(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        call: GatewayCall,
        apply: impl FnOnce(&mut Vec<CellRow>) -> T,
    ) -> Result<T, GatewayError> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(call);
        if let Some(kind) = data.failure {
            return Err(GatewayError::new(kind, "injected failure"));
        }
        let rows = data
            .spreadsheets
            .get_mut(spreadsheet_id)
            .and_then(|tabs| tabs.iter_mut().find(|(name, _)| name == tab))
            .map(|(_, rows)| rows)
            .ok_or_else(|| {
                GatewayError::new(
                    GatewayErrorKind::RangeNotFound,
                    format!("Unable to parse range: {tab}"),
                )
            })?;
        Ok(apply(rows))
    }
}

fn is_empty_row(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

#[async_trait]
impl SpreadsheetGateway for MemorySheets {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<String>, GatewayError> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(GatewayCall::ListTabs);
        if let Some(kind) = data.failure {
            return Err(GatewayError::new(kind, "injected failure"));
        }
        data.spreadsheets
            .get(spreadsheet_id)
            .map(|tabs| tabs.iter().map(|(name, _)| name.clone()).collect())
            .ok_or_else(|| GatewayError::new(GatewayErrorKind::Api, "Requested entity was not found"))
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<Vec<CellRow>, GatewayError> {
        let rows = self.with_tab(
            spreadsheet_id,
            &range.sheet,
            GatewayCall::Read(range.clone()),
            |rows| {
                let first = range.first_row as usize - 1;
                let last = range
                    .last_row
                    .map(|r| r as usize)
                    .unwrap_or(rows.len())
                    .min(rows.len());

                let mut out: Vec<CellRow> = rows
                    .get(first..last.max(first))
                    .unwrap_or_default()
                    .iter()
                    .map(|row| {
                        let mut row = row.clone();
                        if let Some(width) = range.width {
                            row.truncate(width);
                        }
                        while row.last().is_some_and(|c| c.is_empty()) {
                            row.pop();
                        }
                        row
                    })
                    .collect();

                while out.last().is_some_and(|row| row.is_empty()) {
                    out.pop();
                }
                out
            },
        )?;

        if let Some(held) = self.take_held_read(range) {
            let _ = held.reached.send(());
            let _ = held.release.await;
        }
        Ok(rows)
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: &[String],
    ) -> Result<(), GatewayError> {
        let call = GatewayCall::Append {
            sheet: sheet.to_string(),
            row: row.to_vec(),
        };
        self.with_tab(spreadsheet_id, sheet, call, |rows| {
            let end = rows
                .iter()
                .rposition(|r| !is_empty_row(r))
                .map(|i| i + 1)
                .unwrap_or(0);
            rows.insert(end, row.to_vec());
        })
    }

    async fn update_row(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
        row: &[Option<String>],
    ) -> Result<(), GatewayError> {
        let call = GatewayCall::Update {
            range: range.clone(),
            row: row.to_vec(),
        };
        self.with_tab(spreadsheet_id, &range.sheet, call, |rows| {
            let index = range.first_row as usize - 1;
            if rows.len() <= index {
                rows.resize(index + 1, Vec::new());
            }
            let target = &mut rows[index];
            for (column, cell) in row.iter().enumerate() {
                let Some(value) = cell else { continue };
                if target.len() <= column {
                    target.resize(column + 1, String::new());
                }
                target[column] = value.clone();
            }
        })
    }

    async fn clear_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<(), GatewayError> {
        self.with_tab(
            spreadsheet_id,
            &range.sheet,
            GatewayCall::Clear(range.clone()),
            |rows| {
                let first = range.first_row as usize - 1;
                let last = range.last_row.map(|r| r as usize).unwrap_or(rows.len());
                for row in rows.iter_mut().take(last).skip(first) {
                    match range.width {
                        Some(width) => row.iter_mut().take(width).for_each(String::clear),
                        None => row.iter_mut().for_each(String::clear),
                    }
                }
            },
        )
    }
}

impl SheetsConnector for MemorySheets {
    fn connect(&self, credentials: Credentials) -> Arc<dyn SpreadsheetGateway> {
        self.data.lock().unwrap().connections.push(credentials);
        Arc::new(self.clone())
    }
}

// ── Test server ─────────────────────────────────────────────────

/// A running test server backed by the in-memory store and spreadsheets.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub sheets: MemorySheets,
    pub state: SharedState,
}

/// A user owning one synced project over the `Users` and `Empty` tabs.
pub struct Fixture {
    pub user: User,
    pub project: Project,
    /// Management session token of `user`.
    pub token: String,
}

impl Fixture {
    pub fn data_path(&self, rest: &str) -> String {
        format!("/api/{}/{rest}", self.project.id)
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        jwt::encode_token(
            &Claims::session(user_id),
            JWT_SECRET,
        )
        .unwrap()
    }

    /// Seed a user with `quota` requests and a project whose spreadsheet has a
    /// `Users` tab (Name, Email; Ann and Bob) and an `Empty` tab. The project is
    /// synced and the `users` endpoint gets `methods`.
    pub async fn seed(&self, quota: i32, methods: EndpointMethods) -> Fixture {
        let user = self.store.insert_user("Owner", quota);
        let spreadsheet_id = format!("{SPREADSHEET_ID}{}", Uuid::now_v7().simple());

        self.sheets.add_tab(
            &spreadsheet_id,
            "Users",
            &[&["Name", "Email"], &["Ann", "a@x"], &["Bob", "b@x"]],
        );
        self.sheets.add_tab(&spreadsheet_id, "Empty", &[]);

        let project = self
            .store
            .create_project(user.id, "Demo", &spreadsheet_id)
            .await
            .unwrap();
        let project = sheetapi::schema::resync(self.store.as_ref(), &self.sheets, &project)
            .await
            .unwrap();

        let mut endpoints = project.endpoints.0.clone();
        for endpoint in endpoints.iter_mut().filter(|e| e.endpoint_name == "users") {
            endpoint.methods = methods;
        }
        let project = self
            .store
            .replace_endpoints(project.id, &endpoints)
            .await
            .unwrap();

        self.sheets.clear_calls();
        let token = self.token_for(user.id);

        Fixture {
            user,
            project,
            token,
        }
    }

    /// Send a request and return (body, status). `bearer` goes into the
    /// Authorization header as is.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> (Value, StatusCode) {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.expect("request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        self.send(Method::GET, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        self.send(Method::POST, path, None, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        self.send(Method::PUT, path, None, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (Value, StatusCode) {
        self.send(Method::DELETE, path, None, None).await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        self.send(Method::DELETE, path, Some(token), None).await
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        log_level: "warn".to_string(),
        max_body_size: 1_048_576,
        cache: CachePolicy::InvalidateOnWrite,
        quota_sweep_interval: Duration::from_secs(60),
        rate_limit: 1000,
        rate_limit_window: Duration::from_secs(600),
        sheets_base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
        google: None,
    }
}

/// Spawn a test app with the default test configuration.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let sheets = MemorySheets::default();

    let (app, state) = sheetapi::build_app(store.clone(), Arc::new(sheets.clone()), config);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        store,
        sheets,
        state,
    }
}
