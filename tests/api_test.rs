/// End-to-end tests through the HTTP router: start a crawl of a local site,
/// follow its event stream, then finalize college, department and program.
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Html,
    routing::get,
    Router,
};
use campus_harvest::api;
use campus_harvest::core::config::HarvestConfig;
use campus_harvest::reconcile::{DirectoryStore, MemoryStore};
use campus_harvest::types::FieldMap;
use campus_harvest::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

async fn spawn_site() -> String {
    let app = Router::new()
        .route(
            "/",
            get(|| async {
                Html(
                    r#"<html><head><title>Northfield University</title></head><body><main>
                    <h1>Northfield University</h1>
                    <p>College Name: Northfield University</p>
                    <p>Phone: (555) 201-3000</p>
                    <a href="/admissions">Admissions</a></main></body></html>"#,
                )
            }),
        )
        .route(
            "/admissions",
            get(|| async {
                Html(
                    r#"<html><body><main><h2>Office of Graduate Admissions</h2>
                    <p>Application Fee: $75</p></main></body></html>"#,
                )
            }),
        );
    serve(app).await
}

fn test_state(store: Arc<MemoryStore>) -> Arc<AppState> {
    let mut config = HarvestConfig::default();
    config.crawler.max_workers = Some(2);
    config.crawler.page_timeout_secs = Some(5);
    Arc::new(AppState::with_parts(
        reqwest::Client::new(),
        config,
        None,
        store,
    ))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, text) = send(app, method, uri, body).await;
    let value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, value)
}

fn college_fields(name: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("CollegeName".into(), name.into());
    fields
}

/// Start a crawl and drain its event stream; returns the job id and the raw SSE body.
async fn crawl_to_completion(app: &Router, root: &str) -> (String, String) {
    let (status, started) = send_json(
        app,
        "POST",
        "/crawl",
        Some(json!({"url": root, "max_pages": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = started["job_id"].as_str().unwrap().to_string();

    // the stream replays from the first event and closes after the terminal one
    let (status, events) = send(app, "GET", &format!("/crawl/{}/events", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    (job_id, events)
}

#[tokio::test]
async fn test_crawl_stream_and_status() {
    init_logger();
    let root = spawn_site().await;
    let app = api::router(test_state(Arc::new(MemoryStore::new())));

    let (job_id, events) = crawl_to_completion(&app, &root).await;
    let names: Vec<&str> = events
        .lines()
        .filter_map(|l| l.strip_prefix("event: "))
        .collect();
    assert_eq!(names.first(), Some(&"start"));
    assert_eq!(names.last(), Some(&"complete"));
    assert_eq!(names.iter().filter(|n| **n == "progress").count(), 2);
    assert!(names.contains(&"processing"));

    let (status, snapshot) = send_json(&app, "GET", &format!("/crawl/{}", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["status"], "finished");
    assert_eq!(snapshot["visited"], 2);
    assert_eq!(snapshot["llm_enabled"], false);
    let result = &snapshot["result"];
    assert_eq!(result["visited"], 2);
    assert_eq!(result["errors"], 0);
    assert_eq!(
        result["entity_results"]["college"]["merged"]["CollegeName"],
        "Northfield University"
    );
}

#[tokio::test]
async fn test_request_validation() {
    init_logger();
    let app = api::router(test_state(Arc::new(MemoryStore::new())));

    let (status, body) = send_json(&app, "POST", "/crawl", Some(json!({"url": "ftp://u.edu"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("ftp://u.edu"));

    let (status, _) = send_json(&app, "GET", "/crawl/not-a-job", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4();
    let (status, _) = send_json(&app, "GET", &format!("/crawl/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, "DELETE", &format!("/crawl/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "POST", "/colleges/999/relink-programs", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, health) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_finalize_flow_links_program_within_college() {
    init_logger();
    let root = spawn_site().await;
    let store = Arc::new(MemoryStore::new());
    let existing = tokio_test::assert_ok!(store.insert_college(&college_fields("Northfield University")).await);
    let app = api::router(test_state(Arc::clone(&store)));

    let (job_id, _) = crawl_to_completion(&app, &root).await;
    let finalize_uri = format!("/crawl/{}/finalize", job_id);

    let (_, snapshot) = send_json(&app, "GET", &format!("/crawl/{}", job_id), None).await;
    let token = snapshot["result"]["entity_results"]["college"]["field_defaults"]["CollegeName"]
        .as_str()
        .unwrap()
        .to_string();

    // exact name match needs a decision first
    let (status, prompt) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({"entity": "college", "choice_CollegeName": token})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(prompt["status"], "needs_decision");
    assert_eq!(prompt["kind"], "exists");
    assert_eq!(prompt["existing_college_id"], existing);

    let (status, bad) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({"entity": "college", "choice_CollegeName": token, "override_choice": "merge"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad["details"]["field"], "override_choice");

    let (status, saved) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({
            "entity": "college",
            "choice_CollegeName": token,
            "override_Phone": "(555) 201-3999",
            "override_choice": "override"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["action"], "updated");
    assert_eq!(saved["id"], existing);
    let college = store.get_college(existing).await.unwrap().unwrap();
    assert_eq!(college.fields.get("Phone").map(String::as_str), Some("(555) 201-3999"));

    let (status, department) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({
            "entity": "department",
            "override_DepartmentName": "Office of Graduate Admissions"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(department["action"], "created");
    let own_cd = department["college_department_id"].as_i64().unwrap();

    // a department of another college is never a valid link target
    let other = store.insert_college(&college_fields("Southfield College")).await.unwrap();
    let mut dept = FieldMap::new();
    dept.insert("DepartmentName".into(), "Graduate School".into());
    let other_cd = store.insert_department(other, &dept).await.unwrap().college_department_id;

    let (status, rejected) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({
            "entity": "program",
            "override_ProgramName": "MS in Data Science",
            "override_Level": "Graduate",
            "override_CollegeDepartmentID": other_cd.to_string()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(rejected["details"]["field"], "CollegeDepartmentID");
    assert!(store.list_programs(existing).await.unwrap().is_empty());

    let (status, program) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({
            "entity": "program",
            "override_ProgramName": "MS in Data Science",
            "override_Level": "Graduate"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(program["action"], "created");
    assert_eq!(program["link_source"], "selected");
    let program_id = program["id"].as_i64().unwrap();
    let links = store.list_program_links(program_id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].college_id, existing);
    assert_eq!(links[0].college_department_id, own_cd);
}

#[tokio::test]
async fn test_similar_college_name_prompts_then_creates() {
    init_logger();
    let root = spawn_site().await;
    let store = Arc::new(MemoryStore::new());
    let existing = store
        .insert_college(&college_fields("The Northfield University"))
        .await
        .unwrap();
    let app = api::router(test_state(Arc::clone(&store)));

    let (job_id, _) = crawl_to_completion(&app, &root).await;
    let finalize_uri = format!("/crawl/{}/finalize", job_id);

    let (status, prompt) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({"override_CollegeName": "Northfield Univ."})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(prompt["kind"], "similar");
    assert_eq!(prompt["similar_colleges"][0]["id"], existing);

    let (status, saved) = send_json(
        &app,
        "POST",
        &finalize_uri,
        Some(json!({"override_CollegeName": "Northfield Univ.", "override_choice_college": "create"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["action"], "created");
    assert_ne!(saved["id"], existing);
    assert_eq!(store.list_colleges().await.unwrap().len(), 2);

    // the new college is offered as a linking candidate from now on
    let (_, snapshot) = send_json(&app, "GET", &format!("/crawl/{}", job_id), None).await;
    let options = snapshot["result"]["entity_results"]["department"]["field_options"]["CollegeID"]
        .as_array()
        .unwrap();
    assert_eq!(options.len(), 2);
}

#[tokio::test]
async fn test_cancel_running_job() {
    init_logger();
    let slow = Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Html(r#"<html><body><main><p>Slow page</p><a href="/next">Next</a></main></body></html>"#)
        }),
    );
    let root = serve(slow).await;
    let app = api::router(test_state(Arc::new(MemoryStore::new())));

    let (status, started) = send_json(&app, "POST", "/crawl", Some(json!({"url": root}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = started["job_id"].as_str().unwrap().to_string();

    let (status, cancelled) = send_json(&app, "DELETE", &format!("/crawl/{}", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["cancelled"], true);

    let (_, events) = send(&app, "GET", &format!("/crawl/{}/events", job_id), None).await;
    let last_event = events
        .lines()
        .filter_map(|l| l.strip_prefix("event: "))
        .last();
    assert_eq!(last_event, Some("error"));
    assert!(events.contains(r#""message":"cancelled""#));

    let (_, snapshot) = send_json(&app, "GET", &format!("/crawl/{}", job_id), None).await;
    assert_eq!(snapshot["status"], "cancelled");
    assert!(snapshot["visited"].as_u64().unwrap() <= 1);

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/crawl/{}/finalize", job_id),
        Some(json!({"override_CollegeName": "Slow University"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // cancelling a job that already ended changes nothing
    let (status, again) = send_json(&app, "DELETE", &format!("/crawl/{}", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["cancelled"], false);
    assert_eq!(again["status"], "cancelled");
}
