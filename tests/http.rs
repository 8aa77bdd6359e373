use once_cell::sync::Lazy;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct RecordJson {
    id: i64,
    date: String,
    steps: i64,
    sleep_hours: f64,
    heart_rate: Option<i64>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartJson {
    data: ChartDataJson,
}

#[derive(Debug, Deserialize)]
struct ChartDataJson {
    dates: Vec<String>,
    values: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct AiJson {
    success: bool,
    error_type: Option<String>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_database_url() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("health_tracker_http_{}_{}.db", std::process::id(), nanos));
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}

fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("build client")
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/healthz")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_health_tracker"))
        .env("PORT", port.to_string())
        .env("DATABASE_URL", unique_database_url())
        .env_remove("DEEPSEEK_API_KEY")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn post_record(
    base_url: &str,
    date: &str,
    steps: &str,
    sleep_hours: &str,
    heart_rate: &str,
) -> reqwest::Response {
    client()
        .post(format!("{base_url}/records"))
        .form(&[
            ("date", date),
            ("steps", steps),
            ("sleep_hours", sleep_hours),
            ("heart_rate", heart_rate),
            ("notes", ""),
        ])
        .send()
        .await
        .unwrap()
}

async fn all_records(base_url: &str) -> Vec<RecordJson> {
    client()
        .get(format!("{base_url}/api/records"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn record_on(base_url: &str, date: &str) -> Option<RecordJson> {
    all_records(base_url)
        .await
        .into_iter()
        .find(|record| record.date == date)
}

#[tokio::test]
async fn http_saving_same_date_updates_in_place() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    let response = post_record(&server.base_url, "2025-02-10", "5000", "6.5", "70").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/?saved=2025-02-10"
    );
    let first = record_on(&server.base_url, "2025-02-10").await.unwrap();

    let response = post_record(&server.base_url, "2025-02-10", "8000", "7.5", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let records = all_records(&server.base_url).await;
    let matching: Vec<_> = records.iter().filter(|r| r.date == "2025-02-10").collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].id, first.id);
    assert_eq!(matching[0].steps, 8000);
    assert_eq!(matching[0].sleep_hours, 7.5);
    assert_eq!(matching[0].heart_rate, None);
    assert_eq!(matching[0].notes, None);
}

#[tokio::test]
async fn http_invalid_record_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    let response = post_record(&server.base_url, "2025-02-11", "-5", "7", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_record(&server.base_url, "2025-02-11", "5000", "25", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(record_on(&server.base_url, "2025-02-11").await.is_none());
}

#[tokio::test]
async fn http_chart_dates_are_ascending() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    for (date, steps) in [("2025-03-03", "3000"), ("2025-03-01", "1000"), ("2025-03-02", "2000")] {
        let response = post_record(&server.base_url, date, steps, "7", "65").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let chart: ChartJson = client()
        .get(format!("{}/api/chart?chart=steps&range=365", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(chart.data.dates.len(), chart.data.values.len());
    let mut sorted = chart.data.dates.clone();
    sorted.sort();
    assert_eq!(chart.data.dates, sorted);

    let position = |date: &str| chart.data.dates.iter().position(|d| d == date).unwrap();
    assert_eq!(chart.data.values[position("2025-03-01")], 1000.0);
    assert_eq!(chart.data.values[position("2025-03-03")], 3000.0);
    assert!(position("2025-03-01") < position("2025-03-02"));
}

#[tokio::test]
async fn http_unknown_chart_metric_is_bad_request() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    let response = client()
        .get(format!("{}/api/chart?chart=weight", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_edit_and_delete_follow_record_lifecycle() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    post_record(&server.base_url, "2025-02-20", "4000", "6", "").await;
    post_record(&server.base_url, "2025-02-21", "4500", "6", "").await;
    let second = record_on(&server.base_url, "2025-02-21").await.unwrap();

    let edit_url = format!("{}/records/{}/edit", server.base_url, second.id);
    let page = client().get(&edit_url).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("2025-02-21"));

    let conflict = client()
        .post(&edit_url)
        .form(&[("date", "2025-02-20"), ("steps", "4500"), ("sleep_hours", "6")])
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let updated = client()
        .post(&edit_url)
        .form(&[("date", "2025-02-22"), ("steps", "4600"), ("sleep_hours", "6")])
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::SEE_OTHER);
    let moved = record_on(&server.base_url, "2025-02-22").await.unwrap();
    assert_eq!(moved.id, second.id);
    assert_eq!(moved.steps, 4600);

    let delete_url = format!("{}/records/{}/delete", server.base_url, second.id);
    let deleted = client().post(&delete_url).send().await.unwrap();
    assert_eq!(deleted.status(), StatusCode::SEE_OTHER);
    assert!(record_on(&server.base_url, "2025-02-22").await.is_none());

    let missing = client().post(&delete_url).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_id = client()
        .get(format!("{}/records/abc/edit", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_records_partial_includes_insight() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    post_record(&server.base_url, "2025-02-12", "5000", "7", "").await;

    let html = client()
        .get(format!("{}/partials/records?table_range=all", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains(r#"id="weekly-insight""#));
    assert!(html.contains("2025-02-12"));
    assert!(!html.contains("<html"));
}

#[tokio::test]
async fn http_settings_round_trip() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;

    let saved = client()
        .post(format!("{}/settings", server.base_url))
        .form(&[
            ("enabled", "on"),
            ("frequency", "weekly"),
            ("report_time", "07:30"),
            ("day_of_week", "friday"),
            ("recipient_email", "me@example.com"),
            ("range_days", "14"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        saved.headers()["location"].to_str().unwrap(),
        "/settings?saved=1"
    );

    let html = client()
        .get(format!("{}/settings?saved=1", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains(r#"<option value="weekly" selected>"#));
    assert!(html.contains("me@example.com"));
    assert!(html.contains("Next report:"));

    let rejected = client()
        .post(format!("{}/settings", server.base_url))
        .form(&[("frequency", "hourly"), ("report_time", "07:30")])
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

async fn ask_ai(base_url: &str) -> reqwest::Response {
    client()
        .post(format!("{base_url}/api/ai/insights"))
        .form(&[("custom_prompt", "")])
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_ai_insights_report_missing_data_then_missing_key() {
    let server = spawn_server().await;

    let response = ask_ai(&server.base_url).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: AiJson = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.error_type.as_deref(), Some("no_data"));

    post_record(&server.base_url, "2025-04-01", "7000", "7", "68").await;

    let response = ask_ai(&server.base_url).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: AiJson = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.error_type.as_deref(), Some("missing_api_key"));
}
