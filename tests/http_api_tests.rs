//! End-to-end tests driving the HTTP surface over a real socket.

use anyhow::Result;
use popcorn::config::AppConfig;
use popcorn::handlers::submissions::SUBMISSION_ACCEPTED;
use popcorn::server::{AppState, create_app};
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde_json::Value;
use tokio::net::TcpListener;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{HW_UUID, all_statuses_report, gzip, report_for, setup_test_db};

/// Serves a fresh app on an ephemeral port and returns its base URL.
async fn spawn_app() -> Result<String> {
    let db = setup_test_db().await?;
    let app = create_app(AppState::new(AppConfig::default(), db));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Ok(format!("http://{addr}"))
}

fn report_form(payload: Vec<u8>, mime: &str) -> Result<Form> {
    let part = Part::bytes(payload)
        .file_name("popcorn.txt")
        .mime_str(mime)?;
    Ok(Form::new().part("popcorn", part))
}

async fn submit(base: &str, form: Form) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(format!("{base}/"))
        .multipart(form)
        .send()
        .await?)
}

#[tokio::test]
async fn accepted_report_answers_with_thanks() -> Result<()> {
    let base = spawn_app().await?;

    let response = submit(&base, report_form(all_statuses_report(HW_UUID), "text/plain")?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, SUBMISSION_ACCEPTED);
    Ok(())
}

#[tokio::test]
async fn gzip_report_with_distro_fields_is_accepted() -> Result<()> {
    let base = spawn_app().await?;
    let form = report_form(gzip(&all_statuses_report(HW_UUID)), "application/gzip")?
        .text("distro_name", "openSUSE")
        .text("distro_version", "11.2");

    let response = submit(&base, form).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let distros: Value = reqwest::get(format!("{base}/distro")).await?.json().await?;
    assert_eq!(
        distros["submissions_distrover"],
        serde_json::json!([["openSUSE 11.2", 1]])
    );

    let release: Value = reqwest::get(format!("{base}/distro/openSUSE/11.2"))
        .await?
        .json()
        .await?;
    assert_eq!(release["submissions"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn form_without_report_is_bad_request() -> Result<()> {
    let base = spawn_app().await?;
    let form = Form::new().text("distro_name", "openSUSE");

    let response = submit(&base, form).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await?, "nothing uploaded");
    Ok(())
}

#[tokio::test]
async fn unsupported_report_type_is_rejected() -> Result<()> {
    let base = spawn_app().await?;

    let response = submit(&base, report_form(vec![0x89, b'P', b'N', b'G'], "image/png")?).await?;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    Ok(())
}

#[tokio::test]
async fn malformed_report_names_the_line() -> Result<()> {
    let base = spawn_app().await?;
    let payload = report_for(HW_UUID, &["x sed 4.2.1 5.1.2 x86_64 openSUSE"]);

    let response = submit(&base, report_form(payload, "text/plain")?).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await?;
    assert!(body.contains("line 2"), "unexpected body: {body}");

    let index: Value = reqwest::get(format!("{base}/")).await?.json().await?;
    assert_eq!(index["submissions_distrover"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn second_report_within_interval_is_throttled() -> Result<()> {
    let base = spawn_app().await?;

    let first = submit(&base, report_form(all_statuses_report(HW_UUID), "text/plain")?).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = submit(&base, report_form(all_statuses_report(HW_UUID), "text/plain")?).await?;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = second
        .headers()
        .get("retry-after")
        .expect("retry-after header")
        .to_str()?
        .parse()?;
    assert!(retry_after > 0 && retry_after <= 86_400);
    Ok(())
}

#[tokio::test]
async fn statistics_reflect_accepted_reports() -> Result<()> {
    let base = spawn_app().await?;
    let response = submit(&base, report_form(all_statuses_report(HW_UUID), "text/plain")?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let index: Value = reqwest::get(format!("{base}/")).await?.json().await?;
    assert_eq!(index["distro_packages"], serde_json::json!([["unknown", 4]]));
    assert_eq!(
        index["submissions_distrover"],
        serde_json::json!([["unknown unknown", 1]])
    );

    let vendor: Value = reqwest::get(format!("{base}/vendor/openSUSE"))
        .await?
        .json()
        .await?;
    assert_eq!(vendor["vendor"]["vendor_name"], "openSUSE");
    assert_eq!(vendor["vendor"]["vendor_url"], "openSUSE");

    let system: Value = reqwest::get(format!("{base}/system/{HW_UUID}"))
        .await?
        .json()
        .await?;
    assert_eq!(system["system"]["sys_hwuuid"], HW_UUID);
    assert_eq!(system["system"]["arch"], "x86_64");
    assert!(system["system"]["last_sub_date"].is_string());

    let package: Value = reqwest::get(format!("{base}/package/sed/4.2.1/5.1.2/x86_64"))
        .await?
        .json()
        .await?;
    assert_eq!(package["occurrences"], 1);
    assert_eq!(package["counts"]["voted"], 1);
    assert_eq!(package["counts"]["old"], 0);
    assert_eq!(package["vendors"], serde_json::json!(["openSUSE"]));
    Ok(())
}

#[tokio::test]
async fn unknown_resources_are_problem_json() -> Result<()> {
    let base = spawn_app().await?;

    for path in [
        "/vendor/nobody",
        "/system/unknown-machine",
        "/submission/42",
        "/package/sed/1/1/x86_64",
    ] {
        let response = reqwest::get(format!("{base}{path}")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(
            response.headers()["content-type"],
            "application/problem+json",
            "{path}"
        );
        let body: Value = response.json().await?;
        assert_eq!(body["code"], "NOT_FOUND");
    }
    Ok(())
}

#[tokio::test]
async fn probes_and_docs_are_served() -> Result<()> {
    let base = spawn_app().await?;

    let health: Value = reqwest::get(format!("{base}/healthz")).await?.json().await?;
    assert_eq!(health["service"], "popcorn");

    let ready = reqwest::get(format!("{base}/readyz")).await?;
    assert_eq!(ready.status(), StatusCode::OK);

    let openapi: Value = reqwest::get(format!("{base}/openapi.json"))
        .await?
        .json()
        .await?;
    assert!(openapi["paths"]["/vendor/{name}"].is_object());
    Ok(())
}

#[tokio::test]
async fn request_id_is_echoed() -> Result<()> {
    let base = spawn_app().await?;

    let response = reqwest::Client::new()
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-1234")
        .send()
        .await?;

    assert_eq!(response.headers()["x-request-id"], "req-1234");

    let generated = reqwest::get(format!("{base}/healthz")).await?;
    assert!(generated.headers().contains_key("x-request-id"));
    Ok(())
}
