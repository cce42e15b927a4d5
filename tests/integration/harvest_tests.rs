//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for job portals and run full
//! harvest passes against a temporary SQLite database.

use job_harvester::config::{parse_config, Config};
use job_harvester::crawler::{HarvestOrchestrator, HarvestSummary, SourcePool};
use job_harvester::maintenance::{refresh_keywords, RefreshMode};
use job_harvester::storage::{IdRange, SqliteStorage, Storage};
use job_harvester::{EngineRegistry, HarvestError};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a one-source configuration pointing at `base_url`
///
/// The request budget is high enough that throttling is negligible, and the
/// retry timeout is 60ms.
fn create_test_config(base_url: &str, engine: &str, match_scope: &str) -> Config {
    parse_config(&format!(
        r#"
        [harvest]
        database-path = "unused.db"
        match-scope = "{match_scope}"
        commit-every = 2

        [[sources]]
        name = "test-source"
        url = "{base_url}"
        engine = "{engine}"
        requests-per-minute = 60000
        retry-timeout = 0.001

        [[keywords]]
        title = "Rust"
        search = "rust"

        [[keywords]]
        title = "SQL"
        search = "SQL"
        case-sensitive = true
        "#
    ))
    .expect("test config is valid")
}

fn open_storage(db_path: &Path) -> SqliteStorage {
    SqliteStorage::open(db_path, std::time::Duration::from_secs(5)).expect("database opens")
}

fn create_orchestrator(config: &Config, db_path: &Path) -> HarvestOrchestrator {
    let mut storage = open_storage(db_path);
    refresh_keywords(&mut storage, &config.keywords, RefreshMode::Incremental).unwrap();

    let source = config.sources[0].clone();
    let engine = EngineRegistry::with_defaults()
        .get(&source.engine)
        .cloned()
        .expect("engine registered");
    HarvestOrchestrator::new(source, &config.harvest, engine, storage).unwrap()
}

async fn harvest_once(config: &Config, db_path: &Path) -> (HarvestSummary, HarvestOrchestrator) {
    let mut orchestrator = create_orchestrator(config, db_path);
    let summary = orchestrator.run().await.expect("harvest pass succeeds");
    (summary, orchestrator)
}

fn job_page(title: &str, description: &str) -> String {
    format!(
        r#"<html><body>
            <h1 data-at="header-job-title">{title}</h1>
            <a data-at="metadata-company-name">ACME GmbH</a>
            <a data-at="metadata-location">Vienna</a>
            <article class="job-description"><p>{description}</p></article>
            <time>2024-03-01</time>
        </body></html>"#
    )
}

fn sitemap_index(children: &[String]) -> String {
    let entries: String = children
        .iter()
        .map(|loc| format!("<sitemap><loc>{loc}</loc></sitemap>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
    )
}

fn urlset(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|loc| format!("<url><loc>{loc}</loc></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

async fn mount_get(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_permissive_robots(server: &MockServer) {
    mount_get(
        server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"),
    )
    .await;
}

/// Mounts `/sitemap.xml` -> `/listings-1.xml` -> `job_paths`
async fn mount_stepstone_sitemaps(server: &MockServer, job_paths: &[&str]) {
    let base = server.uri();
    mount_get(
        server,
        "/sitemap.xml",
        ResponseTemplate::new(200)
            .set_body_string(sitemap_index(&[format!("{base}/listings-1.xml")])),
    )
    .await;

    let urls: Vec<String> = job_paths.iter().map(|p| format!("{base}{p}")).collect();
    mount_get(
        server,
        "/listings-1.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&urls)),
    )
    .await;
}

#[tokio::test]
async fn test_gone_advertisement_is_skipped_and_rerun_is_idempotent() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_get(&server, "/", ResponseTemplate::new(200).set_body_string("home")).await;
    mount_stepstone_sitemaps(&server, &["/job/1", "/job/2", "/job/3"]).await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "Tokio and SQL")),
    )
    .await;
    mount_get(&server, "/job/2", ResponseTemplate::new(410)).await;
    mount_get(
        &server,
        "/job/3",
        ResponseTemplate::new(200).set_body_string(job_page("Accountant", "Spreadsheets")),
    )
    .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");

    let (first, orchestrator) = harvest_once(&config, &db_path).await;
    assert_eq!(first.processed, 3);
    assert_eq!(first.stored, 2);
    assert_eq!(first.gone, 1);
    assert_eq!(first.errors, 0);
    assert_eq!(orchestrator.storage().count_advertisements().unwrap(), 2);
    drop(orchestrator);

    let (second, orchestrator) = harvest_once(&config, &db_path).await;
    assert_eq!(second.stored, 0);
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(second.gone, 1);
    assert_eq!(orchestrator.storage().count_advertisements().unwrap(), 2);
}

#[tokio::test]
async fn test_stored_fields_and_tags() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_stepstone_sitemaps(&server, &["/job/1", "/job/2"]).await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "Tokio and SQL")),
    )
    .await;
    mount_get(
        &server,
        "/job/2",
        ResponseTemplate::new(200).set_body_string(job_page("Data Analyst", "sql reporting")),
    )
    .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;
    assert_eq!(summary.stored, 2);

    let storage = orchestrator.storage();
    let rows = storage.export_rows(IdRange::all()).unwrap();
    // Only the first advertisement matched anything: "sql" is not "SQL"
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, format!("{}/job/1", server.uri()));
    assert_eq!(rows[0].ad_type, "stepstone");
    assert_eq!(rows[0].title.as_deref(), Some("Rust Developer"));
    assert_eq!(rows[0].company.as_deref(), Some("ACME GmbH"));
    assert_eq!(rows[0].location.as_deref(), Some("Vienna"));
    assert_eq!(rows[0].tags, vec!["Rust", "SQL"]);
}

#[tokio::test]
async fn test_title_only_scope_ignores_description() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_stepstone_sitemaps(&server, &["/job/1"]).await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Accountant", "Rust and SQL")),
    )
    .await;

    let config = create_test_config(&server.uri(), "stepstone", "title-only");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;
    assert_eq!(summary.stored, 1);
    assert_eq!(orchestrator.storage().count_tags().unwrap(), 0);
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_stepstone_sitemaps(&server, &["/job/1"]).await;
    Mock::given(method("GET"))
        .and(path("/job/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "after retry")),
    )
    .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(orchestrator.fetcher().retry_sleeps(), 1);

    let rows = orchestrator.storage().export_rows(IdRange::all()).unwrap();
    assert_eq!(rows[0].description.as_deref(), Some("after retry"));
}

#[tokio::test]
async fn test_persistent_failure_is_retried_exactly_once() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_stepstone_sitemaps(&server, &["/job/1", "/job/2"]).await;
    Mock::given(method("GET"))
        .and(path("/job/1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/job/2",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "fine")),
    )
    .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(orchestrator.fetcher().retry_sleeps(), 1);
}

#[tokio::test]
async fn test_other_status_is_not_retried() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&server).await;
    mount_stepstone_sitemaps(&server, &["/job/1"]).await;
    Mock::given(method("GET"))
        .and(path("/job/1"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.stored, 0);
    assert_eq!(orchestrator.fetcher().retry_sleeps(), 0);
}

#[tokio::test]
async fn test_session_cookie_and_referer_are_replayed() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let root = format!("{}/", server.uri());

    mount_permissive_robots(&server).await;
    mount_get(
        &server,
        "/",
        ResponseTemplate::new(200)
            .insert_header("set-cookie", "challenge=passed; Path=/")
            .set_body_string("welcome"),
    )
    .await;
    mount_stepstone_sitemaps(&server, &["/job/1"]).await;

    // First mounted mock wins when several match
    Mock::given(method("GET"))
        .and(path("/job/1"))
        .and(header("cookie", "challenge=passed"))
        .and(header("referer", root.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "cookies")),
        )
        .mount(&server)
        .await;
    mount_get(&server, "/job/1", ResponseTemplate::new(403)).await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(orchestrator.fetcher().referer(), Some(root.as_str()));
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn test_robots_declared_sitemaps() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let base = server.uri();

    mount_get(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\n\nSitemap: {base}/sitemap-companies.xml\nSitemap: {base}/sitemap-jobs-1.xml\n"
        )),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-companies.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[])))
        .expect(0)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/sitemap-jobs-1.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&[
            format!("{base}/jobs/100"),
            format!("{base}/jobs/101"),
        ])),
    )
    .await;

    let karriere_page = |title: &str| {
        format!(
            r#"<h1 class="m-jobHeader__jobTitle">{title}</h1>
               <div class="m-keyfactBox__companyName">Test Company GmbH</div>
               <div class="m-keyfactBox__jobLocations">Linz</div>
               <div class="m-jobContent__jobDetail">Rust and SQL</div>"#
        )
    };
    mount_get(
        &server,
        "/jobs/100",
        ResponseTemplate::new(200).set_body_string(karriere_page("Backend Engineer")),
    )
    .await;
    mount_get(
        &server,
        "/jobs/101",
        ResponseTemplate::new(200).set_body_string(karriere_page("Frontend Engineer")),
    )
    .await;

    let config = create_test_config(&base, "karriere", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.stored, 2);
    let rows = orchestrator.storage().export_rows(IdRange::all()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.ad_type == "karriere"));
    assert_eq!(rows[0].title.as_deref(), Some("Backend Engineer"));
    assert_eq!(rows[1].location.as_deref(), Some("Linz"));
}

#[tokio::test]
async fn test_malformed_sitemap_fragment_is_skipped() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let base = server.uri();

    mount_permissive_robots(&server).await;
    mount_get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{base}/listings-1.xml"),
            format!("{base}/companies-1.xml"),
            format!("{base}/listings-2.xml"),
            format!("{base}/listings-3.xml"),
        ])),
    )
    .await;
    mount_get(
        &server,
        "/listings-1.xml",
        ResponseTemplate::new(200).set_body_string("<urlset><url><loc>x</wrong></url></urlset>"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/companies-1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[])))
        .expect(0)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/listings-2.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/job/1")])),
    )
    .await;
    mount_get(&server, "/listings-3.xml", ResponseTemplate::new(404)).await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "survivor")),
    )
    .await;

    let config = create_test_config(&base, "stepstone", "full");
    let (summary, _orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stored, 1);
}

#[tokio::test]
async fn test_nested_sitemaps_keep_document_order() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let base = server.uri();

    mount_permissive_robots(&server).await;
    mount_get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{base}/listings-1.xml"),
            format!("{base}/listings-2.xml"),
        ])),
    )
    .await;
    mount_get(
        &server,
        "/listings-1.xml",
        ResponseTemplate::new(200)
            .set_body_string(sitemap_index(&[format!("{base}/nested/a.xml")])),
    )
    .await;
    mount_get(
        &server,
        "/nested/a.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/job/1")])),
    )
    .await;
    mount_get(
        &server,
        "/listings-2.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/job/2")])),
    )
    .await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust One", "first")),
    )
    .await;
    mount_get(
        &server,
        "/job/2",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Two", "second")),
    )
    .await;

    let config = create_test_config(&base, "stepstone", "full");
    let (summary, orchestrator) = harvest_once(&config, &db_path).await;
    assert_eq!(summary.stored, 2);

    let rows = orchestrator.storage().export_rows(IdRange::all()).unwrap();
    let urls: Vec<&str> = rows.iter().map(|row| row.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![format!("{base}/job/1"), format!("{base}/job/2")]
    );
}

#[tokio::test]
async fn test_sitemap_cycle_terminates() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let base = server.uri();

    mount_permissive_robots(&server).await;
    mount_get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200)
            .set_body_string(sitemap_index(&[format!("{base}/listings-1.xml")])),
    )
    .await;
    // listings-1 lists itself next to a real child; listings-2 points back
    Mock::given(method("GET"))
        .and(path("/listings-1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{base}/listings-1.xml"),
            format!("{base}/listings-2.xml"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listings-2.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{base}/listings-1.xml"),
            format!("{base}/jobs.xml"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/jobs.xml",
        ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/job/1")])),
    )
    .await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust One", "first")),
    )
    .await;

    let config = create_test_config(&base, "stepstone", "full");
    let db = db_path.clone();
    let (summary, _orchestrator) = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        async move { harvest_once(&config, &db).await },
    )
    .await
    .expect("sitemap walk did not terminate");

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn test_disallowed_candidates_are_not_fetched() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_get(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
    )
    .await;
    mount_stepstone_sitemaps(&server, &["/job/1", "/private/2"]).await;
    mount_get(
        &server,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "public")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/private/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let (summary, _orchestrator) = harvest_once(&config, &db_path).await;

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.disallowed, 1);
}

#[tokio::test]
async fn test_unreachable_robots_is_fatal() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_get(&server, "/robots.txt", ResponseTemplate::new(500)).await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "stepstone", "full");
    let mut orchestrator = create_orchestrator(&config, &db_path);
    let err = orchestrator.run().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, HarvestError::Politeness { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_isolates_failing_source() {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_permissive_robots(&healthy).await;
    mount_stepstone_sitemaps(&healthy, &["/job/1"]).await;
    mount_get(
        &healthy,
        "/job/1",
        ResponseTemplate::new(200).set_body_string(job_page("Rust Developer", "pool")),
    )
    .await;
    mount_get(&broken, "/robots.txt", ResponseTemplate::new(500)).await;

    let config = parse_config(&format!(
        r#"
        [harvest]
        database-path = "{}"
        match-scope = "full"

        [[sources]]
        name = "broken"
        url = "{}"
        engine = "stepstone"
        requests-per-minute = 60000

        [[sources]]
        name = "healthy"
        url = "{}"
        engine = "stepstone"
        requests-per-minute = 60000
        "#,
        db_path.display(),
        broken.uri(),
        healthy.uri()
    ))
    .unwrap();

    let pool = SourcePool::new(&config, &EngineRegistry::with_defaults()).unwrap();
    let reports = pool.run().await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].source, "broken");
    assert!(matches!(
        reports[0].result,
        Err(HarvestError::Politeness { .. })
    ));
    assert_eq!(reports[1].source, "healthy");
    assert_eq!(reports[1].result.as_ref().unwrap().stored, 1);

    assert_eq!(open_storage(&db_path).count_advertisements().unwrap(), 1);
}
