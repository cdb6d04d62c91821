mod common;
use crate::common::builders::{greeting_unit, ProjectsDir};
use crate::common::{body_of, flags, init_tracing, start, wait_until, TestResult, SETTLE};

use std::sync::Arc;

use hotroute::errors::HotrouteError;
use hotroute::fs::RealFileSystem;
use hotroute::metrics::Metrics;
use hotroute::project::{Supervisor, SupervisorConfig};
use hotroute::types::ProjectOrigin;

#[tokio::test]
async fn root_must_be_a_directory() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let err = Supervisor::start(
        SupervisorConfig {
            root: dir.root().join("missing"),
            defaults: flags(false, false, true),
        },
        Arc::new(RealFileSystem),
        Arc::new(Metrics::new()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HotrouteError::ConfigError(_)), "{err}");
    Ok(())
}

#[tokio::test]
async fn archives_are_served_from_their_staging_directory() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.archive(
        "catalog.zip",
        &[
            ("scripts/items.route", &greeting_unit("items", "all items")),
            ("project.properties", "version = 3\n"),
        ],
    )?;
    let (sup, _) = start(dir.root(), flags(false, true, true)).await;

    assert_eq!(sup.active_projects(), vec!["catalog"]);
    let project = sup.project("catalog").expect("catalog");
    let desc = project.descriptor();
    assert_eq!(desc.origin, ProjectOrigin::Archive);
    assert_eq!(desc.version.as_deref(), Some("3"));
    assert!(!desc.flags.hot_reload);
    assert!(desc.root.starts_with(dir.root().join(".hotroute")));
    assert_eq!(body_of(&sup, "/catalog/items").as_deref(), Some("all items"));

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn projects_come_and_go_with_their_directories() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "shop"))?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    assert_eq!(sup.active_projects(), vec!["shop"]);

    dir.stage_project("blog", &[("scripts/post.route", &greeting_unit("post", "a post"))])?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/blog/post").as_deref() == Some("a post")).await,
        "new project was never opened"
    );
    assert_eq!(sup.active_projects(), vec!["blog", "shop"]);

    dir.project("shop").remove()?;
    assert!(
        wait_until(SETTLE, || sup.active_projects() == vec!["blog"]).await,
        "removed project is still active"
    );
    assert!(body_of(&sup, "/shop/greet").is_none());
    assert_eq!(body_of(&sup, "/blog/post").as_deref(), Some("a post"));

    sup.shutdown().await;
    assert!(sup.active_projects().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replacing_an_archive_reopens_the_project() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.archive("catalog.zip", &[("scripts/items.route", &greeting_unit("items", "v1"))])?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    assert_eq!(body_of(&sup, "/catalog/items").as_deref(), Some("v1"));

    dir.archive("catalog.zip", &[("scripts/items.route", &greeting_unit("items", "v2"))])?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/catalog/items").as_deref() == Some("v2")).await,
        "archive project was not reopened"
    );

    std::fs::remove_file(dir.root().join("catalog.zip"))?;
    assert!(wait_until(SETTLE, || sup.active_projects().is_empty()).await);
    assert!(!dir.root().join(".hotroute").join("catalog").exists());

    sup.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_clears_every_project() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "hi"))?;
    let (sup, _) = start(dir.root(), flags(false, true, true)).await;
    let project = sup.project("shop").expect("shop");

    sup.shutdown().await;
    assert!(project.is_closed());
    assert!(project.registry().is_empty());
    assert!(body_of(&sup, "/shop/greet").is_none());
    Ok(())
}
