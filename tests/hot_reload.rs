mod common;
use crate::common::builders::{broken_unit, greeting_unit, ProjectsDir};
use crate::common::{body_of, flags, get, init_tracing, start, wait_until, TestResult, SETTLE};

use std::time::Duration;

use tokio::time::sleep;

// These tests drive a real filesystem watcher, so every assertion waits for
// the visible effect instead of assuming a delivery latency.

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn units_appear_change_and_break_without_a_restart() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir.project("shop").create()?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    assert!(body_of(&sup, "/shop/greet").is_none());

    let shop = shop.unit("greet", &greeting_unit("greet", "hello"))?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("hello")).await,
        "new unit was never registered"
    );

    let shop = shop.unit("greet", &greeting_unit("greet", "hello again"))?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("hello again")).await,
        "changed unit was never reloaded"
    );

    // Breaking the unit replaces the handler and exposes the diagnostic.
    let shop = shop.unit("greet", &broken_unit("greet"))?;
    assert!(
        wait_until(SETTLE, || get(&sup, "/shop/error/greet").0.is_ok()).await,
        "diagnostic never appeared"
    );
    assert!(body_of(&sup, "/shop/greet").is_none());
    let text = body_of(&sup, "/shop/error/greet").unwrap_or_default();
    assert!(text.contains("CompileError"), "{text}");

    // Fixing it removes the diagnostic again.
    shop.unit("greet", &greeting_unit("greet", "fixed"))?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("fixed")).await,
        "fixed unit was never reloaded"
    );
    assert!(get(&sup, "/shop/error/greet").0.is_err());

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deleted_units_unload_and_come_back() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "hello"))?;
    let (sup, metrics) = start(dir.root(), flags(true, true, true)).await;
    assert_eq!(body_of(&sup, "/shop/greet").as_deref(), Some("hello"));

    shop.remove_unit("greet")?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").is_none()).await,
        "deleted unit is still served"
    );
    let project = sup.project("shop").expect("shop");
    assert!(project.registry().get("greet").is_none());
    assert!(metrics.snapshot().unloads >= 1);

    shop.unit("greet", &greeting_unit("greet", "back"))?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("back")).await,
        "recreated unit was never loaded"
    );

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn keep_on_delete_leaves_the_last_registration() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir
        .project("shop")
        .create()?
        .unit("greet", &greeting_unit("greet", "hello"))?
        .unit("marker", &greeting_unit("marker", "one"))?;
    let (sup, _) = start(dir.root(), flags(true, true, false)).await;

    shop.remove_unit("greet")?;
    // Use a later change in the same project as a barrier for the delete.
    let shop = shop.unit("marker", &greeting_unit("marker", "two"))?;
    assert!(wait_until(SETTLE, || body_of(&sup, "/shop/marker").as_deref() == Some("two")).await);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(body_of(&sup, "/shop/greet").as_deref(), Some("hello"));

    shop.unit("greet", &greeting_unit("greet", "replaced"))?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("replaced")).await,
        "recreated unit was never loaded"
    );

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reloading_keeps_registration_order() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shared = |name: &str, body: &str| {
        format!("handler {name}\non GET /shared\n  write \"{body}\"\n  done\n")
    };
    let shop = dir
        .project("shop")
        .create()?
        .unit("alpha", &shared("alpha", "alpha v1"))?
        .unit("beta", &shared("beta", "beta v1"))?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    let project = sup.project("shop").expect("shop");

    let shop = shop.unit("gamma", &shared("gamma", "gamma v1"))?;
    shop.unit("alpha", &shared("alpha", "alpha v2"))?;
    assert!(
        wait_until(SETTLE, || {
            body_of(&sup, "/shop/shared").as_deref() == Some("alpha v2")
                && project.registry().len() == 3
        })
        .await
    );
    assert_eq!(project.registry().names(), vec!["alpha", "beta", "gamma"]);

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn support_unit_changes_reload_dependents() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir
        .project("shop")
        .create()?
        .library("common", "library common\nlet punct = \"!\"\n")?
        .unit(
            "greet",
            "handler greet\non GET /greet\n  write \"hi{common.punct}\"\n  done\n",
        )?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    assert_eq!(body_of(&sup, "/shop/greet").as_deref(), Some("hi!"));

    shop.library("common", "library common\nlet punct = \"?\"\n")?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/shop/greet").as_deref() == Some("hi?")).await,
        "dependent unit was not reloaded"
    );

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_broken_project_does_not_disturb_its_neighbour() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let a = dir.project("a").create()?.unit("greet", &greeting_unit("greet", "from a"))?;
    dir.project("b").create()?.unit("greet", &greeting_unit("greet", "from b"))?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;

    a.unit("greet", &broken_unit("greet"))?;
    assert!(wait_until(SETTLE, || get(&sup, "/a/error/greet").0.is_ok()).await);

    assert_eq!(body_of(&sup, "/b/greet").as_deref(), Some("from b"));
    assert!(get(&sup, "/b/error/greet").0.is_err());

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn properties_changes_recreate_the_project() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "hello"))?;
    let (sup, _) = start(dir.root(), flags(true, true, true)).await;
    assert_eq!(body_of(&sup, "/shop/greet").as_deref(), Some("hello"));

    shop.properties("name = store\ncontext-path = /store\n")?;
    assert!(
        wait_until(SETTLE, || body_of(&sup, "/store/greet").as_deref() == Some("hello")).await,
        "project was not recreated under its new context path"
    );
    assert!(body_of(&sup, "/shop/greet").is_none());
    assert_eq!(sup.active_projects(), vec!["store"]);

    sup.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unit_directories_are_picked_up_and_dropped_whole() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let shop = dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "hello"))?;
    let (sup, metrics) = start(dir.root(), flags(true, true, true)).await;
    let project = sup.project("shop").expect("shop");

    let users = "handler admin.Users\non GET /admin/users\n  write \"users\"\n  done\n";
    let audit = "handler admin.Audit\non GET /admin/audit\n  write \"audit\"\n  done\n";
    let shop = shop.unit_dir("admin", &[("Users", users), ("Audit", audit)])?;
    assert!(
        wait_until(SETTLE, || {
            body_of(&sup, "/shop/admin/users").as_deref() == Some("users")
                && body_of(&sup, "/shop/admin/audit").as_deref() == Some("audit")
        })
        .await,
        "units in a new directory were never loaded"
    );
    assert!(project.registry().get("admin.Users").is_some());

    // Only the directory itself reports an event here.
    shop.move_out("admin")?;
    assert!(
        wait_until(SETTLE, || {
            project.registry().get("admin.Users").is_none()
                && project.registry().get("admin.Audit").is_none()
        })
        .await,
        "units of a removed directory are still registered"
    );
    assert!(body_of(&sup, "/shop/admin/users").is_none());
    assert!(metrics.snapshot().unloads >= 2);
    assert_eq!(body_of(&sup, "/shop/greet").as_deref(), Some("hello"));

    sup.shutdown().await;
    Ok(())
}
