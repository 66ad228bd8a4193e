use api_runner::mock::RecordingReporter;
use api_runner::plugin::{async_handler_fn, handler_fn};
use api_runner::{Plugin, ReportKind, Reporter, RunnerConfig, Severity};
use api_runner_sample::lifecycle::BuildSystem;
use api_runner_sample::plugins::{default_plugins, demo_files, filesystem, remark, SourceFile};
use api_runner_sample::store::BuildStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Build {
    system: BuildSystem,
    store: Arc<BuildStore>,
    reporter: Arc<RecordingReporter>,
}

fn build(plugins: impl FnOnce(&Arc<BuildStore>) -> Vec<Plugin>) -> Build {
    let store = Arc::new(BuildStore::default());
    let reporter = Arc::new(RecordingReporter::default());
    let shared: Arc<dyn Reporter> = reporter.clone();
    let system = BuildSystem::with_reporter(
        store.clone(),
        plugins(&store),
        shared,
        RunnerConfig::default(),
    );
    Build {
        system,
        store,
        reporter,
    }
}

/// Full bootstrap of the demo blog with all sample plugins.
#[tokio::test]
async fn test_bootstrap_builds_the_demo_site() {
    let b = build(|store| default_plugins(store, demo_files()));

    let summary = b.system.bootstrap().await.expect("bootstrap failed");

    assert_eq!(
        b.store.page_paths(),
        [
            "/",
            "/about/",
            "/blog/hello-world/",
            "/fr/",
            "/fr/about/",
            "/fr/blog/hello-world/",
        ]
    );
    // The draft was created, deleted, and never copied.
    assert!(b
        .store
        .history()
        .iter()
        .any(|kind| kind == "DELETE_PAGE"));

    let home = b.store.page("/").expect("home page missing");
    assert_eq!(home.plugin_creator.as_deref(), Some("default-site-plugin"));
    let copy = b.store.page("/fr/about/").expect("localized page missing");
    assert_eq!(copy.plugin_creator.as_deref(), Some("gatsby-plugin-i18n"));
    assert_eq!(copy.context["locale"], "fr");

    assert_eq!(b.store.nodes_of_type("File").len(), 3);
    assert_eq!(b.store.nodes_of_type("MarkdownRemark").len(), 2);
    assert_eq!(
        b.store.types(),
        [
            json!("type SiteMetadata { title: String }"),
            json!(remark::TYPE_DEFS),
        ]
    );
    let slugify = b.store.field_extension("slugify").expect("extension missing");
    assert_eq!(slugify.plugin.as_deref(), Some(remark::NAME));

    let deprecated = b.reporter.of_kind(ReportKind::DeprecatedAction);
    assert_eq!(deprecated.len(), 1);
    assert_eq!(deprecated[0].event.as_deref(), Some("onPreBootstrap"));
    assert!(b.reporter.reports().iter().all(|r| r.severity < Severity::Error));

    let sourced = summary.step("sourceNodes").expect("sourceNodes step missing");
    assert_eq!(sourced.results.len(), 1);
    assert_eq!(sourced.results[0].value, json!({ "sourced": 3 }));
    assert_eq!(
        summary.step("createPages").expect("createPages step missing").results[0].value,
        json!({ "pages": 4 })
    );

    b.system.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn test_schema_action_outside_schema_events_is_denied() {
    let b = build(|_| {
        vec![
            filesystem::plugin(vec![SourceFile::new("a.txt", "a")]),
            Plugin::new("eager-schema", "1.0.0").on(
                "onCreateNode",
                handler_fn(|api| {
                    let dispatched = api.actions.invoke("createTypes", json!("type A { a: String }"))?;
                    Ok(Some(json!(dispatched)))
                }),
            ),
        ]
    });

    b.system.bootstrap().await.expect("bootstrap failed");

    let denied = b.reporter.of_kind(ReportKind::DeniedAction);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].event.as_deref(), Some("onCreateNode"));
    assert!(denied[0].message.contains("`sourceNodes`, `createSchemaCustomization`"));
    assert!(b.store.types().is_empty());

    b.system.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn test_failing_plugin_does_not_stop_bootstrap() {
    let b = build(|store| {
        let mut plugins = vec![Plugin::new("broken-source", "0.1.0").on(
            "sourceNodes",
            handler_fn(|_| Err("remote API unavailable".into())),
        )];
        plugins.extend(default_plugins(store, demo_files()));
        plugins
    });

    b.system.bootstrap().await.expect("bootstrap failed");

    let failures = b.reporter.of_kind(ReportKind::PluginHandlerError);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].severity, Severity::Panic);
    assert!(failures[0]
        .message
        .starts_with("\"broken-source\" threw an error while running the sourceNodes lifecycle:"));
    assert!(b.store.page("/blog/hello-world/").is_some());

    b.system.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn test_late_create_page_warns_but_still_creates() {
    let b = build(|_| {
        vec![Plugin::new("slow-pages", "1.0.0").on(
            "createPages",
            async_handler_fn(|api| async move {
                let actions = api.actions.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    let _ = actions.invoke("createPage", json!({ "path": "/late/", "component": "late.js" }));
                });
                Ok(None)
            }),
        )]
    });

    b.system.bootstrap().await.expect("bootstrap failed");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let late = b.reporter.of_kind(ReportKind::LateActionCall);
    assert_eq!(late.len(), 1);
    assert!(late[0].message.contains("outside of its expected asynchronous lifecycle `createPages` in slow-pages"));
    assert!(b.store.page("/late/").is_some());

    b.system.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn test_shutdown_stops_the_tracker() {
    let store = Arc::new(BuildStore::default());
    let system = BuildSystem::new(store.clone(), default_plugins(&store, Vec::new()));
    system.bootstrap().await.expect("bootstrap failed");

    tokio::time::timeout(Duration::from_secs(1), system.shutdown())
        .await
        .expect("tracker did not stop")
        .expect("shutdown failed");
}
