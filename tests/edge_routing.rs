//! End-to-end traffic through the edge and router listeners.

use std::time::Duration;

use mfe_router::config::ServiceAssetConfig;

mod common;

#[tokio::test]
async fn test_reference_deployment_routes_by_path() {
    let home = common::start_programmable_backend(|path| async move { (200, format!("home:{}", path)) }).await;
    let product = common::start_mock_backend("product page").await;

    let assets = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(assets.path().join("home-build")).unwrap();
    std::fs::write(assets.path().join("home-build/app.js"), "console.log('home')").unwrap();

    let mut config = common::test_config();
    let mut home_service = common::service("home", "/home*", 100, home);
    home_service.assets.push(ServiceAssetConfig {
        source_dir: "home-build".into(),
        destination_prefix: "_next/static".into(),
        prune: false,
    });
    config.services.push(home_service);
    config.services.push(common::service("product", "/product*", 101, product));

    let app = mfe_router::start(&config, assets.path()).await.unwrap();
    let edge = format!("http://{}", app.edge_addr);
    let client = common::client();

    let res = client.get(format!("{}/home/anything?tab=2", edge)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "home:/home/anything?tab=2");

    let res = client.get(format!("{}/product/x", edge)).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "product page");

    let res = client.get(format!("{}/other", edge)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Default response from ALB!");

    let res = client.get(format!("{}/_next/static/app.js", edge)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-cache"], "Miss");
    assert_eq!(res.headers()["content-type"], "application/javascript");
    assert_eq!(res.text().await.unwrap(), "console.log('home')");

    let res = client.get(format!("{}/_next/static/app.js", edge)).send().await.unwrap();
    assert_eq!(res.headers()["x-cache"], "Hit");

    let res = client.get(format!("{}/public/missing.png", edge)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    app.stop().await;
}

#[tokio::test]
async fn test_target_failures_surface_as_gateway_statuses() {
    let failing = common::start_programmable_backend(|_path| async { (503, "maintenance".to_string()) }).await;
    let slow = common::start_slow_backend(Duration::from_secs(5)).await;
    let dead = common::unused_addr().await;

    let mut config = common::test_config();
    config.timeouts.target_secs = 1;
    config.services.push(common::service("failing", "/failing*", 10, failing));
    config.services.push(common::service("slow", "/slow*", 20, slow));
    config.services.push(common::service("dead", "/dead*", 30, dead));

    let app = mfe_router::start(&config, std::path::Path::new(".")).await.unwrap();
    let edge = format!("http://{}", app.edge_addr);
    let client = common::client();

    let res = client.get(format!("{}/failing", edge)).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "maintenance");

    let res = client.get(format!("{}/slow", edge)).send().await.unwrap();
    assert_eq!(res.status(), 504);

    let res = client.get(format!("{}/dead", edge)).send().await.unwrap();
    assert_eq!(res.status(), 502);

    app.stop().await;
}

#[tokio::test]
async fn test_edge_reaches_router_listener_over_http() {
    let home = common::start_mock_backend("home over http").await;
    let router_addr = common::unused_addr().await;

    let mut config = common::test_config();
    config.router.bind_address = router_addr.to_string();
    config.edge.dynamic_origin = Some(format!("http://{}", router_addr));
    config.services.push(common::service("home", "/home*", 100, home));

    let app = mfe_router::start(&config, std::path::Path::new(".")).await.unwrap();
    assert_eq!(app.router_addr, router_addr);
    let client = common::client();

    let res = client
        .get(format!("http://{}/home", app.edge_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "home over http");

    // The router listener answers on its own, too.
    let res = client
        .get(format!("http://{}/unmatched", router_addr))
        .send()
        .await
        .unwrap();
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Default response from ALB!");

    app.stop().await;
}

#[tokio::test]
async fn test_static_bindings_reject_writes() {
    let config = common::test_config();
    let app = mfe_router::start(&config, std::path::Path::new(".")).await.unwrap();

    let res = common::client()
        .post(format!("http://{}/_next/static/app.js", app.edge_addr))
        .body("x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET, HEAD");

    app.stop().await;
}
