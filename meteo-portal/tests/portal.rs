//! Tests de bout en bout contre un serveur amont local

mod common;

use std::sync::Arc;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_bytes, content, get, spawn_upstream, REGION_PATH};
use meteo_portal::content::submit;
use meteo_portal::crawl::{Refresh, Scheduler};
use meteo_portal::server::app;
use meteo_portal::{CachePolicy, MfClient, UpstreamError};
use tokio::sync::mpsc;
use tower::ServiceExt;

#[tokio::test]
async fn test_cold_start_single_zone() {
    let upstream = spawn_upstream().await;
    let crawler = upstream.crawler();
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let done = content.receive(zrx, prx);

    let count = crawler.crawl_tree("/", 1, &content, &ztx, &ptx).await.unwrap();
    assert_eq!(count, 1);
    // Les pictos sont insérés avant la zone qui les référence
    assert!(content.has_picto("p1j"));
    assert!(content.has_picto("p4n"));
    drop(ztx);
    drop(ptx);
    done.await.unwrap();

    assert_eq!(crawler.client().token().as_deref(), Some(common::TOKEN));
    assert!(content.has_picto("p1j"));
    assert!(content.has_picto("p4n"));
    // p2j n'est pas servi par l'amont : la zone est insérée malgré tout
    assert!(!content.has_picto("p2j"));

    let app = app(content.dispatcher());

    let resp = app.clone().oneshot(get("/france")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("<title>Météo France</title>"));
    assert!(html.contains("/js/5a5aa5a5/vue.esm-browser.prod.js"));

    let resp = app.clone().oneshot(get("/france/data")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache");
    let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(v["breadcrumb"], serde_json::json!([{"nom": "France", "path": "france"}]));
    assert_eq!(v["idtech"], "PAYS007");

    let resp = app.clone().oneshot(get("/france/svg")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "image/svg+xml");
    assert!(body_bytes(resp).await.starts_with(b"<?xml"));

    let resp = app.clone().oneshot(get("/pictos/p1j")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "image/svg+xml");
    assert!(body_bytes(resp).await.starts_with(b"<"));

    let resp = app.clone().oneshot(get("/pictos/unknown")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[LOCATION], "/france");

    let resp = app.oneshot(get("/nowhere/data")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tree_crawl_and_breadcrumbs() {
    let upstream = spawn_upstream().await;
    let crawler = upstream.crawler();
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let done = content.receive(zrx, prx);

    // L'Isère n'existe pas chez l'amont : sautée sans interrompre le crawl
    let count = crawler.crawl_tree("/", 0, &content, &ztx, &ptx).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(upstream.requests("/previsions-meteo-france/isere/38"), 1);
    drop(ztx);
    drop(ptx);
    done.await.unwrap();

    let region = content.zone("auvergne-rhone-alpes").unwrap();
    assert_eq!(region.parent.as_deref(), Some("france"));
    assert_eq!(region.data.original_path, REGION_PATH);
    let names: Vec<_> = region.breadcrumb().into_iter().map(|b| b.nom).collect();
    assert_eq!(names, vec!["France", "Auvergne-Rhône-Alpes"]);

    // Fonds et pictos communs ne sont téléchargés qu'une fois
    assert_eq!(
        upstream.requests("/modules/custom/mf_tools_common_theme_public/svg/weather/p1j.svg"),
        1
    );
    // La prévision n'est jamais servie depuis le cache
    assert_eq!(upstream.requests("/multiforecast"), 2);

    let app = app(content.dispatcher());
    let resp = app
        .clone()
        .oneshot(get("/auvergne-rhone-alpes/data"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(v["taxonomy"], "REGION");
    assert_eq!(v["breadcrumb"][0]["path"], "france");
    assert_eq!(v["breadcrumb"][1]["path"], "auvergne-rhone-alpes");
    assert!(v["chroniques"].is_object());
    assert_eq!(v["subzones"][0]["properties"]["customPath"], "isere");

    let resp = app.oneshot(get("/statusse")).await.unwrap();
    let status = String::from_utf8(body_bytes(resp).await).unwrap();
    let lines: Vec<_> = status.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("auvergne-rhone-alpes "));
    assert!(lines[1].starts_with("france "));
}

#[tokio::test]
async fn test_root_failure_is_fatal() {
    let upstream = spawn_upstream().await;
    let crawler = upstream.crawler();
    let content = content();

    let (ztx, _zrx) = mpsc::channel(1);
    let (ptx, _prx) = mpsc::channel(1);
    let err = crawler
        .crawl_tree("/previsions-meteo-france/isere/38", 0, &content, &ztx, &ptx)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("404"), "{err:#}");
    assert!(content.is_empty());
}

#[tokio::test]
async fn test_data_reads_record_hits() {
    let upstream = spawn_upstream().await;
    let crawler = upstream.crawler();
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let _done = content.receive(zrx, prx);
    crawler.crawl_tree("/", 1, &content, &ztx, &ptx).await.unwrap();

    let app = app(content.dispatcher());
    for _ in 0..3 {
        let resp = app.clone().oneshot(get("/france/data")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = app.oneshot(get("/france")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let france = content.zone("france").unwrap();
    assert_eq!(france.stats().hits(), 3);
    assert!(france.stats().last_hit().is_some());
}

#[tokio::test]
async fn test_scheduler_refreshes_overdue_zone() {
    let upstream = spawn_upstream().await;
    let crawler = Arc::new(upstream.crawler());
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let done = content.receive(zrx, prx);
    crawler.crawl_tree("/", 1, &content, &ztx, &ptx).await.unwrap();
    assert_eq!(upstream.requests("/"), 1);

    let scheduler = Scheduler::new(Arc::clone(&crawler), Arc::clone(&content), ztx, ptx);

    // Fraîchement crawlée : rien à faire
    match scheduler.refresh_once().await {
        Refresh::Idle(wait) => assert!(wait.as_secs() <= 60),
        other => panic!("unexpected {other:?}"),
    }

    let before = content.zone("france").unwrap();
    before.stats().record_hit(Utc::now() - Duration::minutes(10));
    before.stats().stamp_update(Utc::now() - Duration::minutes(45));

    assert_eq!(scheduler.refresh_once().await, Refresh::Updated("france".into()));
    assert_eq!(upstream.requests("/"), 2);

    let after = content.zone("france").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.stats().hits(), 1);
    let age = Utc::now() - after.stats().last_update().unwrap();
    assert!(age < Duration::minutes(1));
    assert!(matches!(scheduler.refresh_once().await, Refresh::Idle(_)));

    drop(scheduler);
    done.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_failure_leaves_zone() {
    let upstream = spawn_upstream().await;
    let crawler = Arc::new(upstream.crawler());
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let _done = content.receive(zrx, prx);
    crawler.crawl_tree("/", 1, &content, &ztx, &ptx).await.unwrap();

    // Zone dont la page amont a disparu
    let mut zone = crawler
        .get_zone(REGION_PATH, Some("france"), meteo_portal::CachePolicy::Default)
        .await
        .unwrap();
    zone.data.original_path = "/previsions-meteo-france/gone/99".into();
    assert!(submit(&ztx, zone).await);
    let stale = Utc::now() - Duration::hours(6);
    content.zone("auvergne-rhone-alpes").unwrap().stats().stamp_update(stale);

    let scheduler = Scheduler::new(crawler, Arc::clone(&content), ztx, ptx);
    assert_eq!(
        scheduler.refresh_once().await,
        Refresh::Failed("auvergne-rhone-alpes".into())
    );
    let region = content.zone("auvergne-rhone-alpes").unwrap();
    assert_eq!(region.stats().last_update().map(|t| t.timestamp()), Some(stale.timestamp()));
}

#[tokio::test]
async fn test_failed_zone_does_not_starve_others() {
    let upstream = spawn_upstream().await;
    let crawler = Arc::new(upstream.crawler());
    let content = content();

    let (ztx, zrx) = mpsc::channel(1);
    let (ptx, prx) = mpsc::channel(1);
    let _done = content.receive(zrx, prx);
    crawler.crawl_tree("/", 1, &content, &ztx, &ptx).await.unwrap();

    let mut zone = crawler
        .get_zone(REGION_PATH, Some("france"), CachePolicy::Default)
        .await
        .unwrap();
    zone.data.original_path = "/previsions-meteo-france/gone/99".into();
    assert!(submit(&ztx, zone).await);

    // Les deux zones sont en retard, la région davantage
    let now = Utc::now();
    content.zone("france").unwrap().stats().stamp_update(now - Duration::hours(5));
    content
        .zone("auvergne-rhone-alpes")
        .unwrap()
        .stats()
        .stamp_update(now - Duration::hours(6));

    let scheduler = Scheduler::new(crawler, Arc::clone(&content), ztx, ptx);
    assert_eq!(
        scheduler.refresh_once().await,
        Refresh::Failed("auvergne-rhone-alpes".into())
    );
    assert_eq!(scheduler.refresh_once().await, Refresh::Updated("france".into()));
    assert!(matches!(scheduler.refresh_once().await, Refresh::Idle(_)));

    let region = content.zone("auvergne-rhone-alpes").unwrap();
    assert!(region.stats().is_deferred(Utc::now()));
    assert!(region.remaining_delay(Utc::now()) < Duration::zero());
    let france = content.zone("france").unwrap();
    assert!(france.remaining_delay(Utc::now()) > Duration::hours(3));
}

#[tokio::test]
async fn test_client_status_and_session_errors() {
    let upstream = spawn_upstream().await;
    let client = MfClient::new(upstream.base.as_str()).unwrap();

    let err = client.get("/nocookie", CachePolicy::Disabled).await.err().unwrap();
    match err {
        UpstreamError::MissingSessionCookie(url) => assert!(url.ends_with("/nocookie"), "{url}"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.token().is_none());

    let err = client.get("/missing", CachePolicy::Disabled).await.err().unwrap();
    match err {
        UpstreamError::Status { status, url } => {
            assert_eq!(status.as_u16(), 404);
            assert!(url.ends_with("/missing"), "{url}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.cache().lookup("/missing").is_none());

    // L'hôte de l'API ne pose pas de cookie
    let api = client.api_client(upstream.base.as_str());
    let body = api.get("/nocookie", CachePolicy::Disabled).await.unwrap();
    assert_eq!(&body.bytes().await.unwrap()[..], b"no session here");
}

#[tokio::test]
async fn test_client_update_policy_fills_cache() {
    let upstream = spawn_upstream().await;
    let client = MfClient::new(upstream.base.as_str()).unwrap();

    let body = client.get("/", CachePolicy::Update).await.unwrap();
    let html = body.bytes().await.unwrap();
    assert!(!html.is_empty());
    assert_eq!(client.cache().lookup("/"), Some(html.clone()));
    assert_eq!(client.token().as_deref(), Some(common::TOKEN));

    // Update interroge toujours l'amont, Default sert le cache
    client.get("/", CachePolicy::Update).await.unwrap().bytes().await.unwrap();
    assert_eq!(upstream.requests("/"), 2);
    let cached = client.get("/", CachePolicy::Default).await.unwrap().bytes().await.unwrap();
    assert_eq!(cached, html);
    assert_eq!(upstream.requests("/"), 2);

    // Disabled ne touche pas au cache
    client.cache().update("/", bytes::Bytes::from_static(b"stale"));
    client.get("/", CachePolicy::Disabled).await.unwrap().bytes().await.unwrap();
    assert_eq!(client.cache().lookup("/").unwrap(), bytes::Bytes::from_static(b"stale"));
}
