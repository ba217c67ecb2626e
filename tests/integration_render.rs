//! Integration tests for the mount policy and callback flow

#![cfg(feature = "headless")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use paperframe::headless::{FailStage, HeadlessHost, ScriptedServices};
use paperframe::{PdfRenderer, RenderHooks, RenderOptions, OFFSCREEN_OFFSET_PX};

const HOST_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Host page</title></head>
<body>
<div id="c"></div>
<section class="sidebar"></section>
</body>
</html>"#;

#[tokio::test]
async fn render_without_target_mounts_one_offscreen_context() {
    let host = HeadlessHost::new(HOST_PAGE, Arc::new(ScriptedServices::default()));
    let renderer = PdfRenderer::new(host.clone());

    let (done_tx, done_rx) = mpsc::channel();
    let hooks = RenderHooks::new().completion(move || {
        let _ = done_tx.send(());
    });

    renderer
        .render_with(
            &RenderOptions {
                body_html: "<h1>X</h1>".to_string(),
                ..Default::default()
            },
            hooks,
        )
        .await;

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("pagination never completed");

    let frames = host.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].parent, None);
    assert_eq!(frames[0].offset_px, Some(OFFSCREEN_OFFSET_PX));
}

#[tokio::test]
async fn render_into_existing_target_fills_it() {
    let host = HeadlessHost::new(HOST_PAGE, Arc::new(ScriptedServices::default()));
    let renderer = PdfRenderer::new(host.clone());

    let (done_tx, done_rx) = mpsc::channel();
    renderer
        .render_with(
            &RenderOptions {
                body_html: "<h1>X</h1>".to_string(),
                container_selector: Some("#c".to_string()),
                ..Default::default()
            },
            RenderHooks::new().completion(move || {
                let _ = done_tx.send(());
            }),
        )
        .await;

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("pagination never completed");

    let frames = host.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].parent.as_deref(), Some("#c"));
    assert_eq!(frames[0].width_pct, 100);
    assert_eq!(frames[0].height_pct, 100);
    assert_eq!(frames[0].border_px, 0);
    assert_eq!(frames[0].offset_px, None);
}

#[tokio::test]
async fn unresolvable_selector_falls_back_and_still_completes() {
    let host = HeadlessHost::new(HOST_PAGE, Arc::new(ScriptedServices::default()));
    let renderer = PdfRenderer::new(host.clone());

    let (done_tx, done_rx) = mpsc::channel();
    renderer
        .render_with(
            &RenderOptions {
                body_html: "<p>content</p>".to_string(),
                container_selector: Some("#does-not-exist".to_string()),
                ..Default::default()
            },
            RenderHooks::new().completion(move || {
                let _ = done_tx.send(());
            }),
        )
        .await;

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("fallback mount never completed");

    let frames = host.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].parent, None, "should have fallen back to the root");
    assert_eq!(frames[0].offset_px, Some(OFFSCREEN_OFFSET_PX));
}

#[tokio::test]
async fn failing_pipeline_fires_only_the_error_callback() {
    let host = HeadlessHost::new(
        HOST_PAGE,
        Arc::new(ScriptedServices::failing_at(FailStage::Pagination)),
    );
    let renderer = PdfRenderer::new(host);

    let completions = Arc::new(AtomicUsize::new(0));
    let completions2 = completions.clone();
    let (err_tx, err_rx) = mpsc::channel::<String>();

    renderer
        .render_with(
            &RenderOptions::default(),
            RenderHooks::new()
                .completion(move || {
                    completions2.fetch_add(1, Ordering::SeqCst);
                })
                .pdf_error(move |message| {
                    let _ = err_tx.send(message);
                }),
        )
        .await;

    let message = err_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("error callback never fired");
    assert!(!message.is_empty());
    assert!(message.contains("pagination"));

    // The pipeline failed before the completion signal; only the error
    // side ever fires, and only once.
    assert!(err_rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn font_failure_is_routed_like_any_pipeline_failure() {
    let host = HeadlessHost::new(
        HOST_PAGE,
        Arc::new(ScriptedServices::failing_at(FailStage::Fonts)),
    );
    let renderer = PdfRenderer::new(host);

    let (err_tx, err_rx) = mpsc::channel::<String>();
    renderer
        .render_with(
            &RenderOptions::default(),
            RenderHooks::new().pdf_error(move |message| {
                let _ = err_tx.send(message);
            }),
        )
        .await;

    let message = err_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("error callback never fired");
    assert!(message.contains("font"));
}

#[tokio::test]
async fn render_on_an_incapable_host_routes_a_mount_error() {
    let host = HeadlessHost::incapable();
    let renderer = PdfRenderer::new(host.clone());

    let (err_tx, err_rx) = mpsc::channel::<String>();
    renderer
        .render_with(
            &RenderOptions::default(),
            RenderHooks::new().pdf_error(move |message| {
                let _ = err_tx.send(message);
            }),
        )
        .await;

    let message = err_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("error callback never fired");
    assert!(message.contains("mount"));
    assert!(host.frames().is_empty());
}

#[tokio::test]
async fn sequential_invocations_each_get_their_own_context() {
    let host = HeadlessHost::new(HOST_PAGE, Arc::new(ScriptedServices::default()));
    let renderer = PdfRenderer::new(host.clone());

    let (done_tx, done_rx) = mpsc::channel();
    for _ in 0..3 {
        let tx = done_tx.clone();
        renderer
            .render_with(
                &RenderOptions::default(),
                RenderHooks::new().completion(move || {
                    let _ = tx.send(());
                }),
            )
            .await;
    }
    for _ in 0..3 {
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("an invocation never completed");
    }

    assert_eq!(host.frames().len(), 3);
}
