//! Graceful shutdown through real listeners.

use std::sync::Arc;
use std::time::Duration;

use plughost::framework::HostModule;
use plughost::lifecycle::Host;
use reqwest::StatusCode;

mod common;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn in_flight_requests_finish_and_new_ones_are_refused() {
    const IN_FLIGHT: usize = 3;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(common::test_config(dir.path()));
    let registry = common::test_registry(&config);

    let slow = Arc::new(common::SlowModule::new());
    let release = Arc::clone(&slow.release);
    let framework = common::framework_with(vec![slow as Arc<dyn HostModule>]);

    let running = Host::new(Arc::clone(&config), registry, framework, None)
        .with_default_hooks()
        .boot()
        .await
        .unwrap();
    let base = format!("http://{}", running.http_addr().unwrap());
    let gate = Arc::clone(running.server().gate());

    let client = common::client();
    let pending: Vec<_> = (0..IN_FLIGHT)
        .map(|_| {
            let request = client.get(format!("{base}/slow")).send();
            tokio::spawn(async move { request.await.unwrap() })
        })
        .collect();
    wait_until(|| gate.in_flight() == IN_FLIGHT).await;

    let stopping = tokio::spawn(running.shutdown(Duration::from_secs(5)));
    wait_until(|| gate.is_shutting_down()).await;

    let refused = client.get(format!("{base}/fast")).send().await.unwrap();
    assert_eq!(refused.status(), StatusCode::SERVICE_UNAVAILABLE);

    release.add_permits(IN_FLIGHT);
    for request in pending {
        let response = request.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "done");
    }

    let report = stopping.await.unwrap();
    assert!(report.drained);
    assert_eq!(report.abandoned, 0);
}

#[tokio::test]
async fn grace_period_bounds_the_drain() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(common::test_config(dir.path()));
    let registry = common::test_registry(&config);

    let slow = Arc::new(common::SlowModule::new());
    let framework = common::framework_with(vec![slow as Arc<dyn HostModule>]);

    let running = Host::new(Arc::clone(&config), registry, framework, None)
        .with_default_hooks()
        .boot()
        .await
        .unwrap();
    let base = format!("http://{}", running.http_addr().unwrap());
    let gate = Arc::clone(running.server().gate());

    let client = common::client();
    let stuck = tokio::spawn(client.get(format!("{base}/slow")).send());
    wait_until(|| gate.in_flight() == 1).await;

    let report = running.shutdown(Duration::from_millis(200)).await;
    assert!(!report.drained);
    assert_eq!(report.abandoned, 1);
    assert!(report.elapsed < Duration::from_secs(5));

    stuck.abort();
}
