//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载 → dispatcher → SSE 路由的端到端验证
//! - 频道隔离、回放、关闭语义的跨 crate 场景

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod dispatcher_scenarios {
    use std::collections::HashSet;
    use std::time::Duration;

    use contracts::{DeliveryConfig, Event, EventStream};
    use dispatcher::{spawn_dispatcher, DispatcherBuilder, Subscriber};
    use futures::StreamExt;
    use tokio::time::timeout;

    async fn recv(sub: &mut Subscriber) -> Option<Event> {
        timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for event")
    }

    fn news_history() -> impl Fn(&str, &str) -> EventStream + Send + Sync + 'static {
        |channel: &str, last: &str| -> EventStream {
            let events = if channel == "news" && last == "5" {
                vec![
                    Event::new("6", "six"),
                    Event::new("7", "seven"),
                    Event::new("8", "eight"),
                ]
            } else {
                Vec::new()
            };
            futures::stream::iter(events).boxed()
        }
    }

    /// Resume on "news" after id 5 while id 9 is published live
    #[tokio::test]
    async fn test_resume_with_live_publish() {
        let (dispatcher, handle) = DispatcherBuilder::new(DeliveryConfig::default())
            .history("news", news_history())
            .build();
        let task = dispatcher.spawn();

        let mut sports = handle.subscribe("sports", "").await.unwrap();
        let mut news = handle.subscribe("news", "5").await.unwrap();
        handle.publish(["news"], Event::new("9", "nine")).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(recv(&mut news).await.unwrap().id);
        }
        let got: HashSet<_> = ids.iter().map(String::as_str).collect();
        assert_eq!(got, HashSet::from(["6", "7", "8", "9"]));

        // History keeps its relative order
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();
        assert!(pos("6") < pos("7") && pos("7") < pos("8"));

        assert!(sports.try_recv().unwrap().is_none());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(recv(&mut news).await.is_none());
        assert!(recv(&mut sports).await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_or_history() {
        let (handle, _task) = spawn_dispatcher(DeliveryConfig::default());
        handle
            .publish(["alerts"], Event::new("1", "nobody listens"))
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.channels.contains_key("alerts"));
        assert_eq!(handle.metrics().delivered, 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribes_each_receive_once() {
        let (handle, _task) = spawn_dispatcher(DeliveryConfig::default());

        let (a, b) = tokio::join!(handle.subscribe("news", ""), handle.subscribe("news", ""));
        let (mut a, mut b) = (a.unwrap(), b.unwrap());
        handle.publish(["news"], Event::new("1", "x")).await.unwrap();
        handle.snapshot().await.unwrap();

        assert_eq!(recv(&mut a).await.unwrap().id, "1");
        assert_eq!(recv(&mut b).await.unwrap().id, "1");
        assert!(a.try_recv().unwrap().is_none());
        assert!(b.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fan_out_across_channels() {
        let (handle, _task) = spawn_dispatcher(DeliveryConfig::default());
        let mut news = Vec::new();
        for _ in 0..3 {
            news.push(handle.subscribe("news", "").await.unwrap());
        }
        let mut sports = handle.subscribe("sports", "").await.unwrap();

        handle
            .publish(["news", "sports"], Event::new("1", "both"))
            .await
            .unwrap();
        handle.publish(["news"], Event::new("2", "news only")).await.unwrap();
        handle.snapshot().await.unwrap();

        for sub in &mut news {
            assert_eq!(recv(sub).await.unwrap().id, "1");
            assert_eq!(recv(sub).await.unwrap().id, "2");
        }
        assert_eq!(recv(&mut sports).await.unwrap().id, "1");
        assert!(sports.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_paths_exactly_once() {
        let (dispatcher, handle) = DispatcherBuilder::new(DeliveryConfig::default())
            .history("news", news_history())
            .build();
        let task = dispatcher.spawn();

        let mut subs = Vec::new();
        for channel in ["news", "news", "sports", "weather"] {
            subs.push(handle.subscribe(channel, "").await.unwrap());
        }
        // A resumed subscriber whose replay may still be running
        subs.push(handle.subscribe("news", "5").await.unwrap());
        let key = subs[0].key().clone();
        handle.unsubscribe(&key).await.unwrap();

        let report = handle.shutdown().await.unwrap();
        task.await.unwrap();

        // The unsubscribed path was already closed and is not closed again
        assert_eq!(report.closed, 4);
        for sub in &mut subs {
            while recv(sub).await.is_some() {}
        }
        assert!(handle.unsubscribe(&key).await.is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use config_loader::{ConfigFormat, ConfigLoader};
    use futures::StreamExt;
    use streaming::{router, AppState};
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[server]
route_prefix = "/sse"
keep_alive_secs = 60

[delivery]
queue_capacity = 16
backpressure = "disconnect"

[[channels]]
name = "news"
history_capacity = 8

[[channels]]
name = "sports"
"#;

    fn publish(body: &str) -> Request<Body> {
        Request::post("/publish")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_until(body: Body, needle: &str) -> String {
        let mut stream = body.into_data_stream();
        let mut text = String::new();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !text.contains(needle) {
                let chunk = stream.next().await.expect("stream ended").unwrap();
                text.push_str(std::str::from_utf8(&chunk).unwrap());
            }
        })
        .await
        .expect("timed out reading stream");
        text
    }

    /// Config file → state → HTTP publish → reconnecting SSE client
    #[tokio::test]
    async fn test_publish_then_resume_over_http() {
        let config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let (state, dispatcher) = AppState::from_config(&config);
        let task = dispatcher.spawn();
        let app = router(state.clone(), &config.server);

        for id in 1..=4 {
            let body = format!(r#"{{"channels":["news"],"id":"{id}","data":"item {id}"}}"#);
            let response = app.clone().oneshot(publish(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let response = app
            .clone()
            .oneshot(
                Request::get("/sse/news?lastEventId=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let live = r#"{"channels":["news","sports"],"id":"5","event":"update","data":"item 5"}"#;
        let published = app.clone().oneshot(publish(live)).await.unwrap();
        assert_eq!(published.status(), StatusCode::ACCEPTED);

        let text = read_until(response.into_body(), "data: item 5").await;
        assert!(!text.contains("data: item 2"));
        let p3 = text.find("data: item 3").unwrap();
        let p4 = text.find("data: item 4").unwrap();
        assert!(p3 < p4);
        assert!(text.contains("event: update\n"));

        state.dispatcher().shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_after_shutdown_is_unavailable() {
        let config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let (state, dispatcher) = AppState::from_config(&config);
        let task = dispatcher.spawn();
        state.dispatcher().shutdown().await.unwrap();
        task.await.unwrap();

        let app = router(state, &config.server);
        let response = app
            .oneshot(Request::get("/sse/news").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
