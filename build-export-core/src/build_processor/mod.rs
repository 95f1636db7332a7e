use std::sync::Arc;

use crate::{
    auth::AuthHeader,
    build_handlers::{HandledEventTypes, HandlerRegistry},
    config::{Config, RetryPolicy},
    event_stream::{ConnectionHandle, EventStreamConnection, StreamConnector},
    export_api::{Build, ExportApiUrls, ProcessFrom, BUILD_EVENT_ENVELOPE_NAME, BUILD_EVENT_NAME},
    ExportApiError,
};

mod processor_activity;
pub use processor_activity::{ProcessorActivity, ProcessorNotification};

mod scheduler;
use scheduler::{Scheduler, SchedulerMessage};

mod stream_listeners;
use stream_listeners::{BuildStreamListener, DiscoveryListener};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub max_concurrent_builds: usize,
    pub discovery_retry: RetryPolicy,
    pub build_retry: RetryPolicy,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_builds: 6,
            discovery_retry: RetryPolicy::discovery(),
            build_retry: RetryPolicy::per_build(),
        }
    }
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_builds: config.max_concurrent_builds,
            discovery_retry: config.discovery_retry,
            build_retry: config.build_retry,
        }
    }
}

/// Everything needed to open the event stream of one build.
#[derive(Debug)]
pub(crate) struct BuildStreams {
    urls: ExportApiUrls,
    auth_header: AuthHeader,
    connector: Arc<dyn StreamConnector>,
    registry: Arc<HandlerRegistry>,
    handled_event_types: Arc<HandledEventTypes>,
    retry: RetryPolicy,
}

impl BuildStreams {
    pub(crate) fn open_build(&self, build: &Build) -> ConnectionHandle {
        let url = self
            .urls
            .build_events(&build.build_id, &self.handled_event_types);
        let connection = EventStreamConnection::new(
            Arc::clone(&self.connector),
            url,
            self.auth_header.clone(),
            &[BUILD_EVENT_ENVELOPE_NAME],
            self.retry,
        );

        let listener = BuildStreamListener::new(
            Arc::clone(&self.handled_event_types),
            self.registry.handlers_for(build),
        );
        connection.open(listener)
    }
}

/// Lets other tasks feed builds to, or stop, a running processor.
#[derive(Clone, Debug)]
pub struct ProcessorHandle {
    tx: async_channel::Sender<SchedulerMessage>,
}

impl ProcessorHandle {
    pub fn enqueue(&self, build: Build) -> Result<(), ExportApiError> {
        let build_id = build.build_id.clone();
        self.tx
            .try_send(SchedulerMessage::Enqueue(build))
            .map_err(|_| ExportApiError::ProcessorShutdown(build_id))
    }

    /// Closes the discovery stream and every in-flight build stream, and drops pending builds.
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(SchedulerMessage::Shutdown);
    }
}

pub struct BuildProcessor {
    streams: BuildStreams,
    settings: ProcessorSettings,
    scheduler_tx: async_channel::Sender<SchedulerMessage>,
    scheduler_rx: async_channel::Receiver<SchedulerMessage>,
    notifications: Option<async_channel::Sender<ProcessorNotification>>,
}

impl BuildProcessor {
    pub fn new(
        urls: ExportApiUrls,
        auth_header: AuthHeader,
        mut settings: ProcessorSettings,
        registry: HandlerRegistry,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        if settings.max_concurrent_builds == 0 {
            warn!("max_concurrent_builds of 0 would never process anything, using 1");
            settings.max_concurrent_builds = 1;
        }

        let handled_event_types = registry.all_handled_event_types();
        if handled_event_types.is_empty() {
            warn!("No registered handler declares any event types");
        }

        let (scheduler_tx, scheduler_rx) = async_channel::unbounded();

        Self {
            streams: BuildStreams {
                urls,
                auth_header,
                connector,
                registry: Arc::new(registry),
                handled_event_types: Arc::new(handled_event_types),
                retry: settings.build_retry,
            },
            settings,
            scheduler_tx,
            scheduler_rx,
            notifications: None,
        }
    }

    pub fn handled_event_types(&self) -> &HandledEventTypes {
        &self.streams.handled_event_types
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn handle(&self) -> ProcessorHandle {
        ProcessorHandle {
            tx: self.scheduler_tx.clone(),
        }
    }

    pub fn subscribe(&mut self) -> async_channel::Receiver<ProcessorNotification> {
        let (tx, rx) = async_channel::unbounded();
        self.notifications = Some(tx);
        rx
    }

    /// Opens the discovery stream and processes every build it announces.
    ///
    /// Resolves once the discovery stream has ended and every build it produced has
    /// finished, or after a shutdown through a [`ProcessorHandle`].
    pub async fn start(self, from: ProcessFrom) -> ProcessorActivity {
        let url = self.streams.urls.builds_since(&from);
        info!(
            "Processing builds since {} with up to {} at a time, event types: {}",
            from,
            self.settings.max_concurrent_builds,
            self.streams.handled_event_types.join(",")
        );

        let discovery = EventStreamConnection::new(
            Arc::clone(&self.streams.connector),
            url.clone(),
            self.streams.auth_header.clone(),
            &[BUILD_EVENT_NAME],
            self.settings.discovery_retry,
        );
        let discovery_handle = discovery.open(DiscoveryListener::new(url, self.scheduler_tx.clone()));
        let discovery_closer = discovery_handle.closer();

        let tx = self.scheduler_tx.clone();
        tokio::spawn(async move {
            let outcome = discovery_handle.outcome().await;
            let _ = tx.send(SchedulerMessage::DiscoveryEnded(outcome)).await;
        });

        Scheduler::new(
            self.streams,
            self.scheduler_tx,
            self.scheduler_rx,
            self.settings.max_concurrent_builds,
            discovery_closer,
            self.notifications,
        )
        .run()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        build_handlers::{BuildEventHandler, HandlerDescriptor},
        event_stream::{
            scripted_connector::{ScriptedAttempt, ScriptedConnector},
            SseEvent, StreamFault, StreamOutcome,
        },
        export_api::BuildEvent,
    };
    use serde_json::json;
    use std::{
        sync::Mutex,
        time::Duration,
    };

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        build_id: String,
        log: CallLog,
    }

    impl BuildEventHandler for Recording {
        fn on_event(&mut self, event: &BuildEvent) {
            self.log.lock().unwrap().push(format!(
                "{}:{}:{}",
                self.name,
                self.build_id,
                event.event_type()
            ));
        }

        fn complete(&mut self) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}:complete", self.name, self.build_id));
        }
    }

    fn recording_registry(log: &CallLog) -> HandlerRegistry {
        let h1_log = log.clone();
        let h2_log = log.clone();
        HandlerRegistry::new(vec![
            HandlerDescriptor::new(
                "h1",
                &["BuildStarted", "BuildFinished"],
                move |b: &Build| Recording {
                    name: "h1",
                    build_id: b.build_id.clone(),
                    log: h1_log.clone(),
                },
            ),
            HandlerDescriptor::new("h2", &["BuildFinished"], move |b: &Build| Recording {
                name: "h2",
                build_id: b.build_id.clone(),
                log: h2_log.clone(),
            })
            .with_completion(),
        ])
    }

    fn settings(max_concurrent_builds: usize, build_retries: u32) -> ProcessorSettings {
        ProcessorSettings {
            max_concurrent_builds,
            discovery_retry: RetryPolicy::new(3, Duration::from_millis(1)),
            build_retry: RetryPolicy::new(build_retries, Duration::from_millis(1)),
        }
    }

    fn build_sse(build_id: &str) -> Result<SseEvent, StreamFault> {
        Ok(SseEvent::new(
            "Build",
            json!({ "buildId": build_id }).to_string(),
        ))
    }

    fn build_event_sse(event_type: &str, timestamp: i64) -> Result<SseEvent, StreamFault> {
        Ok(SseEvent::new(
            "BuildEvent",
            json!({ "type": { "eventType": event_type }, "timestamp": timestamp, "data": {} })
                .to_string(),
        ))
    }

    struct Fixture {
        connector: Arc<ScriptedConnector>,
        urls: ExportApiUrls,
        types: HandledEventTypes,
        log: CallLog,
    }

    impl Fixture {
        fn new() -> Self {
            let log = CallLog::default();
            Self {
                connector: Arc::new(ScriptedConnector::default()),
                urls: ExportApiUrls::new("https://ge.example.com"),
                types: recording_registry(&log).all_handled_event_types(),
                log,
            }
        }

        fn discovery_url(&self) -> String {
            self.urls.builds_since(&ProcessFrom::Now)
        }

        fn build_url(&self, build_id: &str) -> String {
            self.urls.build_events(build_id, &self.types)
        }

        fn processor(&self, settings: ProcessorSettings) -> BuildProcessor {
            BuildProcessor::new(
                self.urls.clone(),
                AuthHeader::bearer("token"),
                settings,
                recording_registry(&self.log),
                self.connector.clone(),
            )
        }

        fn log_for(&self, build_id: &str) -> Vec<String> {
            let marker = format!(":{}:", build_id);
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.contains(&marker))
                .cloned()
                .collect()
        }
    }

    async fn next_notification(
        rx: &async_channel::Receiver<ProcessorNotification>,
    ) -> ProcessorNotification {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a notification")
            .unwrap()
    }

    async fn assert_quiet(rx: &async_channel::Receiver<ProcessorNotification>) {
        let res = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(res.is_err(), "unexpected notification {:?}", res);
    }

    #[tokio::test]
    async fn test_third_build_waits_for_a_free_slot() {
        let fixture = Fixture::new();
        let discovery_tx = fixture.connector.live(&fixture.discovery_url());
        let b1_tx = fixture.connector.live(&fixture.build_url("b1"));
        let b2_tx = fixture.connector.live(&fixture.build_url("b2"));
        let b3_tx = fixture.connector.live(&fixture.build_url("b3"));

        let mut processor = fixture.processor(settings(2, 3));
        let notifications = processor.subscribe();
        let run = tokio::spawn(processor.start(ProcessFrom::Now));

        for id in ["b1", "b2", "b3"] {
            discovery_tx.send(build_sse(id)).await.unwrap();
        }

        assert_eq!(
            next_notification(&notifications).await,
            ProcessorNotification::BuildStarted(String::from("b1"))
        );
        assert_eq!(
            next_notification(&notifications).await,
            ProcessorNotification::BuildStarted(String::from("b2"))
        );
        assert_quiet(&notifications).await;

        b1_tx.send(build_event_sse("BuildStarted", 1)).await.unwrap();
        b1_tx.send(build_event_sse("BuildFinished", 9)).await.unwrap();
        b1_tx.send(Err(StreamFault::Status(204))).await.unwrap();

        assert_eq!(
            next_notification(&notifications).await,
            ProcessorNotification::BuildCompleted(String::from("b1"))
        );
        assert_eq!(
            next_notification(&notifications).await,
            ProcessorNotification::BuildStarted(String::from("b3"))
        );
        assert_quiet(&notifications).await;
        assert_eq!(
            fixture.log_for("b1"),
            vec![
                "h1:b1:BuildStarted",
                "h1:b1:BuildFinished",
                "h2:b1:BuildFinished",
                "h2:b1:complete"
            ]
        );
        assert!(fixture.log_for("b2").is_empty());

        b2_tx.send(Err(StreamFault::Status(204))).await.unwrap();
        b3_tx.send(Err(StreamFault::Status(204))).await.unwrap();
        discovery_tx.send(Err(StreamFault::Status(204))).await.unwrap();

        let activity = run.await.unwrap();
        assert_eq!(activity.builds_discovered, 3);
        assert_eq!(activity.builds_started, 3);
        assert_eq!(activity.builds_completed, 3);
        assert_eq!(activity.peak_in_flight, 2);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_and_fifo_admission() {
        let fixture = Fixture::new();
        let ids: Vec<String> = (0..8).map(|i| format!("build-{}", i)).collect();

        fixture.connector.script(
            &fixture.discovery_url(),
            ScriptedAttempt::Events(ids.iter().map(|id| build_sse(id)).collect()),
        );
        for id in ids.iter() {
            // The stream ends cleanly, the reconnect then answers 204.
            fixture.connector.script(
                &fixture.build_url(id),
                ScriptedAttempt::Events(vec![
                    build_event_sse("BuildStarted", 1),
                    build_event_sse("TaskFinished", 2),
                    build_event_sse("BuildFinished", 3),
                ]),
            );
        }

        let mut processor = fixture.processor(settings(3, 3));
        let notifications = processor.subscribe();
        let activity = processor.start(ProcessFrom::Now).await;

        assert_eq!(activity.builds_started, 8);
        assert_eq!(activity.builds_completed, 8);
        assert_eq!(activity.builds_abandoned, 0);
        assert!(activity.peak_in_flight <= 3);
        assert!(fixture.connector.peak_live_streams() <= 3);

        let mut started = Vec::new();
        while let Ok(n) = notifications.try_recv() {
            if let ProcessorNotification::BuildStarted(id) = n {
                started.push(id);
            }
        }
        assert_eq!(started, ids);

        for id in ids.iter() {
            let log = fixture.log_for(id);
            assert_eq!(log.len(), 4, "{:?}", log);
            assert_eq!(log.last().unwrap(), &format!("h2:{}:complete", id));
        }
    }

    #[tokio::test]
    async fn test_requests_only_handled_event_types() {
        let fixture = Fixture::new();
        fixture.connector.script(
            &fixture.discovery_url(),
            ScriptedAttempt::Events(vec![build_sse("b1")]),
        );

        fixture.processor(settings(1, 3)).start(ProcessFrom::Now).await;

        let requests = fixture.connector.requests(
            "https://ge.example.com/build-export/v1/build/b1/events?eventTypes=BuildStarted,BuildFinished",
        );
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].auth_header, AuthHeader::bearer("token"));
    }

    #[tokio::test]
    async fn test_abandoned_build_frees_its_slot() {
        let fixture = Fixture::new();
        fixture.connector.script(
            &fixture.discovery_url(),
            ScriptedAttempt::Events(vec![build_sse("flaky"), build_sse("fine")]),
        );
        for _ in 0..3 {
            fixture.connector.script(
                &fixture.build_url("flaky"),
                ScriptedAttempt::Fail(StreamFault::Status(503)),
            );
        }

        let mut processor = fixture.processor(settings(1, 2));
        let notifications = processor.subscribe();
        let activity = processor.start(ProcessFrom::Now).await;

        assert_eq!(activity.builds_abandoned, 1);
        assert_eq!(activity.builds_completed, 1);
        assert!(fixture.log_for("flaky").is_empty());
        assert_eq!(fixture.log_for("fine"), vec!["h2:fine:complete"]);

        let all: Vec<_> = std::iter::from_fn(|| notifications.try_recv().ok()).collect();
        assert!(all.contains(&ProcessorNotification::BuildAbandoned(String::from("flaky"))));
        assert!(all.contains(&ProcessorNotification::DiscoveryEnded(
            StreamOutcome::Completed
        )));
    }

    #[tokio::test]
    async fn test_duplicate_and_malformed_discoveries() {
        let fixture = Fixture::new();
        fixture.connector.script(
            &fixture.discovery_url(),
            ScriptedAttempt::Events(vec![
                Ok(SseEvent::new("Build", "{oops")),
                build_sse("b1"),
                build_sse("b1"),
            ]),
        );
        let b1_tx = fixture.connector.live(&fixture.build_url("b1"));

        let processor = fixture.processor(settings(2, 3));
        let run = tokio::spawn(processor.start(ProcessFrom::Now));

        tokio::time::sleep(Duration::from_millis(50)).await;
        b1_tx.send(Err(StreamFault::Status(204))).await.unwrap();

        let activity = run.await.unwrap();
        assert_eq!(activity.builds_discovered, 1);
        assert_eq!(activity.builds_completed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_and_shutdown() {
        let fixture = Fixture::new();
        let _discovery_tx = fixture.connector.live(&fixture.discovery_url());
        let _b1_tx = fixture.connector.live(&fixture.build_url("b1"));

        let mut processor = fixture.processor(settings(1, 3));
        let notifications = processor.subscribe();
        let handle = processor.handle();
        let run = tokio::spawn(processor.start(ProcessFrom::Now));

        handle.enqueue(Build::new("b1")).unwrap();
        handle.enqueue(Build::new("b2")).unwrap();
        assert_eq!(
            next_notification(&notifications).await,
            ProcessorNotification::BuildStarted(String::from("b1"))
        );

        handle.shutdown();
        let activity = run.await.unwrap();

        assert_eq!(activity.builds_started, 1);
        assert_eq!(activity.builds_abandoned, 1);
        assert!(fixture.log_for("b1").is_empty());
        assert!(handle.enqueue(Build::new("b3")).is_err());
    }
}
