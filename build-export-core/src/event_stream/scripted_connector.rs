use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use super::{EventStream, SseEvent, StreamConnector, StreamFault, StreamRequest};

/// What a single connect call to a url should produce.
#[derive(Debug)]
pub(crate) enum ScriptedAttempt {
    Fail(StreamFault),
    /// A stream yielding these items, then ending cleanly unless an `Err` came first.
    Events(Vec<Result<SseEvent, StreamFault>>),
    /// A stream fed by the test; it ends when every sender is dropped.
    Live(async_channel::Receiver<Result<SseEvent, StreamFault>>),
}

/// Stands in for the network in tests. Urls without a script left answer with 204.
#[derive(Debug)]
pub(crate) struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedAttempt>>>,
    requests: Mutex<Vec<StreamRequest>>,
    opened_tx: async_channel::Sender<String>,
    opened_rx: async_channel::Receiver<String>,
    live_streams: Arc<AtomicUsize>,
    peak_live_streams: Arc<AtomicUsize>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        let (opened_tx, opened_rx) = async_channel::unbounded();
        Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            opened_tx,
            opened_rx,
            live_streams: Arc::new(AtomicUsize::new(0)),
            peak_live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedConnector {
    pub(crate) fn script(&self, url: &str, attempt: ScriptedAttempt) {
        let mut guard = self.scripts.lock().unwrap();
        guard.entry(url.to_string()).or_default().push_back(attempt);
    }

    pub(crate) fn live(&self, url: &str) -> async_channel::Sender<Result<SseEvent, StreamFault>> {
        let (tx, rx) = async_channel::unbounded();
        self.script(url, ScriptedAttempt::Live(rx));
        tx
    }

    /// Urls of successfully opened streams, in the order they opened.
    pub(crate) fn opened(&self) -> async_channel::Receiver<String> {
        self.opened_rx.clone()
    }

    pub(crate) fn requests(&self, url: &str) -> Vec<StreamRequest> {
        let guard = self.requests.lock().unwrap();
        guard.iter().filter(|r| r.url == url).cloned().collect()
    }

    pub(crate) fn connect_count(&self, url: &str) -> usize {
        self.requests(url).len()
    }

    pub(crate) fn peak_live_streams(&self) -> usize {
        self.peak_live_streams.load(Ordering::SeqCst)
    }

    fn open_stream(
        &self,
        url: &str,
        source: futures::stream::BoxStream<'static, Result<SseEvent, StreamFault>>,
    ) -> EventStream {
        let now_live = self.live_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live_streams.fetch_max(now_live, Ordering::SeqCst);
        let _ = self.opened_tx.try_send(url.to_string());

        let guard = LiveGuard(Arc::clone(&self.live_streams));
        Box::pin(async_stream::stream! {
            let _guard = guard;
            let mut source = source;
            while let Some(item) = futures::StreamExt::next(&mut source).await {
                let stop = item.is_err();
                yield item;
                if stop {
                    return;
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, request: &StreamRequest) -> Result<EventStream, StreamFault> {
        self.requests.lock().unwrap().push(request.clone());

        let next = {
            let mut guard = self.scripts.lock().unwrap();
            guard.get_mut(&request.url).and_then(|q| q.pop_front())
        };

        match next {
            None => Err(StreamFault::Status(204)),
            Some(ScriptedAttempt::Fail(fault)) => Err(fault),
            Some(ScriptedAttempt::Events(items)) => Ok(self.open_stream(
                &request.url,
                Box::pin(futures::stream::iter(items)),
            )),
            Some(ScriptedAttempt::Live(rx)) => Ok(self.open_stream(&request.url, Box::pin(rx))),
        }
    }
}
