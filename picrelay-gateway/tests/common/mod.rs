//! Shared in-memory fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};

use picrelay_core::{AspectRatio, PipelineSettings, ReferenceImage, Trigger, TriggerKind};
use picrelay_gateway::messages::ERROR_PREFIX;
use picrelay_gateway::notifier::{MessageRef, Notifier, NotifyError};
use picrelay_gateway::pipeline::JobDispatcher;
use picrelay_gateway::providers::{GeneratedImage, ImageProvider, ProviderError};
use picrelay_gateway::storage::{ArtifactStore, StorageError};

/// What the scripted provider does on one call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Succeed,
    Fail(u16),
    Hang,
    Panic,
}

pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    last_reference_count: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedProvider {
    /// Provider that plays `steps` in order, then succeeds.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicU32::new(0),
            last_reference_count: AtomicUsize::new(0),
            gate: None,
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Provider whose calls wait for a permit on `gate` before succeeding.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            last_reference_count: AtomicUsize::new(0),
            gate: Some(gate),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_reference_count(&self) -> usize {
        self.last_reference_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-image"
    }

    async fn generate(
        &self,
        _prompt: &str,
        reference_images: &[ReferenceImage],
        _aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_reference_count
            .store(reference_images.len(), Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        let step = self
            .steps
            .lock()
            .expect("steps lock")
            .pop_front()
            .unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => Ok(GeneratedImage {
                mime_type: "image/png".to_string(),
                data: vec![0x89, b'P', b'N', b'G'],
            }),
            Step::Fail(status) => Err(ProviderError::from_status(status, "scripted failure")),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted provider panic"),
        }
    }
}

/// Something the notifier was asked to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posted {
    Message {
        channel_id: String,
        text: String,
        thread_ref: Option<String>,
    },
    File {
        channel_id: String,
        filename: String,
        caption: String,
        thread_ref: Option<String>,
        size: usize,
    },
}

impl Posted {
    pub fn is_error(&self) -> bool {
        matches!(self, Posted::Message { text, .. } if text.starts_with(ERROR_PREFIX))
    }

    pub fn text(&self) -> &str {
        match self {
            Posted::Message { text, .. } => text,
            Posted::File { caption, .. } => caption,
        }
    }

    pub fn thread_ref(&self) -> Option<&str> {
        match self {
            Posted::Message { thread_ref, .. } | Posted::File { thread_ref, .. } => {
                thread_ref.as_deref()
            }
        }
    }
}

pub struct RecordingNotifier {
    posts: Mutex<Vec<Posted>>,
    tx: mpsc::UnboundedSender<Posted>,
    next_ts: AtomicU64,
    fail_next_message: AtomicBool,
    stall_next_message: AtomicBool,
    display_name: Option<String>,
    files: HashMap<String, Vec<u8>>,
}

pub struct NotifierBuilder {
    display_name: Option<String>,
    files: HashMap<String, Vec<u8>>,
    fail_first_message: bool,
    stall_first_message: bool,
}

impl NotifierBuilder {
    pub fn unknown_user(mut self) -> Self {
        self.display_name = None;
        self
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn failing_first_message(mut self) -> Self {
        self.fail_first_message = true;
        self
    }

    /// The first message post hangs for a minute before it lands.
    pub fn stalling_first_message(mut self) -> Self {
        self.stall_first_message = true;
        self
    }

    pub fn build(self) -> (Arc<RecordingNotifier>, mpsc::UnboundedReceiver<Posted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = RecordingNotifier {
            posts: Mutex::new(Vec::new()),
            tx,
            next_ts: AtomicU64::new(1),
            fail_next_message: AtomicBool::new(self.fail_first_message),
            stall_next_message: AtomicBool::new(self.stall_first_message),
            display_name: self.display_name,
            files: self.files,
        };
        (Arc::new(notifier), rx)
    }
}

impl RecordingNotifier {
    pub fn builder() -> NotifierBuilder {
        NotifierBuilder {
            display_name: Some("Ada".to_string()),
            files: HashMap::new(),
            fail_first_message: false,
            stall_first_message: false,
        }
    }

    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Posted>) {
        Self::builder().build()
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.posts.lock().expect("posts lock").clone()
    }

    fn record(&self, posted: Posted) {
        self.posts.lock().expect("posts lock").push(posted.clone());
        let _ = self.tx.send(posted);
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ref: Option<&str>,
    ) -> Result<MessageRef, NotifyError> {
        if self.stall_next_message.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.fail_next_message.swap(false, Ordering::SeqCst) {
            return Err(NotifyError::Api {
                method: "chat.postMessage",
                error: "ratelimited".to_string(),
            });
        }
        self.record(Posted::Message {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            thread_ref: thread_ref.map(str::to_string),
        });
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            ts: format!("1700000000.{:06}", n),
        })
    }

    async fn post_file(
        &self,
        channel_id: &str,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        thread_ref: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.record(Posted::File {
            channel_id: channel_id.to_string(),
            filename: filename.to_string(),
            caption: caption.to_string(),
            thread_ref: thread_ref.map(str::to_string),
            size: bytes.len(),
        });
        Ok(())
    }

    async fn lookup_display_name(&self, user_id: &str) -> Result<String, NotifyError> {
        self.display_name.clone().ok_or_else(|| NotifyError::Api {
            method: "users.info",
            error: format!("user_not_found: {}", user_id),
        })
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>, NotifyError> {
        self.files.get(url).cloned().ok_or(NotifyError::Status {
            method: "files.download",
            status: 404,
        })
    }
}

/// Store that keeps artifacts in memory, or always fails.
pub struct MemoryStore {
    saved: Mutex<Vec<String>>,
    fail: bool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            saved: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().expect("saved lock").clone()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryStore {
    async fn persist(&self, _bytes: &[u8], suggested_name: &str) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Io(
                suggested_name.into(),
                std::io::Error::other("disk full"),
            ));
        }
        self.saved
            .lock()
            .expect("saved lock")
            .push(suggested_name.to_string());
        Ok(format!("memory://{}", suggested_name))
    }
}

/// Pipeline settings with deterministic delays.
pub fn settings() -> PipelineSettings {
    PipelineSettings {
        max_jitter_ms: 0,
        ..PipelineSettings::default()
    }
}

pub fn dispatcher(
    settings: &PipelineSettings,
    provider: Arc<ScriptedProvider>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryStore>,
) -> Arc<JobDispatcher> {
    Arc::new(JobDispatcher::new(settings, provider, notifier, store))
}

pub fn command(text: &str) -> Trigger {
    Trigger {
        kind: TriggerKind::Command,
        prompt_text: text.to_string(),
        destination_id: "C42".to_string(),
        requester_id: "U7".to_string(),
        thread_ref: None,
        source_ts: None,
        attachments: Vec::new(),
    }
}

/// Next notification, failing the test if none arrives.
pub async fn next_post(rx: &mut mpsc::UnboundedReceiver<Posted>) -> Posted {
    tokio::time::timeout(Duration::from_secs(3600), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notifier dropped")
}

/// Skip progress messages until a file upload or an error message arrives.
pub async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Posted>) -> Posted {
    loop {
        let posted = next_post(rx).await;
        if matches!(posted, Posted::File { .. }) || posted.is_error() {
            return posted;
        }
    }
}

/// Wait until every admission slot has been released.
pub async fn wait_until_idle(dispatcher: &JobDispatcher) {
    tokio::time::timeout(Duration::from_secs(3600), async {
        while dispatcher.in_flight() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("slots were never released");
}
