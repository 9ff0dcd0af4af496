//! End-to-end handling of one generation job.
//!
//! `Received -> Validated -> Acknowledged -> Admitted -> Executing ->
//! {Delivered, Failed}`. Everything up to admission runs in the caller;
//! execution runs on a detached task that owns the admission slot.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use picrelay_core::{AspectRatio, Destination, Job, JobState, PipelineSettings, Trigger};

use super::admission::{AdmissionGate, SlotGuard};
use super::backoff::{BackoffExecutor, RetryPolicy};
use super::dedup::EventDeduplicator;
use crate::messages;
use crate::notifier::{Notifier, display_name_or_placeholder};
use crate::prompt::PromptBuilder;
use crate::providers::ImageProvider;
use crate::storage::ArtifactStore;
use crate::templates::TemplateLibrary;

/// Longest prompt accepted, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Upper bound on the "working on it" post. Slash commands must be answered
/// within three seconds and the acknowledgement is posted before that.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Synchronous rejections; nothing reaches the provider.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("too many jobs in flight (limit {ceiling})")]
    AdmissionRejected { ceiling: usize },
}

/// Returned once a job has been handed to its background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: String,
    /// Thread where progress and results are posted
    pub thread_ref: Option<String>,
}

/// Validate a raw trigger into an immutable job.
///
/// An aspect token that is not recognized falls back to the default ratio
/// instead of failing.
pub fn validate(trigger: Trigger, job_id: String) -> Result<Job, DispatchError> {
    let flag = picrelay_core::split_aspect_flag(&trigger.prompt_text);

    let aspect_ratio = match flag.token.as_deref() {
        None => AspectRatio::default(),
        Some(token) => token.parse().unwrap_or_else(|_| {
            warn!(
                token,
                "Unrecognized aspect ratio, using {}",
                AspectRatio::default()
            );
            AspectRatio::default()
        }),
    };

    let prompt = flag.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(DispatchError::Validation(
            "Please describe the image you want, e.g. `a fox in a teacup --ar 16:9`.".to_string(),
        ));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(DispatchError::Validation(format!(
            "That prompt is too long ({} characters, the limit is {}).",
            chars, MAX_PROMPT_CHARS
        )));
    }

    Ok(Job {
        id: job_id,
        kind: trigger.kind,
        prompt,
        aspect_ratio,
        reference_images: trigger.attachments,
        destination: Destination {
            channel_id: trigger.destination_id,
            thread_ref: trigger.thread_ref,
        },
        requester_id: trigger.requester_id,
    })
}

/// Owns the pipeline's shared state and its collaborators.
pub struct JobDispatcher {
    gate: AdmissionGate,
    dedup: EventDeduplicator,
    executor: BackoffExecutor,
    provider: Arc<dyn ImageProvider>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ArtifactStore>,
    prompt_builder: PromptBuilder,
    templates: TemplateLibrary,
}

impl JobDispatcher {
    pub fn new(
        settings: &PipelineSettings,
        provider: Arc<dyn ImageProvider>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            gate: AdmissionGate::new(settings.max_concurrent_jobs),
            dedup: EventDeduplicator::new(settings.dedup_capacity),
            executor: BackoffExecutor::new(RetryPolicy::from_settings(settings)),
            provider,
            notifier,
            store,
            prompt_builder: PromptBuilder::default(),
            templates: TemplateLibrary::empty(),
        }
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = templates;
        self
    }

    /// Record an idempotency key; `true` means the event was already handled.
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.dedup.is_duplicate(key)
    }

    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    pub fn ceiling(&self) -> usize {
        self.gate.ceiling()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Validate, acknowledge and admit a trigger, then run it in the
    /// background. Returns without waiting for the provider.
    pub async fn dispatch(self: &Arc<Self>, trigger: Trigger) -> Result<JobTicket, DispatchError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        debug!(job_id = %job_id, kind = %trigger.kind, state = ?JobState::Received, "Trigger received");

        let job = validate(trigger, job_id)?;
        debug!(job_id = %job.id, state = ?JobState::Validated, "Job validated");

        let job = self.acknowledge(job).await;

        let Some(slot) = self.gate.try_admit() else {
            let ceiling = self.gate.ceiling();
            warn!(job_id = %job.id, ceiling, state = ?JobState::Failed, "Admission rejected");
            self.notify(&job.id, &job.destination, &messages::too_busy(ceiling))
                .await;
            return Err(DispatchError::AdmissionRejected { ceiling });
        };
        debug!(
            job_id = %job.id,
            in_flight = self.gate.in_flight(),
            state = ?JobState::Admitted,
            "Job admitted"
        );

        let ticket = JobTicket {
            job_id: job.id.clone(),
            thread_ref: job.destination.thread_ref.clone(),
        };

        let span = info_span!("job", id = %job.id);
        let job_id = job.id.clone();
        let destination = job.destination.clone();

        let worker = Arc::clone(self);
        let handle =
            tokio::spawn(async move { worker.run(job, slot).await }.instrument(span.clone()));

        let this = Arc::clone(self);
        tokio::spawn(
            async move { this.supervise(handle, job_id, destination).await }.instrument(span),
        );

        Ok(ticket)
    }

    /// Wait for a job task and report it as failed if it panicked.
    ///
    /// The slot is already released by the time a panic is observed here.
    async fn supervise(
        &self,
        handle: JoinHandle<JobState>,
        job_id: String,
        destination: Destination,
    ) {
        match handle.await {
            Ok(state) => debug!(?state, "Job finished"),
            Err(e) => {
                error!(state = ?JobState::Failed, "Job task aborted: {}", e);
                self.notify(&job_id, &destination, &messages::job_crashed())
                    .await;
            }
        }
    }

    /// Post the "working on it" message and pin the job to its thread.
    ///
    /// Gives up after [`ACK_TIMEOUT`]; the job then continues unthreaded.
    async fn acknowledge(&self, mut job: Job) -> Job {
        let destination = &job.destination;
        let posted = tokio::time::timeout(
            ACK_TIMEOUT,
            self.notifier.post_message(
                &destination.channel_id,
                &messages::working(job.aspect_ratio),
                destination.thread_ref.as_deref(),
            ),
        )
        .await;

        match posted {
            Ok(Ok(message)) => {
                if job.destination.thread_ref.is_none() {
                    job.destination.thread_ref = Some(message.ts);
                }
                debug!(job_id = %job.id, state = ?JobState::Acknowledged, "Job acknowledged");
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, "Failed to post acknowledgement: {}", e);
            }
            Err(_) => {
                warn!(job_id = %job.id, "Acknowledgement timed out after {:?}", ACK_TIMEOUT);
            }
        }
        job
    }

    /// Execute an admitted job to a terminal state.
    ///
    /// The slot is released when this returns or unwinds. Errors never
    /// escape; they are turned into a message in the job's thread.
    pub async fn run(&self, job: Job, slot: SlotGuard) -> JobState {
        let _slot = slot;
        debug!(state = ?JobState::Executing, "Job executing");

        let display_name =
            display_name_or_placeholder(self.notifier.as_ref(), &job.requester_id).await;
        let prompt = self.prompt_builder.build(&job, self.templates.len());
        let mut references = job.reference_images.clone();
        references.extend(self.templates.images().iter().cloned());

        let provider = self.provider.as_ref();
        let prompt_text = prompt.as_str();
        let reference_slice = references.as_slice();
        let aspect_ratio = job.aspect_ratio;
        let result = self
            .executor
            .execute(move |attempt| {
                debug!(attempt, provider = provider.name(), "Calling image provider");
                provider.generate(prompt_text, reference_slice, aspect_ratio)
            })
            .await;

        let image = match result {
            Ok(image) => image,
            Err(e) => {
                error!(attempts = e.attempts, state = ?JobState::Failed, "Image generation failed: {}", e);
                self.notify(&job.id, &job.destination, &messages::generation_failed(&e))
                    .await;
                return JobState::Failed;
            }
        };

        let filename = format!("picrelay-{}.{}", short_id(&job.id), image.extension());
        match self.store.persist(&image.data, &filename).await {
            Ok(locator) => info!("Stored image at {}", locator),
            Err(e) => warn!("Failed to store image: {}", e),
        }

        match self
            .notifier
            .post_file(
                &job.destination.channel_id,
                image.data,
                &filename,
                &messages::delivered(&display_name),
                job.destination.thread_ref.as_deref(),
            )
            .await
        {
            Ok(()) => {
                info!(state = ?JobState::Delivered, "Image delivered");
                JobState::Delivered
            }
            Err(e) => {
                error!(state = ?JobState::Failed, "Failed to upload image: {}", e);
                self.notify(&job.id, &job.destination, &messages::delivery_failed())
                    .await;
                JobState::Failed
            }
        }
    }

    /// Best-effort text message into the job's thread.
    async fn notify(&self, job_id: &str, destination: &Destination, text: &str) {
        if let Err(e) = self
            .notifier
            .post_message(
                &destination.channel_id,
                text,
                destination.thread_ref.as_deref(),
            )
            .await
        {
            error!(job_id = %job_id, "Failed to deliver notification: {}", e);
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picrelay_core::{ReferenceImage, TriggerKind};

    fn trigger(text: &str) -> Trigger {
        Trigger {
            kind: TriggerKind::Command,
            prompt_text: text.to_string(),
            destination_id: "C1".to_string(),
            requester_id: "U1".to_string(),
            thread_ref: None,
            source_ts: None,
            attachments: vec![ReferenceImage::new("image/png", vec![1u8])],
        }
    }

    #[test]
    fn validate_builds_job() {
        let job = validate(trigger("a fox in a teacup --ar 9:16"), "id-1".to_string()).unwrap();

        assert_eq!(job.id, "id-1");
        assert_eq!(job.prompt, "a fox in a teacup");
        assert_eq!(job.aspect_ratio, AspectRatio::Portrait9x16);
        assert_eq!(job.reference_images.len(), 1);
        assert_eq!(job.destination.channel_id, "C1");
    }

    #[test]
    fn validate_rejects_empty_prompt() {
        for text in ["", "   ", "--ar 16:9", "4:3"] {
            let err = validate(trigger(text), "id".to_string()).unwrap_err();
            assert!(matches!(err, DispatchError::Validation(_)), "{:?}", text);
        }
    }

    #[test]
    fn validate_rejects_long_prompt() {
        let text = "a".repeat(MAX_PROMPT_CHARS + 1);
        let err = validate(trigger(&text), "id".to_string()).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn unknown_aspect_falls_back_to_default() {
        let job = validate(trigger("a castle --ar 21:9"), "id".to_string()).unwrap();
        assert_eq!(job.aspect_ratio, AspectRatio::default());
        assert_eq!(job.prompt, "a castle");
    }

    #[test]
    fn trailing_time_is_kept_in_prompt() {
        let job = validate(trigger("a clock showing 3:45"), "id".to_string()).unwrap();
        assert_eq!(job.prompt, "a clock showing 3:45");
        assert_eq!(job.aspect_ratio, AspectRatio::default());
    }

    #[test]
    fn short_id_handles_short_input() {
        assert_eq!(short_id("abcdefghijkl"), "abcdefgh");
        assert_eq!(short_id("abc"), "abc");
    }
}
