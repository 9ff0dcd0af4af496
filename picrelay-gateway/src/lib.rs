pub mod ingest;
pub mod messages;
pub mod notifier;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod server;
pub mod state;
pub mod storage;
pub mod templates;

pub use notifier::{MessageRef, Notifier, NotifyError, SlackClient};
pub use pipeline::{DispatchError, JobDispatcher, JobTicket};
pub use providers::{GeneratedImage, ImageProvider, ProviderError};
pub use state::AppState;
