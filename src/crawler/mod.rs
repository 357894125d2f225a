//! Crawler module: everything that happens during a run
//!
//! This module contains the core crawling logic, including:
//! - The per-run frontier and worker pool
//! - HTTP fetching with politeness, auth and retry
//! - Content extraction and link discovery
//! - Change detection against the previous run
//! - The job state machine driving it all ([`Engine`])

mod control;
mod diff;
mod extractor;
mod fetcher;
mod frontier;
mod orchestrator;
mod politeness;

pub use control::{control_channel, ControlHandle, ControlSender, RunControl};
pub use diff::{classify, ChangeKind, DiffSummary, DiffTracker, PageSignature};
pub use extractor::{extract, ExtractError, ExtractedContent};
pub use fetcher::{build_http_client, Fetched, FetchedResponse, Fetcher, RetryPolicy};
pub use frontier::{Frontier, FrontierEntry, Push, PushOutcome};
pub use orchestrator::{Engine, StartOutcome};
pub use politeness::{effective_delay, OriginPermit, Politeness};
