//! Pipeline components: channels and context, dispatcher, workers, supervisor, aggregator.

pub mod aggregator;
pub mod context;
pub mod dispatcher;
pub mod orchestrator;
pub mod supervisor;
pub mod workers;

pub use aggregator::{ImportReport, Tally, drain_results};
pub use context::{PipelineChannels, ShutdownSignal, WorkerContext, create_pipeline_channels};
pub use dispatcher::{DispatchStats, run_dispatch_loop, spawn_dispatcher};
pub use orchestrator::run_pipeline;
pub use supervisor::{SupervisorOutcome, spawn_supervisor};
pub use workers::{BatchFailure, WorkerMessage, WorkerSummary, spawn_workers, worker_loop};
