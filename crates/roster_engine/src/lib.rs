//! Roster engine: HTTP transport, retrying execution and background job polling.
mod client;
mod config;
mod executor;
mod poller;
mod status;
mod store;
mod transport;
mod types;

pub use client::{ConsoleClient, MutationFailure, MutationReport, Submission};
pub use config::{load_config, save_config, ApiSettings, ConsoleConfig, ThrottleSettings};
pub use executor::{RequestExecutor, Sleeper, TokioSleeper};
pub use poller::{
    ChannelEventSink, JobEventSink, JobPoller, PollHandle, PollerSettings, MIN_POLL_INTERVAL,
};
pub use status::{
    ElapsedSettings, ElapsedStage, ElapsedStatusChecker, EndpointStatusChecker, StatusChecker,
    StatusCheckers,
};
pub use store::{
    ensure_state_dir, load_jobs, load_jobs_at, load_ron, save_jobs, save_ron, write_csv_backup,
    StoreError, JOBS_FILENAME,
};
pub use transport::{ReqwestTransport, Transport, TransportSettings};
pub use types::{ApiRequest, Method, TransportError};
