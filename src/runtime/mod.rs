/// Background services
///
/// Long-running jobs driven by tokio-cron-scheduler. Currently this is the
/// worker liveness heartbeat.

pub mod heartbeat;

pub use heartbeat::HeartbeatService;
