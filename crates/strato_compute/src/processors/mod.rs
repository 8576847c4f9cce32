//! Built-in compute processors.

pub mod bucket;
pub mod postgres;
pub mod remote;

pub use bucket::BucketProcessor;
pub use postgres::PostgresProcessor;
pub use remote::{
    DryRunRemoteRunner, PsqlRemoteRunner, RecordingRemoteRunner, RemoteCommand, RemoteCommandRunner,
};
