pub mod connectors;
pub mod dedup;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod mfa;
pub mod resolver;

pub use connectors::{
    ActiveDirectoryConnector, ConnectorError, ConnectorRegistry, DirectoryConnector,
    JumpCloudConnector, MockConnector, MockOperation, OktaConnector,
};
pub use dedup::{dedup_key, deduplicate, fold_case};
pub use dispatcher::{dispatch, supports};
pub use engine::IdentityEngine;
pub use error::EngineError;
pub use fanout::fan_out_search;
pub use metrics::{get_metrics, init_metrics, record_connector_call};
pub use mfa::collect_mfa_devices;
pub use resolver::resolve_unified_account;
