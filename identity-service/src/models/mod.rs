pub mod account;
pub mod action;
pub mod mfa;
pub mod record;
pub mod source;

pub use account::{AggregatedSearchResult, UnifiedAccount};
pub use action::{AccountAction, ActionKind, UserPatch};
pub use mfa::{MfaDevice, MfaStatus};
pub use record::{AccountSource, Attributes, RecordType, SearchResult};
pub use source::Source;
