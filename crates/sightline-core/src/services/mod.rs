//! Request-scoped operations. Every public entry point here catches its own
//! failures and reports them in an outcome value.

pub mod chat;
pub mod describe;
pub mod gallery;
pub mod intent;
pub mod upload;

pub use chat::{ChatOutcome, ChatRouter};
pub use describe::{DescribeOutcome, DescriptionService};
pub use intent::{Intent, IntentClassifier, KeywordClassifier};
pub use upload::{UploadOutcome, UploadService};
