pub mod aggregator;
pub mod classifier;
pub mod pipeline;
pub mod presentation;
pub mod privacy;
pub mod reply;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use aggregator::DataAggregator;
pub use pipeline::{Pipeline, PipelineConfig, Response};
pub use presentation::PresentationBuilder;
pub use reply::{failure_reply, FailureReply};
pub use resolver::SourceResolver;
