pub mod flow_store;
pub mod pattern_store;

pub use flow_store::PriorityFlowStore;
pub use pattern_store::TimeframePatternStore;
