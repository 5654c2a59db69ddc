pub mod pattern_producer;

pub use pattern_producer::{HttpPatternProducer, PatternAnalysisOutput, PatternAnalysisProducer};
