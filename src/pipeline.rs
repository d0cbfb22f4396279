use crate::record::{LogRecord, SerializedRecord};
use crate::stage::{
    CommonInfoFormatter, LogType, Placement, RequestResponseLifter, SchemaPackager, Stage,
};
use std::fmt;

/// Error returned when a stage list violates the ordering contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline `{0}` has no stages")]
    Empty(String),

    #[error("pipeline `{pipeline}` must start with a leading stage, found `{found}`")]
    MissingLeading { pipeline: String, found: &'static str },

    #[error("pipeline `{pipeline}` must end with a terminal stage, found `{found}`")]
    MissingTerminal { pipeline: String, found: &'static str },

    #[error("stage `{stage}` is out of place at position {index} in pipeline `{pipeline}`")]
    Misplaced { pipeline: String, stage: &'static str, index: usize },
}

/// Error returned when a processed record cannot be serialized.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Ordered, immutable list of stages. Built once, shared across threads
/// and applied independently to every record.
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Pipeline for HTTP access logs: common info (`type = "access"`),
    /// request/response lifting with redaction, packaging.
    pub fn access() -> Self {
        Self {
            name: LogType::Access.to_string(),
            stages: vec![
                Box::new(CommonInfoFormatter::new(LogType::Access)),
                Box::new(RequestResponseLifter::new()),
                Box::new(SchemaPackager),
            ],
        }
    }

    /// Pipeline for general application logs: common info
    /// (`type = "app"`), packaging.
    pub fn app() -> Self {
        Self {
            name: LogType::App.to_string(),
            stages: vec![
                Box::new(CommonInfoFormatter::new(LogType::App)),
                Box::new(SchemaPackager),
            ],
        }
    }

    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order.
    pub fn apply(&self, record: LogRecord) -> LogRecord {
        self.stages.iter().fold(record, |rec, stage| stage.apply(rec))
    }

    /// Run every stage and serialize the result into one JSON line.
    pub fn format(&self, record: LogRecord) -> Result<SerializedRecord, FormatError> {
        let record = self.apply(record);
        let json = serde_json::to_string(&record)?;
        Ok(SerializedRecord { level: record.severity(), json })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Assembles a custom stage list and checks it against the placement
/// rules: exactly one leading stage, first; exactly one terminal stage,
/// last.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stages: Vec::new() }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let last = match self.stages.len() {
            0 => return Err(PipelineError::Empty(self.name)),
            n => n - 1,
        };

        for (index, stage) in self.stages.iter().enumerate() {
            let in_place = match stage.placement() {
                Placement::Leading => index == 0,
                Placement::Terminal => index == last,
                Placement::Middle => true,
            };
            if !in_place {
                return Err(PipelineError::Misplaced {
                    pipeline: self.name,
                    stage: stage.name(),
                    index,
                });
            }
        }

        let first = &self.stages[0];
        if first.placement() != Placement::Leading {
            return Err(PipelineError::MissingLeading { pipeline: self.name, found: first.name() });
        }
        let tail = &self.stages[last];
        if tail.placement() != Placement::Terminal {
            return Err(PipelineError::MissingTerminal { pipeline: self.name, found: tail.name() });
        }

        Ok(Pipeline { name: self.name, stages: self.stages })
    }
}
