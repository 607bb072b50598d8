//! Transcode orchestration: parameter merging, retiming math, the engine
//! argument list, job execution, and typed progress over the engine's log.

mod command;
mod orchestrator;
mod params;
mod progress;

pub use command::{FILTER_GRAPH_FPS, build_transcode_args, speed_factor};
pub use orchestrator::{
    Job, TranscodeOpts, TranscodeOrchestrator, TranscodeRequest, is_engine_on_path,
};
pub use params::{GenerationParams, ParamsPatch, ParamsStore};
pub use progress::{ProgressParser, ProgressState, ProgressStatus};
