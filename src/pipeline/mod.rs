// Pipeline module
// Orchestrates analysis and rearrangement, with optional JSONL progress tracing

pub mod arranger;
pub mod trace;

pub use arranger::{ArrangerError, Rearrangement, TemporalArranger};
pub use trace::{read_trace_file, Stage, TraceEntry, TraceError, TraceWriter, Tracer};
