#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod pipeline_run;

pub use self::pipeline_run::{Param, PipelineRef, PipelineRun, PipelineRunSpec};
pub use kube::{core::DynamicObject, Resource};
