#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Admission policy for build runs submitted to a shared build cluster.
//!
//! A [`Policy`] is built once from a [`PolicyConfig`] and then evaluates each
//! `PipelineRun` independently. Evaluation is synchronous and never fails: a
//! payload that cannot be decoded, or a parameter that violates the policy,
//! produces a denied [`Decision`].

mod config;
mod params;
pub mod policy;

pub use self::{
    config::PolicyConfig,
    params::{ParsedResource, PayloadDecodeError},
    policy::{Decision, Policy, Reason},
};
pub use buildpack_admission_k8s_api::Param;
