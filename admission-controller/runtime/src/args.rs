use crate::{
    admission::Admission,
    core::{Policy, PolicyConfig},
    metrics::AdmissionMetrics,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::info;

const DEBUG_LOG: &str = "buildpack_admission=debug,info";

#[derive(Debug, Parser)]
#[clap(
    name = "buildpack-admission",
    about = "Validates PipelineRuns submitted to the shared build service"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "buildpack_admission=info,warn",
        env = "BUILDPACK_ADMISSION_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "BUILDPACK_ADMISSION_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    /// Enables debug logging, overriding `--log-level`.
    #[clap(long, env = "BUILDPACK_ADMISSION_DEBUG")]
    debug: bool,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Registries that users may push images to, under their own namespace.
    #[clap(
        long,
        env = "ALLOWED_DOMAINS",
        value_delimiter = ',',
        default_value = "harbor.toolforge.org,harbor.toolsbeta.wmflabs.org"
    )]
    allowed_domains: Vec<String>,

    /// Builder images that PipelineRuns may use.
    #[clap(
        long,
        env = "ALLOWED_BUILDERS",
        value_delimiter = ',',
        default_value = "paketobuildpacks/builder:base,gcr.io/buildpacks/builder:v1,docker-registry.tools.wmflabs.org/toolforge-bullseye0-builder"
    )]
    allowed_builders: Vec<String>,

    /// Users that may push images to any registry path.
    #[clap(
        long,
        env = "SYSTEM_USERS",
        value_delimiter = ',',
        default_value = "system:serviceaccount:tekton-pipelines:tekton-pipelines-controller"
    )]
    system_users: Vec<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            debug,
            client,
            server,
            admin,
            allowed_domains,
            allowed_builders,
            system_users,
        } = self;

        let log_level = if debug { DEBUG_LOG.parse()? } else { log_level };
        let config = PolicyConfig::new(allowed_domains, allowed_builders, system_users);

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(Some(server))
            .build()
            .await?;

        info!(%config, "Starting PipelineRun admission controller");
        let admission = Admission::new(Arc::new(Policy::new(config)), metrics);
        let runtime = runtime.spawn_server(move || admission.clone());

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
