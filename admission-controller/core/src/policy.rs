use crate::{
    config::{List, PolicyConfig},
    params::{ParsedResource, PayloadDecodeError},
    Param,
};
use tracing::{debug, trace};


/// Message returned when a build run is admitted.
pub const WELCOME: &str = "Welcome to the Toolforge!";

/// Destination of the built image. Must live under the requester's namespace
/// in an allowed registry unless the requester is a system user.
pub const APP_IMAGE: &str = "APP_IMAGE";

/// Image that performs the build. Must be one of the allowed builders.
pub const BUILDER_IMAGE: &str = "BUILDER_IMAGE";

/// Parameters that are permitted without further validation.
pub const UNCHECKED_PARAMS: [&str; 4] = ["SOURCE_URL", "USER_ID", "GROUP_ID", "SOURCE_REFERENCE"];

/// Evaluates build runs against a fixed [`PolicyConfig`].
#[derive(Clone, Debug)]
pub struct Policy {
    config: PolicyConfig,
}

/// The outcome of a single admission review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// The identifier of the review request, echoed back.
    pub uid: String,
    pub allowed: bool,
    pub message: String,
    pub reason: Reason,
}

/// Classifies a [`Decision`] for logs and metrics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    Admitted,
    InvalidPayload,
    AppImage,
    BuilderImage,
    Parameter,
}

#[derive(Debug, thiserror::Error)]
enum Violation<'a> {
    #[error(
        "{value} does not match an allowed domain for user {requester}; allowed domains: {}; system users: {}",
        List(.domains),
        List(.system_users)
    )]
    AppImage {
        value: &'a str,
        requester: &'a str,
        domains: &'a [String],
        system_users: &'a [String],
    },

    #[error("{value} does not match AllowedBuilders: {}", List(.builders))]
    BuilderImage {
        value: &'a str,
        builders: &'a [String],
    },

    #[error("Pipeline parameter {0} cannot be used")]
    Parameter(&'a str),
}

// === impl Policy ===

impl Policy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Decides whether `requester` may create the serialized build run in
    /// `payload`.
    pub fn evaluate(&self, uid: &str, requester: &str, payload: &[u8]) -> Decision {
        self.evaluate_parsed(uid, requester, ParsedResource::from_slice(payload))
    }

    /// Like [`Policy::evaluate`], for a payload that has already been run
    /// through the parser.
    pub fn evaluate_parsed(
        &self,
        uid: &str,
        requester: &str,
        parsed: Result<ParsedResource, PayloadDecodeError>,
    ) -> Decision {
        let run = match parsed {
            Ok(run) => run,
            Err(error) => {
                debug!(%uid, %error, "Failed to decode PipelineRun");
                return Decision::deny(uid, Reason::InvalidPayload, error);
            }
        };

        match self.check(requester, run.params()) {
            Ok(()) => {
                debug!(%uid, %requester, name = ?run.name(), "Admitted");
                Decision::admit(uid)
            }
            Err(violation) => {
                debug!(%uid, %requester, name = ?run.name(), %violation, "Denied");
                Decision::deny(uid, violation.reason(), violation)
            }
        }
    }

    /// Checks each parameter in order, stopping at the first violation.
    fn check<'a>(&'a self, requester: &'a str, params: &'a [Param]) -> Result<(), Violation<'a>> {
        let system_user = self.config.is_system_user(requester);
        trace!(%requester, system_user);

        for Param { name, value } in params {
            trace!(%name, %value, "Checking parameter");
            match name.as_str() {
                APP_IMAGE => {
                    if !system_user && !self.config.is_user_image(requester, value) {
                        return Err(Violation::AppImage {
                            value: value.as_str(),
                            requester,
                            domains: self.config.allowed_domains(),
                            system_users: self.config.system_users(),
                        });
                    }
                }

                BUILDER_IMAGE => {
                    if !self.config.is_allowed_builder(value) {
                        return Err(Violation::BuilderImage {
                            value: value.as_str(),
                            builders: self.config.allowed_builders(),
                        });
                    }
                }

                name if UNCHECKED_PARAMS.contains(&name) => {}

                name => return Err(Violation::Parameter(name)),
            }
        }

        Ok(())
    }
}

// === impl Decision ===

impl Decision {
    fn admit(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            message: WELCOME.to_string(),
            reason: Reason::Admitted,
        }
    }

    fn deny(uid: &str, reason: Reason, message: impl std::fmt::Display) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            message: message.to_string(),
            reason,
        }
    }
}

// === impl Reason ===

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::InvalidPayload => "invalid_payload",
            Self::AppImage => "app_image",
            Self::BuilderImage => "builder_image",
            Self::Parameter => "parameter",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Violation ===

impl Violation<'_> {
    fn reason(&self) -> Reason {
        match self {
            Self::AppImage { .. } => Reason::AppImage,
            Self::BuilderImage { .. } => Reason::BuilderImage,
            Self::Parameter(_) => Reason::Parameter,
        }
    }
}
