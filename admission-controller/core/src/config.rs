use std::fmt;

/// The set of registries, builders, and trusted users that build runs are
/// checked against.
///
/// Built once at startup and never modified, so a single value may be shared
/// by all concurrent evaluations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    allowed_domains: Vec<String>,
    allowed_builders: Vec<String>,
    system_users: Vec<String>,
}

/// Formats a list of strings as `[a, b, c]`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct List<'a>(pub(crate) &'a [String]);

const SCHEMES: [&str; 2] = ["http://", "https://"];

// === impl PolicyConfig ===

impl PolicyConfig {
    /// Empty entries are discarded so that a trailing separator in a
    /// comma-delimited setting does not allow everything.
    pub fn new<D, B, U>(allowed_domains: D, allowed_builders: B, system_users: U) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            allowed_domains: non_empty(allowed_domains),
            allowed_builders: non_empty(allowed_builders),
            system_users: non_empty(system_users),
        }
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    pub fn allowed_builders(&self) -> &[String] {
        &self.allowed_builders
    }

    pub fn system_users(&self) -> &[String] {
        &self.system_users
    }

    /// Trusted callers may push images anywhere.
    pub fn is_system_user(&self, user: &str) -> bool {
        self.system_users.iter().any(|u| u == user)
    }

    /// Builders are compared verbatim; `http://x` and `x` are distinct.
    pub fn is_allowed_builder(&self, image: &str) -> bool {
        self.allowed_builders.iter().any(|b| b == image)
    }

    /// Checks that `image` is namespaced under `user` in one of the allowed
    /// registries, i.e. that it starts with `<domain>/<user>/`, optionally
    /// preceded by an `http://` or `https://` scheme.
    pub fn is_user_image(&self, user: &str, image: &str) -> bool {
        let mut unqualified = std::iter::once(image)
            .chain(SCHEMES.iter().filter_map(|scheme| image.strip_prefix(scheme)));
        unqualified.any(|path| self.allowed_domains.iter().any(|d| is_under(path, d, user)))
    }
}

fn is_under(path: &str, domain: &str, user: &str) -> bool {
    path.strip_prefix(domain)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(|rest| rest.strip_prefix(user))
        .is_some_and(|rest| rest.starts_with('/'))
}

fn non_empty<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .filter(|s| !s.is_empty())
        .collect()
}

impl fmt::Display for PolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allowed domains: {}; allowed builders: {}; system users: {}",
            List(&self.allowed_domains),
            List(&self.allowed_builders),
            List(&self.system_users),
        )
    }
}

// === impl List ===

impl fmt::Display for List<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(item)?;
        }
        f.write_str("]")
    }
}
