#![forbid(unsafe_code)]

//! Simulation-enabled policy.
//!
//! The engine asks [`SimulationPolicy`] once per plugin element, the first
//! time it sees that element, and caches the verdict for the element's
//! lifetime. Implementations must be synchronous and side-effect free.

/// Decides whether click simulation runs for content at a location.
pub trait SimulationPolicy {
    fn is_simulation_enabled_for_location(&self, location: &str) -> bool;
}

impl<F> SimulationPolicy for F
where
    F: Fn(&str) -> bool,
{
    fn is_simulation_enabled_for_location(&self, location: &str) -> bool {
        self(location)
    }
}

/// Global switch plus a list of sites where simulation stays off.
///
/// A site entry matches its own host and every subdomain of it:
/// `example.org` disables `example.org` and `games.example.org`, but not
/// `notexample.org`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePolicy {
    enabled: bool,
    disabled_sites: Vec<String>,
}

impl Default for SitePolicy {
    fn default() -> Self {
        Self::enabled()
    }
}

impl SitePolicy {
    /// Simulation on everywhere.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            disabled_sites: Vec::new(),
        }
    }

    /// Simulation off everywhere.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            disabled_sites: Vec::new(),
        }
    }

    /// Build from a global switch and an exception list.
    pub fn new<I, S>(enabled: bool, disabled_sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            enabled,
            disabled_sites: disabled_sites
                .into_iter()
                .map(|site| site.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|site| !site.is_empty())
                .collect(),
        }
    }

    /// Global switch.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Normalized exception list.
    #[must_use]
    pub fn disabled_sites(&self) -> &[String] {
        &self.disabled_sites
    }
}

impl SimulationPolicy for SitePolicy {
    fn is_simulation_enabled_for_location(&self, location: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(host) = host_of(location) else {
            return true;
        };
        !self.disabled_sites.iter().any(|site| {
            host == *site
                || host
                    .strip_suffix(site.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Lower-cased host component of a URL-like location.
///
/// Returns `None` for locations without an authority (`about:blank`,
/// `data:` URLs, bare paths).
#[must_use]
pub fn host_of(location: &str) -> Option<String> {
    let (_, rest) = location.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://Example.org/a?b").as_deref(), Some("example.org"));
        assert_eq!(host_of("http://user:pw@cdn.example.org:8080/x").as_deref(), Some("cdn.example.org"));
        assert_eq!(host_of("http://[::1]:8000/").as_deref(), Some("::1"));
        assert_eq!(host_of("about:blank"), None);
        assert_eq!(host_of("file:///tmp/a.swf"), None);
    }

    #[test]
    fn global_switch_wins() {
        let policy = SitePolicy::disabled();
        assert!(!policy.is_simulation_enabled_for_location("https://example.org/"));
        assert!(!policy.is_simulation_enabled_for_location("about:blank"));
    }

    #[test]
    fn exceptions_match_host_and_subdomains() {
        let policy = SitePolicy::new(true, [".Example.org", "  "]);
        assert_eq!(policy.disabled_sites(), ["example.org"]);
        assert!(!policy.is_simulation_enabled_for_location("https://example.org/"));
        assert!(!policy.is_simulation_enabled_for_location("https://games.example.org/x"));
        assert!(policy.is_simulation_enabled_for_location("https://notexample.org/"));
        assert!(policy.is_simulation_enabled_for_location("about:blank"));
    }

    #[test]
    fn closures_are_policies() {
        let only_https = |location: &str| location.starts_with("https:");
        assert!(only_https.is_simulation_enabled_for_location("https://a.b/"));
        assert!(!only_https.is_simulation_enabled_for_location("http://a.b/"));
    }
}
