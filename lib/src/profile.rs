//! Validation profiles and the choice of profile for a cube.
use crate::graph_node::CubeMetadata;
use log::warn;
use oxigraph::model::NamedNode;
use std::fmt;
use std::sync::LazyLock;

/// The closed set of profile kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKey {
    Visualize,
    OpenDataSwiss,
    Default,
    Manual,
}

impl ProfileKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKey::Visualize => "visualize",
            ProfileKey::OpenDataSwiss => "opendataswiss",
            ProfileKey::Default => "default",
            ProfileKey::Manual => "manual",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "visualize" => Some(ProfileKey::Visualize),
            "opendataswiss" => Some(ProfileKey::OpenDataSwiss),
            "default" => Some(ProfileKey::Default),
            "manual" => Some(ProfileKey::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shape graph that can be applied to a cube.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationProfile {
    pub key: ProfileKey,
    pub shape_graph_iri: NamedNode,
    pub label: String,
    /// The `schema:workExample` that makes this profile applicable; `None` for default and manual.
    pub work_example_iri: Option<NamedNode>,
}

impl ValidationProfile {
    /// A profile built from a shape graph IRI the user typed in.
    pub fn manual(shape_graph_iri: NamedNode) -> Self {
        ValidationProfile {
            key: ProfileKey::Manual,
            label: format!("Manual ({})", shape_graph_iri.as_str()),
            shape_graph_iri,
            work_example_iri: None,
        }
    }
}

/// The configured profiles, in declaration order, plus the fallback.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<ValidationProfile>,
    default: ValidationProfile,
}

/// The profiles every run uses unless a caller builds its own registry.
pub static PROFILES: LazyLock<ProfileRegistry> = LazyLock::new(ProfileRegistry::standard);

impl ProfileRegistry {
    pub fn new(profiles: Vec<ValidationProfile>, default: ValidationProfile) -> Self {
        ProfileRegistry { profiles, default }
    }

    /// The cube.link profiles for visualize.admin.ch and opendata.swiss.
    pub fn standard() -> Self {
        let profile = |key, shape: &str, label: &str, work_example: Option<&str>| {
            ValidationProfile {
                key,
                shape_graph_iri: NamedNode::new_unchecked(shape),
                label: label.to_string(),
                work_example_iri: work_example.map(NamedNode::new_unchecked),
            }
        };
        ProfileRegistry {
            profiles: vec![
                profile(
                    ProfileKey::Visualize,
                    "https://cube.link/ref/main/shape/profile-visualize",
                    "Visualize",
                    Some("https://ld.admin.ch/application/visualize"),
                ),
                profile(
                    ProfileKey::OpenDataSwiss,
                    "https://cube.link/ref/main/shape/profile-opendataswiss",
                    "opendata.swiss",
                    Some("https://ld.admin.ch/application/opendataswiss"),
                ),
            ],
            default: profile(
                ProfileKey::Default,
                "https://cube.link/ref/main/shape/standalone-cube-constraint",
                "Standalone Cube Constraint",
                None,
            ),
        }
    }

    pub fn default_profile(&self) -> &ValidationProfile {
        &self.default
    }

    /// Looks a profile up by key; `default` included.
    pub fn get(&self, key: ProfileKey) -> Option<&ValidationProfile> {
        if key == ProfileKey::Default {
            return Some(&self.default);
        }
        self.profiles.iter().find(|p| p.key == key)
    }

    /// Profiles whose work example the cube declares, in declaration order.
    fn matching<'a>(&'a self, cube: &'a CubeMetadata) -> impl Iterator<Item = &'a ValidationProfile> {
        self.profiles.iter().filter(move |p| {
            p.work_example_iri
                .as_ref()
                .is_some_and(|we| cube.work_examples.contains(we))
        })
    }

    /// Every profile the user may pick for `cube`; the default profile is always last.
    pub fn available_profiles(&self, cube: &CubeMetadata) -> Vec<ValidationProfile> {
        let mut available: Vec<ValidationProfile> = self.matching(cube).cloned().collect();
        available.push(self.default.clone());
        available
    }

    /// Picks the profile for `cube`.
    ///
    /// The first matching profile in declaration order wins. Several matches mean the cube's
    /// metadata is ambiguous, which is logged but not an error.
    pub fn resolve(&self, cube: &CubeMetadata) -> ValidationProfile {
        let matches: Vec<&ValidationProfile> = self.matching(cube).collect();
        if matches.len() > 1 {
            let keys: Vec<&str> = matches.iter().map(|p| p.key.as_str()).collect();
            warn!(
                "Cube <{}> matches several profiles ({}); using '{}'",
                cube.iri.as_str(),
                keys.join(", "),
                matches[0].key
            );
        }
        matches
            .first()
            .map(|p| (*p).clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_with(work_examples: &[&str]) -> CubeMetadata {
        CubeMetadata {
            iri: NamedNode::new_unchecked("http://example.com/cube"),
            name: None,
            description: None,
            work_examples: work_examples
                .iter()
                .map(|s| NamedNode::new_unchecked(*s))
                .collect(),
            observation_constraint: None,
            dimensions: Vec::new(),
        }
    }

    #[test]
    fn no_match_falls_back_to_default() {
        let registry = ProfileRegistry::standard();
        let cube = cube_with(&["https://example.com/unrelated"]);
        assert_eq!(registry.resolve(&cube).key, ProfileKey::Default);
        let available = registry.available_profiles(&cube);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].key, ProfileKey::Default);
    }

    #[test]
    fn single_match_is_returned() {
        let registry = ProfileRegistry::standard();
        let cube = cube_with(&["https://ld.admin.ch/application/opendataswiss"]);
        assert_eq!(registry.resolve(&cube).key, ProfileKey::OpenDataSwiss);
    }

    #[test]
    fn ambiguous_match_picks_first_declared_and_default_stays_last() {
        let registry = ProfileRegistry::standard();
        let cube = cube_with(&[
            "https://ld.admin.ch/application/opendataswiss",
            "https://ld.admin.ch/application/visualize",
        ]);
        assert_eq!(registry.resolve(&cube).key, ProfileKey::Visualize);
        let keys: Vec<ProfileKey> = registry
            .available_profiles(&cube)
            .iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(
            keys,
            vec![ProfileKey::Visualize, ProfileKey::OpenDataSwiss, ProfileKey::Default]
        );
    }

    #[test]
    fn manual_profiles_carry_no_work_example() {
        let profile =
            ValidationProfile::manual(NamedNode::new_unchecked("https://example.com/shapes.ttl"));
        assert_eq!(profile.key, ProfileKey::Manual);
        assert!(profile.work_example_iri.is_none());
        assert_eq!(ProfileKey::parse("manual"), Some(ProfileKey::Manual));
        assert_eq!(PROFILES.default_profile().key, ProfileKey::Default);
    }
}
