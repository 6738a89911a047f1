// src/tweaks/mod.rs

pub mod catalog;
pub mod command;
pub mod devices;
pub mod engine;
pub mod latency;
pub mod managed;
pub mod method;
pub mod network;
pub mod power;
pub mod registry;
pub mod services;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use strum_macros::{Display, EnumIter};

use self::method::TweakMethod;
use crate::errors::{TweakError, TweakResult};

pub use engine::{ToggleOutcome, ToggleReport, TweakEngine};

/// Tri-state result of probing a tweak against the live system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum LiveState {
    #[strum(serialize = "ON")]
    On,
    #[strum(serialize = "OFF")]
    Off,
    #[default]
    Unknown,
}

impl LiveState {
    pub fn from_bool(on: bool) -> Self {
        if on {
            LiveState::On
        } else {
            LiveState::Off
        }
    }

    /// `Some(true)` for On, `Some(false)` for Off, `None` when unknown.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            LiveState::On => Some(true),
            LiveState::Off => Some(false),
            LiveState::Unknown => None,
        }
    }
}

/// Groups used to lay out the tweak view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum TweakCategory {
    Privacy,
    Services,
    Power,
    Network,
    Latency,
    System,
}

impl TweakCategory {
    pub fn left() -> Vec<Self> {
        vec![TweakCategory::Privacy, TweakCategory::System]
    }

    pub fn middle() -> Vec<Self> {
        vec![TweakCategory::Services, TweakCategory::Network]
    }

    pub fn right() -> Vec<Self> {
        vec![TweakCategory::Power, TweakCategory::Latency]
    }
}

/// Immutable display metadata for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakDefinition {
    /// Stable identifier shared by the catalog, the managed store and the UI.
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: TweakCategory,
    /// The UI must flag this tweak as risky.
    pub requires_warning: bool,
    /// The OS only fully reflects the change after a restart.
    pub requires_restart: bool,
}

/// A catalog entry: metadata plus the strategy that applies and probes it.
pub struct Tweak {
    pub definition: TweakDefinition,
    pub method: Box<dyn TweakMethod>,
}

impl std::fmt::Debug for Tweak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tweak")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl Tweak {
    pub fn new(
        key: &'static str,
        title: &'static str,
        description: &'static str,
        category: TweakCategory,
        method: impl TweakMethod + 'static,
    ) -> Self {
        Self {
            definition: TweakDefinition {
                key,
                title,
                description,
                category,
                requires_warning: false,
                requires_restart: false,
            },
            method: Box::new(method),
        }
    }

    pub fn with_warning(mut self) -> Self {
        self.definition.requires_warning = true;
        self
    }

    pub fn with_restart(mut self) -> Self {
        self.definition.requires_restart = true;
        self
    }
}

/// Ordered, case-insensitive registry of every supported tweak.
#[derive(Debug)]
pub struct Catalog {
    entries: IndexMap<String, Tweak>,
}

impl Catalog {
    /// Builds a catalog, keeping the order given.
    ///
    /// Keys that collide case-insensitively are rejected.
    pub fn new(tweaks: Vec<Tweak>) -> anyhow::Result<Self> {
        let mut entries = IndexMap::with_capacity(tweaks.len());
        for tweak in tweaks {
            let normalized = tweak.definition.key.to_ascii_lowercase();
            if entries.contains_key(&normalized) {
                anyhow::bail!("Duplicate tweak key '{}'", tweak.definition.key);
            }
            entries.insert(normalized, tweak);
        }
        Ok(Self { entries })
    }

    pub fn list(&self) -> impl Iterator<Item = &TweakDefinition> + '_ {
        self.entries.values().map(|tweak| &tweak.definition)
    }

    pub fn lookup(&self, key: &str) -> TweakResult<&TweakDefinition> {
        self.entry(key).map(|tweak| &tweak.definition)
    }

    pub fn entry(&self, key: &str) -> TweakResult<&Tweak> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .ok_or_else(|| TweakError::NotFound(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The process-wide catalog.
pub static CATALOG: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new(catalog::all_tweaks()).unwrap_or_else(|e| {
        // The table is static; a duplicate is a programming error.
        panic!("Invalid tweak catalog: {e}")
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tweaks::registry::{RegistrySetting, RegistryToggle};
    use crate::system::Hive;

    fn sample(key: &'static str) -> Tweak {
        Tweak::new(
            key,
            "Sample",
            "Sample tweak",
            TweakCategory::System,
            RegistryToggle::new(
                "Sample updated.",
                vec![RegistrySetting::dword(Hive::CurrentUser, r"Software\Sample", "Value", 1, 0)],
            ),
        )
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = Catalog::new(vec![sample("sticky_keys_guard")]).unwrap();
        assert_eq!(
            catalog.lookup("STICKY_Keys_Guard").unwrap().key,
            "sticky_keys_guard"
        );
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let catalog = Catalog::new(vec![sample("a")]).unwrap();
        assert!(matches!(
            catalog.lookup("b"),
            Err(TweakError::NotFound(key)) if key == "b"
        ));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        assert!(Catalog::new(vec![sample("dup"), sample("DUP")]).is_err());
    }

    #[test]
    fn test_list_preserves_order() {
        let catalog = Catalog::new(vec![sample("z"), sample("a"), sample("m")]).unwrap();
        let keys: Vec<_> = catalog.list().map(|d| d.key).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_live_state_bool_mapping() {
        assert_eq!(LiveState::from_bool(true), LiveState::On);
        assert_eq!(LiveState::Off.as_bool(), Some(false));
        assert_eq!(LiveState::Unknown.as_bool(), None);
        assert_eq!(LiveState::On.to_string(), "ON");
    }
}
