// src/tweaks/managed.rs

use anyhow::Result;
use tracing::warn;

use super::{
    method::{Elevation, Report, TweakContext, TweakMethod},
    LiveState,
};
use crate::errors::TweakError;

/// Side effects of a tweak whose state cannot be read back from the OS.
pub trait ManagedAction: Send + Sync {
    fn elevation(&self) -> Elevation {
        Elevation::NotRequired
    }

    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()>;
}

/// Runs a [`ManagedAction`] and records the requested value in the managed
/// state store. Probing reads the store back.
pub struct Managed<A>(pub A);

impl<A: ManagedAction> TweakMethod for Managed<A> {
    fn elevation(&self) -> Elevation {
        self.0.elevation()
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        self.0.run(ctx, enabled, report)?;
        ctx.store.set(ctx.key, enabled)?;
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        match ctx.store.get(ctx.key) {
            Ok(value) => Ok(LiveState::from_bool(value)),
            Err(TweakError::StoreCorrupt { path, source }) => {
                warn!("{:?}: managed state at {} unreadable: {}", ctx.key, path.display(), source);
                Ok(LiveState::Unknown)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{store::ManagedStateStore, system::MemorySystem};

    struct Note;

    impl ManagedAction for Note {
        fn run(&self, _ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
            report.line(format!("note {}", enabled));
            Ok(())
        }
    }

    struct Broken;

    impl ManagedAction for Broken {
        fn run(&self, _ctx: &TweakContext<'_>, _enabled: bool, _report: &mut Report) -> Result<()> {
            anyhow::bail!("tool crashed")
        }
    }

    #[test]
    fn test_apply_records_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManagedStateStore::new(dir.path().join("managed.json"));
        let system = MemorySystem::new();
        let ctx = TweakContext {
            key: "startup_cleanup_assist",
            system: &system,
            store: &store,
        };
        let method = Managed(Note);

        assert_eq!(method.probe(&ctx).unwrap(), LiveState::Off);
        method.apply(&ctx, true, &mut Report::default()).unwrap();
        assert_eq!(method.probe(&ctx).unwrap(), LiveState::On);
        assert!(store.get("startup_cleanup_assist").unwrap());
    }

    #[test]
    fn test_failed_action_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManagedStateStore::new(dir.path().join("managed.json"));
        let system = MemorySystem::new();
        let ctx = TweakContext {
            key: "broken",
            system: &system,
            store: &store,
        };

        assert!(Managed(Broken).apply(&ctx, true, &mut Report::default()).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_store_probes_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("managed.json");
        fs::write(&path, "[1, 2").unwrap();
        let store = ManagedStateStore::new(&path);
        let system = MemorySystem::new();
        let ctx = TweakContext {
            key: "amd_chill_off",
            system: &system,
            store: &store,
        };

        assert_eq!(Managed(Note).probe(&ctx).unwrap(), LiveState::Unknown);
    }
}
