//! Location of the PROJ auxiliary data (authority database and grids).
//!
//! A [`DataDir`] is process-wide configuration shared by every CRS and operation built
//! after it is set. The global instance is reached through [`DataDir::global`] or the
//! [`get_data_dir`] / [`set_data_dir`] pair; an `Arc<DataDir>` may also be injected
//! into [`Crs::from_user_input_with`](crate::Crs::from_user_input_with).
//!
//! # Concurrency
//!
//! Reads and writes are individually synchronised, but a [`DataDir::set`] racing with
//! CRS construction on another thread has no defined ordering: the construction may
//! observe either location. Callers must not change the data directory while other
//! threads are building CRSs or transformers.

use crate::error::ProjError;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Environment variables consulted, in order, when no explicit directory is set.
pub const DATA_DIR_ENV_VARS: [&str; 2] = ["PROJ_DATA", "PROJ_LIB"];

/// Name of the directory, next to the running executable, holding bundled data.
pub const BUNDLED_DATA_DIR: &str = "proj_data";

const DATABASE_FILE: &str = "proj.db";

#[cfg(unix)]
const SYSTEM_DATA_DIRS: &[&str] = &[
    "/usr/share/proj",
    "/usr/local/share/proj",
    "/opt/homebrew/share/proj",
    "/opt/local/share/proj",
];

#[cfg(windows)]
const SYSTEM_DATA_DIRS: &[&str] = &[r"C:\OSGeo4W\share\proj", r"C:\OSGeo4W64\share\proj"];

#[cfg(not(any(unix, windows)))]
const SYSTEM_DATA_DIRS: &[&str] = &[];

static GLOBAL: LazyLock<Arc<DataDir>> = LazyLock::new(|| Arc::new(DataDir::new()));

#[derive(Debug, Default)]
struct State {
    explicit: Option<PathBuf>,
    /// Cached result of the candidate search; `None` until first resolution.
    resolved: Option<Option<PathBuf>>,
}

/// Resolver for the directory holding `proj.db` and grid files.
#[derive(Debug, Default)]
pub struct DataDir {
    state: RwLock<State>,
}

impl DataDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance used by the convenience constructors.
    pub fn global() -> Arc<DataDir> {
        GLOBAL.clone()
    }

    /// The active data directory.
    ///
    /// Fails with [`ProjError::DataDirNotFound`] when nothing was set and no candidate exists.
    pub fn get(&self) -> Result<PathBuf, ProjError> {
        self.resolve().ok_or_else(|| ProjError::DataDirNotFound {
            searched: self.searched(),
        })
    }

    /// Override the data directory for the remainder of the process.
    ///
    /// Contexts created afterwards search the new location; CRSs built earlier keep
    /// the definitions they already resolved.
    pub fn set(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        if !has_database(&path) {
            log::warn!("{} does not contain {DATABASE_FILE}", path.display());
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.explicit = Some(path);
        state.resolved = None;
    }

    /// Drop an explicit override and any cached resolution.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.explicit = None;
        state.resolved = None;
    }

    /// The explicit directory if one was set, otherwise the first usable candidate.
    pub fn resolve(&self) -> Option<PathBuf> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(explicit) = &state.explicit {
                return Some(explicit.clone());
            }
            if let Some(resolved) = &state.resolved {
                return resolved.clone();
            }
        }
        let found = self.candidates().into_iter().find(|dir| has_database(dir));
        match &found {
            Some(dir) => log::debug!("using PROJ data directory {}", dir.display()),
            None => log::debug!("no PROJ data directory found"),
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.explicit.is_none() {
            state.resolved = Some(found.clone());
        }
        found
    }

    /// Every location searched when no explicit directory is set, in priority order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let from_env = DATA_DIR_ENV_VARS
            .iter()
            .filter_map(|var| env::var_os(var))
            .flat_map(|value| env::split_paths(&value).collect::<Vec<_>>());
        let bundled = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED_DATA_DIR)));
        let system = SYSTEM_DATA_DIRS.iter().map(PathBuf::from);
        from_env.chain(bundled).chain(system).collect()
    }

    /// The explicit directory, if any, followed by the [`candidates`](Self::candidates).
    pub fn searched(&self) -> Vec<PathBuf> {
        let explicit = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .explicit
            .clone();
        explicit.into_iter().chain(self.candidates()).collect()
    }
}

fn has_database(dir: &Path) -> bool {
    fs::File::open(dir.join(DATABASE_FILE)).is_ok()
}

/// The active directory of the global [`DataDir`].
pub fn get_data_dir() -> Result<PathBuf, ProjError> {
    DataDir::global().get()
}

/// Override the directory of the global [`DataDir`].
pub fn set_data_dir(path: impl AsRef<Path>) {
    DataDir::global().set(path)
}
