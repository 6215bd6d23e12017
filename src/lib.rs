#[cfg(test)]
mod test;

pub mod api;
pub mod core;
pub mod error;
pub mod model;

pub mod prelude {
    pub use crate::api::{Modrinth, ModrinthApi};
    pub use crate::core::manage::{backup_mod, download_file, download_file_with_progress};
    pub use crate::core::utils::{default_config_path, guess_slug};
    pub use crate::core::{
        add_verified, adopt, check, confirm, find_mods, find_unmanaged, get_current_mods,
        get_outdated, select_instance, update,
    };
    pub use crate::error::ModSyncError;
    pub use crate::model::{
        Config, LatestFile, LocalMod, ModReport, ModStatus, Overrides, ResolvedInstance,
        SearchResponse, UpdateOutcome,
    };
}
