pub mod adopt;
pub mod instance;
pub mod manage;
pub mod update;
pub mod utils;

pub use adopt::{add_verified, adopt};
pub use instance::{confirm, select_instance};
pub use update::{check, get_outdated, update};
pub use utils::{find_mods, find_unmanaged, get_current_mods, match_owned, match_prefix};
