//! Authentication commands.

use dayboard_providers::TokenStore as _;
use dayboard_providers::google::FileTokenStore;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Forget the stored Google session.
///
/// The next command that needs calendars goes through consent again.
pub fn reset(config: &ClientConfig) -> ClientResult<()> {
    let store = FileTokenStore::new(config.token_dir());
    store.reset()?;

    println!("Removed stored Google session from {}", store.dir().display());
    Ok(())
}
