//! Command implementations and shared output helpers.

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod wishlist;

use pzafira_storefront::notify::{Notice, NoticeLevel, drain};
use pzafira_storefront::{StoreError, Storefront, StorefrontConfig};
use thiserror::Error;
use tokio::sync::broadcast::Receiver;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A store operation failed; its notice has already been printed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The command needs a signed-in user.
    #[error("Not signed in; set PZAFIRA_API_TOKEN")]
    NotSignedIn,
}

/// Build the client and show persisted state before any request.
///
/// # Errors
///
/// Returns an error if the snapshot database or HTTP client cannot be set up.
pub fn open(config: &StorefrontConfig) -> Result<Storefront, CommandError> {
    let storefront = Storefront::new(config)?;
    storefront.hydrate_all();
    Ok(storefront)
}

/// Confirm the configured token with the backend and load per-user data.
///
/// # Errors
///
/// Returns `CommandError::NotSignedIn` without a token or when the backend
/// rejects it.
pub async fn sign_in(storefront: &Storefront) -> Result<(), CommandError> {
    if !storefront.api().is_some_and(|api| api.has_token()) {
        return Err(CommandError::NotSignedIn);
    }
    match storefront.resume().await {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, "Signed in");
            Ok(())
        }
        Err(e) if e.is_unauthorized() => Err(CommandError::NotSignedIn),
        Err(e) => Err(e.into()),
    }
}

/// End the session; every per-user snapshot is removed.
pub fn logout(storefront: &Storefront) {
    storefront.sign_out();
    tracing::info!("Signed out; local cart, wishlist, orders and product snapshots removed");
}

/// Print every notice published so far to stderr.
pub fn print_notices(notices: &mut Receiver<Notice>) {
    for notice in drain(notices) {
        report(&format_notice(&notice));
    }
}

fn format_notice(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    format!("[{marker}] {}", notice.message)
}

/// Write a line to stderr.
#[allow(clippy::print_stderr)]
pub fn report(line: &str) {
    eprintln!("{line}");
}

/// Write a line to stdout.
#[allow(clippy::print_stdout)]
pub fn emit(line: &str) {
    println!("{line}");
}
