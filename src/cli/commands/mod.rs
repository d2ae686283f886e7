//! CLI command implementations

pub mod cache;
pub mod config;
pub mod login;
pub mod offerings;
pub mod subscriber;

pub use cache::execute as cache;
pub use config::execute as config;
pub use login::execute as login;
pub use offerings::execute as offerings;
pub use subscriber::execute as subscriber;

use console::Emoji;

pub(crate) static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
pub(crate) static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");
