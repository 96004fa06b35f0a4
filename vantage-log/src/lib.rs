//! Logging facade for Vantage.
//!
//! # Setup
//!
//! Invoke [`init`] once at startup with a [`LogConfig`]. The configuration
//! implements `serde` traits, so it can be embedded in configuration files.
//!
//! ```
//! let config = vantage_log::LogConfig::default();
//! vantage_log::init(&config);
//! ```
//!
//! # Conventions
//!
//! Log messages should start lowercase and end without punctuation. Prefer
//! short and precise messages over verbose text. Choose the level according
//! to these rules:
//!
//! - [`error!`] for bugs and invalid behavior.
//! - [`warn!`] for undesirable behavior.
//! - [`info!`] for messages relevant to the average operator.
//! - [`debug!`] for messages usually relevant to debugging.
//! - [`trace!`] for full auxiliary information.

#![warn(missing_docs)]

mod setup;

pub use setup::*;

// Expose the minimal tracing facade.
#[doc(inline)]
pub use tracing::{debug, error, info, trace, warn};
