//! # Pricegrid Configuration
//!
//! Two configuration surfaces, kept deliberately separate:
//!
//! - **Exchange registry** ([`registry`]): the JSON document describing every
//!   polled venue (endpoints, rate budget, weight, symbol format, quote
//!   list). Loaded once at startup and validated strictly; a bad registry
//!   is fatal.
//! - **Service settings** ([`settings`]): process-level knobs (port, mode,
//!   poll cadence, store connection strings) layered from an optional TOML
//!   file and plain environment variables.

pub mod registry;
pub mod settings;

pub use registry::{load_registry, ExchangeRegistry};
pub use settings::{ServiceMode, ServiceSettings};
