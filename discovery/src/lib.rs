//! Locating and presenting node interface descriptors.
//!
//! Descriptor files are installed into a package's share directory. This
//! crate finds them and turns parsed results into text:
//!
//! - [`discover::discover`] resolves a package through the install prefixes
//!   and lists its `*.nodl.xml` files, sorted.
//! - [`discover::collect_descriptor_paths`] expands explicit file and
//!   directory arguments.
//! - [`config::NodlConfig`] carries prefixes, the duplicate-entry policy,
//!   and the default output format.
//! - [`output`] renders merged interfaces and merge conflicts.
//!
//! # Example
//!
//! ```no_run
//! use nodl_discovery::{NodlConfig, discover};
//!
//! let config = NodlConfig::default();
//! let paths = discover("demo_nodes_cpp", &config).unwrap();
//! let merged = nodl_core::parse_multiple_with(&paths, config.parse_options()).unwrap();
//! println!(
//!     "{}",
//!     nodl_discovery::output::format_interface(&merged, config.format).unwrap()
//! );
//! ```

pub mod config;
pub mod discover;
pub mod output;

pub use config::NodlConfig;
pub use discover::{DiscoverError, discover};
pub use output::OutputFormat;
