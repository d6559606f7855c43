//! # xsdcover
//!
//! Path-coverage tooling for XML Schema: enumerate the hierarchical
//! element/attribute paths an XSD defines, measure how well XML documents
//! cover them, and generate compact schema-valid test corpora.
//!
//! ## Components
//!
//! - Schema model and loader ([`schema`])
//! - Path enumeration with structural constraints ([`enumerator`])
//! - Coverage measurement and reporting ([`coverage`])
//! - Three generation strategies sharing one materializer ([`generators`]):
//!   greedy set-cover, boolean maximization, and pairwise covering arrays
//! - Structural validation of XML against the model ([`validator`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use xsdcover::schema::SchemaModel;
//! use xsdcover::enumerator::enumerate_paths;
//! use xsdcover::coverage::CoverageMeasurer;
//!
//! let model = SchemaModel::from_file("schema.xsd")?;
//! let enumeration = enumerate_paths(&model, 10)?;
//!
//! let mut measurer = CoverageMeasurer::new(&enumeration.ground);
//! measurer.add_file("sample.xml");
//! println!("{}", measurer.report().render_text());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub mod namespaces;

pub mod documents;
pub mod paths;

pub mod schema;

pub mod coverage;
pub mod enumerator;

pub mod generators;

pub mod validator;

pub use error::{Error, GenerationError, Result};

/// Version of the xsdcover library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema Instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML Digital Signature namespace (well-known opaque import)
pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
