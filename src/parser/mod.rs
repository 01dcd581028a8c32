//! Parser layer
//! - traits.rs: DocumentParser trait definition
//! - types.rs: Position-tagged tree (YamlNode, YamlDocument)
//! - yaml.rs: tree-sitter-yaml backed parser
//! - scalar.rs: Scalar decoding (quoting, folding, block scalars)
//! - walker.rs: Point query and visitor
//! - path.rs: Dotted path patterns

pub mod path;
pub mod scalar;
pub mod traits;
pub mod types;
pub mod walker;
pub mod yaml;

pub use path::PathPattern;
pub use traits::{DocumentParser, ParseError};
pub use types::{NodeKind, NodeStyle, YamlDocument, YamlNode};
pub use walker::{PointHit, point_query, visit};
pub use yaml::{TreeSitterYamlParser, parse_documents};
