//! Shared vocabulary for the Rivulet normalize stage.
//!
//! Everything that crosses a crate boundary lives here: the typed cell
//! model, PUA decoding of tagged scalars, file naming rules, lineage
//! column names and the configuration structs consumed by the engine.

pub mod config;
pub mod lineage;
pub mod naming;
pub mod pua;
pub mod types;

pub use config::{DestinationCapabilities, LoaderFileFormat, NormalizeConfig};
pub use naming::{extracted_file_name, parse_extracted_file_name, ExtractedFileName, NamingError};
pub use pua::{custom_pua_decode, custom_pua_encode, PuaDecodeError};
pub use types::{Row, ScalarValue};
