pub mod expr;
pub mod handlers;
pub mod lookup;
pub mod registry;
pub mod writer;

pub use handlers::{CalcHandler, SearchHandler, Sql2DbtHandler};
pub use lookup::{DuckDuckGoLookup, FallbackLookup, TavilyLookup};
pub use registry::HandlerRegistry;
pub use writer::FsModelWriter;
