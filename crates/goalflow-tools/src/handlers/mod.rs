pub mod calc;
pub mod search;
pub mod sql2dbt;

pub use calc::CalcHandler;
pub use search::SearchHandler;
pub use sql2dbt::{sanitize_model_name, Sql2DbtHandler};
