pub mod plan;
pub mod resolver;

pub use plan::LogicalPlan;
pub use resolver::{last_month_window, primary_key, resolve, resolve_at};
