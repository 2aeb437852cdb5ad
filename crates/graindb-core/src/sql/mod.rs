pub mod builder;
pub mod dialect;
pub mod paging;
pub mod temp_table;

pub use builder::{DeleteBuilder, InsertBuilder, JoinClause, OrderByItem, SelectBuilder, UpdateBuilder};
pub use dialect::Dialect;
pub use paging::{LimitStyle, PageSpec};
pub use temp_table::{TempTable, TempTablePlan};
