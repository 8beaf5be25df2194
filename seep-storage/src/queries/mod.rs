//! Query modules for each domain relation.

pub mod assignments;
pub mod call_args;
pub mod cfg;
pub mod returns;
pub mod specialized;
pub mod symbols;
pub mod util;
