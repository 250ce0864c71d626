pub mod fallback;
pub mod intent;
pub mod plan_parser;
pub mod time_expr;
