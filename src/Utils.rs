//! different utility modules used throughout the project
/// logging backend (simplelog) behind the `log` macros
pub mod logger;
/// parse configuration documents like "controller allow_loops: true logging level: debug" into a typed config
pub mod task_parser;
