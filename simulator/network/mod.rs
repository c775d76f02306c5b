// Queue network simulator front end

pub mod cli;
pub mod report;

pub use cli::Args;
pub use report::print_report;
