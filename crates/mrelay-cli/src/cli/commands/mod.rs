mod cancel;
mod history;
mod run;
mod submit;

pub use cancel::{run_cancel, run_cancel_user};
pub use history::run_history;
pub use run::run_service;
pub use submit::run_submit;
