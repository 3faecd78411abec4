pub mod logging;
pub mod output;
pub mod progress;
pub mod utils;

pub use logging::*;
pub use output::output_dir_for;
pub use utils::*;

// Re-export progress functions for library users
#[allow(unused_imports)]
pub use progress::{create_count_progress_bar, create_spinner};
