pub mod content;
pub mod module;
pub mod progress;
pub mod session;

pub use content::{ContentKind, ContentRef};
pub use module::ModuleRecord;
pub use progress::{ModuleProgress, ProgressTotals, ViewRecord};
pub use session::{DailyTimeLog, PageViewSession, IDLE_THRESHOLD_SECONDS};
