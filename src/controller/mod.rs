pub mod import;
pub mod list_view;
pub mod scroll;
pub mod search;

pub use import::ImportSession;
pub use list_view::{Freshness, ListViewController, LoadOutcome, LoadRequest, LoadState, Notice};
pub use scroll::{restore_scroll, ScrollTarget};
pub use search::SearchDebounce;
