//! LeadLab Common Library
//!
//! フロントエンド間で共有するリスト表示の状態管理とAPI型

pub mod types;
pub mod error;
pub mod list_query;
pub mod debounce;
pub mod selection;
pub mod scroll;
pub mod import_wizard;

pub use types::{
    DashboardStats, Deal, DealUpdate, HasId, ImportJob, ImportOptions, ImportPreview,
    ImportProgress, JobId, JobStatus, Lead, Notification, Page, RowId, Stage, StageId, Tag,
    TagId, Task, TeamInvitation, Workflow, WorkflowEdge, WorkflowNode,
};
pub use error::{Error, Result};
pub use list_query::{
    validate_filter_value, FilterCategory, ListQuery, ListResource, PageSize, QueryParams, Sort,
    DEFAULT_SORT_FIELD,
};
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use selection::{PageChange, Selection};
pub use scroll::{page_key, RestorePlan, ScrollPositions};
pub use import_wizard::{is_csv_file_name, ImportWizard, SelectedFile, WizardStep};
