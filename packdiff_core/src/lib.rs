pub mod archive;
pub mod content;
pub mod exclusion;
pub mod report;
pub mod sync;
pub mod text_diff;
pub mod tree;
pub mod versions;

pub use archive::{detect_archive_kind, ArchiveKind, SourceKind, TreeSource};
pub use content::{hash_file, ContentComparator, ContentVerdict};
pub use exclusion::{ExclusionFilter, ExclusionRule};
pub use report::{ComparisonReport, EffectiveChanges, ReportAssembler, ReportSummary};
pub use sync::{apply_plan, ApplyOutcome, SyncPlan, SyncPlanner};
pub use text_diff::{render_unified, LineDiffEngine};
pub use tree::{PairedTree, TreeComparator};
pub use versions::{read_local_version, ReleaseEntry, ReleaseTable, UpdateStatus};
