//! 데이터 수집 모듈.

pub mod backfill;
pub mod bvc_collect;
pub mod collect;
pub mod lookup;
pub mod persist;
pub mod pool;
pub mod progress;
pub mod yahoo_collect;

pub use backfill::{BackfillResolver, Resolution};
pub use bvc_collect::{collect_bvc, finalize_series, BvcCollectOptions, BvcCollection};
pub use collect::{open_store, run_collect, CollectOptions, SourceSelection, StoreKind};
pub use lookup::find_record;
pub use persist::{persist_records, upload_json_dir, write_summary, DownloadSummary, SummaryRange};
pub use pool::spawn_bounded;
pub use progress::{ProgressRenderer, ProgressSnapshot, ProgressState, ProgressTracker, TaskStatus};
pub use yahoo_collect::{collect_yahoo, YahooCollection};
