//! Archive access: header and directory decoding over range reads, and the
//! identity-keyed cache that keeps the decoded index across requests.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ DirectoryCache<CachedArchiveState>           │
//! │   identity: key + ETag                       │
//! │   ┌────────────────┐  ┌───────────────────┐  │
//! │   │ ObjectRange-   │  │ ArchiveReader     │  │
//! │   │ Reader (pinned)│  │ header, root, LRU │  │
//! │   └────────────────┘  └───────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

mod cache;
mod reader;
mod state;

pub use cache::{ArchiveIdentity, DirectoryCache};
pub use reader::{read_header, ArchiveReader, DEFAULT_LEAF_CACHE_CAPACITY, MAX_DIRECTORY_DEPTH};
pub use state::CachedArchiveState;
