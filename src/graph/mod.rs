//! Interactive traversal of the document graph.

mod navigator;
mod page;
mod prefetch;

pub use navigator::Navigator;
pub use page::{
    Direction, EdgeChoice, LABEL_WIDTH, Page, PageBuilder, PageCache, PageError, UNLABELED,
    UNTYPED, truncate_label,
};
pub use prefetch::Prefetcher;
