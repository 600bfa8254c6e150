pub mod article;
pub mod task;

pub use article::{generate_guid, Article, ArticleBuilder, ArticleSource, SourceCategory};
pub use task::{UpdatePriority, UpdateTask};
