//! Side storage written by workflows: collected links and generated articles.

mod articles;
mod links;

pub use articles::{Article, ArticleStorage, MetaBundle, strip_front_matter, write_meta_folder};
pub use links::{Link, LinksStorage};
