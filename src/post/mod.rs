//! Post generation on top of the retry core: prompt and product inputs,
//! text cleanup, and the output file.

pub mod affiliate;
pub mod normal;
pub mod output;
pub mod sanitize;

pub use affiliate::{AffiliatePosts, Product, compose_post, parse_products, read_products};
pub use normal::{NormalPosts, plan_requests, read_prompts};
pub use output::{render_posts, write_posts};
