mod crawl;

pub use crawl::run_crawl;
