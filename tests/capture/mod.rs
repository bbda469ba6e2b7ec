mod crawl;
mod resources;
