mod common;
mod scheduler;
mod timeline;
