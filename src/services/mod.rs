pub mod cache;
pub mod embeddings;
pub mod images;
pub mod mailer;
pub mod payments;
pub mod storage;
pub mod transcriber;
