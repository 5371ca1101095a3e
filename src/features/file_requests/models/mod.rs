mod file_request;

pub use file_request::FileRequest;
