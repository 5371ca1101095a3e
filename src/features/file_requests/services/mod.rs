mod file_request_service;

pub use file_request_service::FileRequestService;
