mod account_lifecycle_service;

pub use account_lifecycle_service::AccountLifecycleService;
