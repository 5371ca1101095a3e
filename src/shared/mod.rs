pub mod clock;
pub mod constants;
pub mod lifecycle;
#[cfg(test)]
pub mod test_helpers;
pub mod types;
