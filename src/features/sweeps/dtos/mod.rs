mod sweep_dto;

pub use sweep_dto::SweepRunDto;
