mod sweep_kind;

pub use sweep_kind::SweepKind;
