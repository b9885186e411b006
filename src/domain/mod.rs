pub mod entities;
pub mod time_math;
pub mod value_objects;
