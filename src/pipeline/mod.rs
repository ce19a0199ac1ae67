pub mod join;
pub mod persona;
pub mod story;
pub mod studio;
