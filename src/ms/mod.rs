pub mod io;
pub mod library;
pub mod spectrum;
