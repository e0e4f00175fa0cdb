pub mod compare;
pub mod deliver;
pub mod execute;
pub mod generate;
pub mod process;
