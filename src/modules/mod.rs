pub mod bootcamp;
pub mod course;

mod router;
pub use router::get_router;
