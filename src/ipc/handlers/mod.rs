pub mod assessments;
pub mod core;
pub mod feedback;
pub mod grades;
pub mod people;
pub mod regrades;
