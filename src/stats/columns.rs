// src/stats/columns.rs

// Column names the engine and predictor read.

pub const ID: &str = "ID";
pub const GENDER: &str = "Gender";
pub const NATIONALITY: &str = "Nationality";
pub const CITY: &str = "City";
pub const SCHOOL: &str = "School";
pub const SPECIALTY: &str = "Specialty";
pub const BAC_TYPE: &str = "Baccalaureat_Type";
pub const SCHOLARSHIP: &str = "Scholarship";
pub const GRADUATED: &str = "Graduated";
pub const MARK: &str = "Mark";
pub const START_YEAR: &str = "Start_Year";
