pub mod graduation;
pub mod input;
pub mod specialty;

pub use graduation::{
    predict_graduation, predict_graduation_with_cutoff, GraduationPrediction, GraduationStats,
    DEFAULT_SIMILARITY_CUTOFF,
};
pub use input::StudentProfile;
pub use specialty::{recommend_specialties, SpecialtyRecommendation, SpecialtyScore};
