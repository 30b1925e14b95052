pub mod profile;
pub mod resume;

pub use profile::ProfileRow;
pub use resume::{NewResume, ResumeRow, ResumeStatus, ReviewUpdate};
