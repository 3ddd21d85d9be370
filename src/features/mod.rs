pub mod job_events;
pub mod jobs;
